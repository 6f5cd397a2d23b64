//! Event processors.
//!
//! An [`EventProcessor`] is bound to one event name on one [`Channel`] of a
//! state activation. Each delivery creates an [`EventContext`] holding the
//! event's params for the duration of that one invocation.
//!
//! # Liveness
//!
//! A processor dies with its state. Calling
//! [`EventContext::do_transition`] kills it immediately, before the
//! transition runs; firing an event may kill it indirectly when some handler
//! up or down the tree transitions this processor's state away. After that,
//! every engine call through the context fails with
//! [`EngineError::Inactive`]. Treat a transition as the last statement of a
//! handler.

use super::state::StateNode;
use super::ControllerHandle;
use crate::resource::{PropertySet, Resource};
use crate::EngineError;
use arbor_service::ServiceRef;
use arbor_types::Params;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// The three event channels of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Events fired by an external caller at the controller.
    View,
    /// Events broadcast by the parent controller.
    Parent,
    /// Events raised by a child controller, possibly bubbled from deeper.
    Child,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::View => "view",
            Self::Parent => "parent",
            Self::Child => "child",
        };
        f.write_str(name)
    }
}

/// Handler for one event on one channel.
pub trait EventProcessor: Send + Sync + 'static {
    /// Handles one delivery of the event.
    ///
    /// # Errors
    ///
    /// Errors propagate back to whoever fired the event.
    fn on_event(&self, ctx: &EventContext) -> Result<(), EngineError>;
}

/// [`EventProcessor`] built from a closure. See [`processor_fn`].
pub struct ProcessorFn<F>(F);

impl<F> EventProcessor for ProcessorFn<F>
where
    F: Fn(&EventContext) -> Result<(), EngineError> + Send + Sync + 'static,
{
    fn on_event(&self, ctx: &EventContext) -> Result<(), EngineError> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as an [`EventProcessor`].
///
/// # Example
///
/// ```
/// use arbor_runtime::processor_fn;
/// use arbor_types::Params;
///
/// let edit = processor_fn(|ctx| {
///     let id = ctx.param_str("id")?.to_string();
///     ctx.do_transition("editing", Params::new().with("id", id)?)
/// });
/// # let _ = edit;
/// ```
pub fn processor_fn<F>(f: F) -> ProcessorFn<F>
where
    F: Fn(&EventContext) -> Result<(), EngineError> + Send + Sync + 'static,
{
    ProcessorFn(f)
}

pub(crate) struct ProcessorNode {
    channel: Channel,
    event: String,
    handler: Arc<dyn EventProcessor>,
    state: Weak<StateNode>,
    active: AtomicBool,
}

impl ProcessorNode {
    pub(crate) fn new(
        channel: Channel,
        event: String,
        handler: Arc<dyn EventProcessor>,
        state: Weak<StateNode>,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel,
            event,
            handler,
            state,
            active: AtomicBool::new(true),
        })
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn invoke(
        self: &Arc<Self>,
        params: Params,
        source_path: Option<String>,
    ) -> Result<(), EngineError> {
        if !self.is_active() {
            return Err(EngineError::inactive("event processor", &self.event));
        }
        trace!(
            event = %self.event,
            channel = %self.channel,
            source = source_path.as_deref().unwrap_or(""),
            "Delivering event"
        );
        let ctx = EventContext {
            node: Arc::clone(self),
            params,
            source_path,
        };
        self.handler.on_event(&ctx)
    }
}

/// What an [`EventProcessor`] sees during one delivery.
pub struct EventContext {
    node: Arc<ProcessorNode>,
    params: Params,
    source_path: Option<String>,
}

impl EventContext {
    fn assert_active(&self) -> Result<(), EngineError> {
        if self.node.is_active() {
            Ok(())
        } else {
            Err(EngineError::inactive("event processor", &self.node.event))
        }
    }

    fn state(&self) -> Result<Arc<StateNode>, EngineError> {
        self.assert_active()?;
        self.node
            .state
            .upgrade()
            .ok_or_else(|| EngineError::inactive("event processor", &self.node.event))
    }

    /// Returns the event name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.node.event
    }

    /// Returns the channel the event arrived on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.node.channel
    }

    /// Returns the dotted path of the controller that raised a child event,
    /// relative to the controller handling it.
    ///
    /// `Some("row")` for an event fired by the immediate child `row`;
    /// `Some("list.row")` when it bubbled up from `row` through `list`.
    /// `None` on the view and parent channels.
    #[must_use]
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Returns `true` until the processor is destroyed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.node.is_active()
    }

    /// Returns an event parameter.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive or the parameter is missing.
    pub fn param(&self, name: &str) -> Result<&Value, EngineError> {
        self.assert_active()?;
        Ok(self.params.get(name)?)
    }

    /// Returns a string event parameter.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive, or the parameter is missing or
    /// not a string.
    pub fn param_str(&self, name: &str) -> Result<&str, EngineError> {
        self.assert_active()?;
        Ok(self.params.get_str(name)?)
    }

    /// Returns all event parameters.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive.
    pub fn params(&self) -> Result<&Params, EngineError> {
        self.assert_active()?;
        Ok(&self.params)
    }

    /// Returns the controller owning this processor's state.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive.
    pub fn controller(&self) -> Result<ControllerHandle, EngineError> {
        Ok(self.state()?.controller()?.handle())
    }

    /// Publishes an output on the owning controller.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive, the name is blank or the value is
    /// `null`.
    pub fn set_output(&self, name: &str, value: impl Into<Value>) -> Result<(), EngineError> {
        self.state()?.set_output(name, value.into())
    }

    /// Moves the owning controller to another state.
    ///
    /// This processor is dead from the moment of the call, whether or not
    /// the transition succeeds.
    ///
    /// # Errors
    ///
    /// Fails if the processor is already inactive, the destination does not
    /// exist, or the destination's entry hook fails.
    pub fn do_transition(&self, name: &str, params: Params) -> Result<(), EngineError> {
        let state = self.state()?;
        self.node.deactivate();
        state.do_transition(name, params)
    }

    /// Broadcasts an event to the immediate child controllers.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive, or a child's processor fails.
    pub fn fire_parent_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.state()?.fire_parent_event(name, params)
    }

    /// Raises an event to the parent controller.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive, the controller is the root, or no
    /// ancestor handles the event.
    pub fn fire_child_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.state()?.fire_child_event(name, params)
    }

    /// Locks an exclusive service for this processor's state, waiting up to
    /// `timeout`. `Ok(None)` means another holder kept it.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive or the locking protocol is violated.
    pub fn lock_service(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<ServiceRef>, EngineError> {
        self.state()?.lock_service(name, timeout)
    }

    /// Attempts to lock an exclusive service without waiting.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive or the locking protocol is violated.
    pub fn try_lock_service(&self, name: &str) -> Result<Option<ServiceRef>, EngineError> {
        self.state()?.try_lock_service(name)
    }

    /// Returns a shared service, or an exclusive one held in the chain.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive, the service is unknown, or it is
    /// exclusive and not locked.
    pub fn get_service(&self, name: &str) -> Result<ServiceRef, EngineError> {
        self.state()?.get_service(name)
    }

    /// Releases a service locked by this processor's state.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive or the state does not hold it.
    pub fn unlock_service(&self, name: &str) -> Result<(), EngineError> {
        self.state()?.unlock_service(name)
    }

    /// Loads a resource file through the owning controller.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive or the resource is unavailable.
    pub fn resource(&self, file: &str) -> Result<Resource, EngineError> {
        self.state()?.controller()?.resource(file)
    }

    /// Reads one property by `"<file>:<property>"` locator.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive, the locator is malformed, or the
    /// file or property does not exist.
    pub fn property(&self, locator: &str) -> Result<String, EngineError> {
        self.state()?.controller()?.property(locator)
    }

    /// Loads a whole property file.
    ///
    /// # Errors
    ///
    /// Fails if the processor is inactive or the file does not exist.
    pub fn properties(&self, file: &str) -> Result<Arc<PropertySet>, EngineError> {
        self.state()?.controller()?.properties(file)
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.node.event)
            .field("channel", &self.node.channel)
            .field("source_path", &self.source_path)
            .field("active", &self.node.is_active())
            .finish()
    }
}
