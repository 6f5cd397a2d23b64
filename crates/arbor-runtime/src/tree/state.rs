//! States and state activations.
//!
//! A [`State`] is the behavior registered on a controller under a name.
//! Every time the controller enters that name, the engine builds a fresh
//! activation (`StateNode`) and runs [`State::on_entry`] against it. The
//! activation is entered exactly once and destroyed exactly once; entering
//! the same name again builds a new one.
//!
//! # Teardown order
//!
//! ```text
//! destroy(state)
//!   1. mark inactive
//!   2. kill every processor (view, parent, child)
//!   3. destroy child controllers, in the order they were added
//!   4. release the state's own service locks
//! ```
//!
//! # Event dispatch
//!
//! | Channel | No matching processor |
//! |---------|-----------------------|
//! | view | [`EngineError::ViewEventNotHandled`] |
//! | parent | ignored |
//! | child | bubbles to the grandparent with the path prefixed |

use super::controller::ControllerNode;
use super::processor::{Channel, EventProcessor, ProcessorNode};
use super::{Controller, ControllerHandle};
use crate::resource::{PropertySet, Resource};
use crate::EngineError;
use arbor_service::{ServiceCache, ServiceRef};
use arbor_types::{validate_name, Params};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Behavior of a named controller state.
pub trait State: Send + Sync + 'static {
    /// Runs when the controller enters the state.
    ///
    /// Typical entry hooks publish outputs, register event processors and
    /// start child controllers.
    ///
    /// # Errors
    ///
    /// Errors propagate to whoever caused the entry. The engine does not
    /// undo anything the hook already did.
    fn on_entry(&self, ctx: &StateContext) -> Result<(), EngineError>;
}

/// [`State`] built from a closure. See [`state_fn`].
pub struct StateFn<F>(F);

impl<F> State for StateFn<F>
where
    F: Fn(&StateContext) -> Result<(), EngineError> + Send + Sync + 'static,
{
    fn on_entry(&self, ctx: &StateContext) -> Result<(), EngineError> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as a [`State`].
pub fn state_fn<F>(f: F) -> StateFn<F>
where
    F: Fn(&StateContext) -> Result<(), EngineError> + Send + Sync + 'static,
{
    StateFn(f)
}

#[derive(Default)]
struct StateInner {
    view: HashMap<String, Arc<ProcessorNode>>,
    parent: HashMap<String, Arc<ProcessorNode>>,
    child: HashMap<String, Arc<ProcessorNode>>,
    children: Vec<Arc<ControllerNode>>,
}

impl StateInner {
    fn channel(&mut self, channel: Channel) -> &mut HashMap<String, Arc<ProcessorNode>> {
        match channel {
            Channel::View => &mut self.view,
            Channel::Parent => &mut self.parent,
            Channel::Child => &mut self.child,
        }
    }

    fn child_named(&self, name: &str) -> Option<&Arc<ControllerNode>> {
        self.children.iter().find(|c| c.name() == name)
    }
}

/// One activation of a state.
pub(crate) struct StateNode {
    name: String,
    behavior: Arc<dyn State>,
    params: Params,
    controller: Weak<ControllerNode>,
    cache: Arc<ServiceCache>,
    active: AtomicBool,
    inner: Mutex<StateInner>,
}

impl StateNode {
    pub(crate) fn new(
        name: String,
        behavior: Arc<dyn State>,
        params: Params,
        controller: Weak<ControllerNode>,
        cache: Arc<ServiceCache>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            params,
            controller,
            cache,
            active: AtomicBool::new(false),
            inner: Mutex::new(StateInner::default()),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn assert_active(&self) -> Result<(), EngineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::inactive("state", &self.name))
        }
    }

    pub(crate) fn controller(&self) -> Result<Arc<ControllerNode>, EngineError> {
        self.controller
            .upgrade()
            .ok_or_else(|| EngineError::inactive("state", &self.name))
    }

    pub(crate) fn enter(self: &Arc<Self>) -> Result<(), EngineError> {
        self.active.store(true, Ordering::Release);
        debug!(state = %self.name, "Entering state");
        let ctx = StateContext {
            node: Arc::clone(self),
        };
        self.behavior.on_entry(&ctx)
    }

    pub(crate) fn destroy(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        let (processors, children) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let processors: Vec<Arc<ProcessorNode>> = inner
                .view
                .drain()
                .chain(inner.parent.drain())
                .chain(inner.child.drain())
                .map(|(_, p)| p)
                .collect();
            (processors, std::mem::take(&mut inner.children))
        };

        for processor in &processors {
            processor.deactivate();
        }
        for child in &children {
            child.destroy();
        }
        self.cache.release_locks();
        debug!(
            state = %self.name,
            processors = processors.len(),
            children = children.len(),
            "State destroyed"
        );
    }

    fn add_processor(
        self: &Arc<Self>,
        channel: Channel,
        event: &str,
        handler: Arc<dyn EventProcessor>,
    ) -> Result<(), EngineError> {
        self.assert_active()?;
        let event = validate_name(event, "event")?;
        let mut inner = self.inner.lock();
        let map = inner.channel(channel);
        if map.contains_key(&event) {
            return Err(EngineError::DuplicateProcessor {
                channel,
                event,
                state: self.name.clone(),
            });
        }
        let node = ProcessorNode::new(channel, event.clone(), handler, Arc::downgrade(self));
        map.insert(event, node);
        Ok(())
    }

    fn processor(&self, channel: Channel, event: &str) -> Option<Arc<ProcessorNode>> {
        self.inner.lock().channel(channel).get(event).cloned()
    }

    fn add_child_controller(
        self: &Arc<Self>,
        name: &str,
        behavior: Arc<dyn Controller>,
        params: Params,
    ) -> Result<ControllerHandle, EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "controller")?;
        let owner = self.controller()?;

        let child = {
            let mut inner = self.inner.lock();
            if inner.child_named(&name).is_some() {
                return Err(EngineError::DuplicateChildController {
                    state: self.name.clone(),
                    controller: name,
                });
            }
            let child = ControllerNode::new(
                format!("{}.{}", owner.path(), name),
                name,
                behavior,
                Some(Arc::downgrade(self)),
                Arc::clone(owner.context()),
                ServiceCache::child(&self.cache),
                params,
            );
            inner.children.push(Arc::clone(&child));
            child
        };

        child.start()?;
        Ok(child.handle())
    }

    fn remove_child_controller(&self, name: &str) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "controller")?;
        let removed = {
            let mut inner = self.inner.lock();
            let index = inner.children.iter().position(|c| c.name() == name);
            index.map(|i| inner.children.remove(i))
        };
        match removed {
            Some(child) => {
                child.destroy();
                Ok(())
            }
            None => Err(EngineError::ChildControllerNotFound {
                state: self.name.clone(),
                controller: name,
            }),
        }
    }

    pub(crate) fn child_controller(&self, name: &str) -> Option<Arc<ControllerNode>> {
        self.inner.lock().child_named(name.trim()).cloned()
    }

    pub(crate) fn child_controllers(&self) -> Vec<Arc<ControllerNode>> {
        self.inner.lock().children.clone()
    }

    pub(crate) fn process_view_event(&self, event: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        match self.processor(Channel::View, event) {
            Some(processor) => processor.invoke(params, None),
            None => Err(EngineError::ViewEventNotHandled {
                event: event.to_string(),
                state: self.name.clone(),
                path: self.controller()?.path().to_string(),
            }),
        }
    }

    pub(crate) fn process_parent_event(&self, event: &str, params: Params) -> Result<(), EngineError> {
        if !self.is_active() {
            return Ok(());
        }
        match self.processor(Channel::Parent, event) {
            Some(processor) => processor.invoke(params, None),
            None => {
                trace!(state = %self.name, event, "Parent event ignored");
                Ok(())
            }
        }
    }

    pub(crate) fn process_child_event(
        &self,
        source_path: String,
        event: &str,
        params: Params,
    ) -> Result<(), EngineError> {
        self.assert_active()?;
        if let Some(processor) = self.processor(Channel::Child, event) {
            return processor.invoke(params, Some(source_path));
        }

        let owner = self.controller()?;
        match owner.parent_controller() {
            Some(parent) => {
                let bubbled = format!("{}.{}", owner.name(), source_path);
                trace!(event, source = %bubbled, "Child event bubbling up");
                parent.process_child_event(bubbled, event, params)
            }
            None => Err(EngineError::ChildEventNotHandled {
                event: event.to_string(),
                source_path,
            }),
        }
    }

    pub(crate) fn fire_parent_event(&self, event: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        let event = validate_name(event, "event")?;
        for child in self.child_controllers() {
            child.process_parent_event(&event, params.clone())?;
        }
        Ok(())
    }

    pub(crate) fn fire_child_event(&self, event: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        self.controller()?.fire_child_event(event, params)
    }

    pub(crate) fn do_transition(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        self.controller()?.do_transition(name, params)
    }

    pub(crate) fn set_output(&self, name: &str, value: Value) -> Result<(), EngineError> {
        self.assert_active()?;
        self.controller()?.set_output(name, value)
    }

    pub(crate) fn lock_service(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<ServiceRef>, EngineError> {
        self.assert_active()?;
        Ok(self.cache.lock_service(name, timeout)?)
    }

    pub(crate) fn try_lock_service(&self, name: &str) -> Result<Option<ServiceRef>, EngineError> {
        self.assert_active()?;
        Ok(self.cache.try_lock_service(name)?)
    }

    pub(crate) fn get_service(&self, name: &str) -> Result<ServiceRef, EngineError> {
        self.assert_active()?;
        Ok(self.cache.get_service(name)?)
    }

    pub(crate) fn unlock_service(&self, name: &str) -> Result<(), EngineError> {
        self.assert_active()?;
        Ok(self.cache.release_service(name)?)
    }
}

/// What a [`State`] entry hook sees.
///
/// The context stays usable after the hook returns only through event
/// processors; once the activation is destroyed every call fails with
/// [`EngineError::Inactive`].
pub struct StateContext {
    node: Arc<StateNode>,
}

impl StateContext {
    /// Returns the state name.
    #[must_use]
    pub fn state_name(&self) -> &str {
        &self.node.name
    }

    /// Returns `true` until the activation is destroyed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.node.is_active()
    }

    /// Returns a parameter the state was entered with.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or the parameter is missing.
    pub fn param(&self, name: &str) -> Result<&Value, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.params.get(name)?)
    }

    /// Returns a string parameter the state was entered with.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, or the parameter is missing or not a
    /// string.
    pub fn param_str(&self, name: &str) -> Result<&str, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.params.get_str(name)?)
    }

    /// Returns all parameters the state was entered with.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive.
    pub fn params(&self) -> Result<&Params, EngineError> {
        self.node.assert_active()?;
        Ok(&self.node.params)
    }

    /// Returns the controller owning this state.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive.
    pub fn controller(&self) -> Result<ControllerHandle, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.controller()?.handle())
    }

    /// Publishes an output on the owning controller.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the name is blank or the value is
    /// `null`.
    pub fn set_output(&self, name: &str, value: impl Into<Value>) -> Result<(), EngineError> {
        self.node.set_output(name, value.into())
    }

    /// Registers a processor for view events named `event`.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or the name is already taken on the
    /// view channel.
    pub fn add_view_event_processor<P: EventProcessor>(
        &self,
        event: &str,
        processor: P,
    ) -> Result<(), EngineError> {
        self.node.add_processor(Channel::View, event, Arc::new(processor))
    }

    /// Registers a processor for events broadcast by the parent controller.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or the name is already taken on the
    /// parent channel.
    pub fn add_parent_event_processor<P: EventProcessor>(
        &self,
        event: &str,
        processor: P,
    ) -> Result<(), EngineError> {
        self.node.add_processor(Channel::Parent, event, Arc::new(processor))
    }

    /// Registers a processor for events raised by child controllers.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or the name is already taken on the
    /// child channel.
    pub fn add_child_event_processor<P: EventProcessor>(
        &self,
        event: &str,
        processor: P,
    ) -> Result<(), EngineError> {
        self.node.add_processor(Channel::Child, event, Arc::new(processor))
    }

    /// Creates and starts a child controller.
    ///
    /// The child is attached before it starts, so it is destroyed with this
    /// state even if its own startup fails.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the name is already used in this
    /// state, or the child's startup fails.
    pub fn add_child_controller<C: Controller>(
        &self,
        name: &str,
        controller: C,
        params: Params,
    ) -> Result<ControllerHandle, EngineError> {
        self.node
            .add_child_controller(name, Arc::new(controller), params)
    }

    /// Destroys and detaches a child controller.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or has no child with that name.
    pub fn remove_child_controller(&self, name: &str) -> Result<(), EngineError> {
        self.node.remove_child_controller(name)
    }

    /// Returns a child controller by name.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive.
    pub fn child_controller(&self, name: &str) -> Result<Option<ControllerHandle>, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.child_controller(name).map(|c| c.handle()))
    }

    /// Returns the child controllers in the order they were added.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive.
    pub fn child_controllers(&self) -> Result<Vec<ControllerHandle>, EngineError> {
        self.node.assert_active()?;
        Ok(self
            .node
            .child_controllers()
            .iter()
            .map(|c| c.handle())
            .collect())
    }

    /// Moves the owning controller to another state, destroying this one.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the destination does not exist, or
    /// the destination's entry hook fails.
    pub fn do_transition(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.node.do_transition(name, params)
    }

    /// Broadcasts an event to the immediate child controllers.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or a child's processor fails.
    pub fn fire_parent_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.node.fire_parent_event(name, params)
    }

    /// Raises an event to the parent controller.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the controller is the root, or no
    /// ancestor handles the event.
    pub fn fire_child_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.node.fire_child_event(name, params)
    }

    /// Locks an exclusive service for this state, waiting up to `timeout`.
    ///
    /// `Ok(None)` means another holder kept the lock for the whole timeout.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the service is unknown or shared, or
    /// this state or an ancestor already holds it.
    pub fn lock_service(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<ServiceRef>, EngineError> {
        self.node.lock_service(name, timeout)
    }

    /// Attempts to lock an exclusive service without waiting.
    ///
    /// # Errors
    ///
    /// Same as [`lock_service`](Self::lock_service).
    pub fn try_lock_service(&self, name: &str) -> Result<Option<ServiceRef>, EngineError> {
        self.node.try_lock_service(name)
    }

    /// Returns a shared service, or an exclusive one held in the chain.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the service is unknown, or it is
    /// exclusive and not locked by this state or an ancestor.
    pub fn get_service(&self, name: &str) -> Result<ServiceRef, EngineError> {
        self.node.get_service(name)
    }

    /// Releases a service this state locked.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or does not itself hold the service.
    pub fn unlock_service(&self, name: &str) -> Result<(), EngineError> {
        self.node.unlock_service(name)
    }

    /// Loads a resource file through the owning controller.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or the resource is unavailable.
    pub fn resource(&self, file: &str) -> Result<Resource, EngineError> {
        self.node.assert_active()?;
        self.node.controller()?.resource(file)
    }

    /// Reads one property by `"<file>:<property>"` locator.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive, the locator is malformed, or the file
    /// or property does not exist.
    pub fn property(&self, locator: &str) -> Result<String, EngineError> {
        self.node.assert_active()?;
        self.node.controller()?.property(locator)
    }

    /// Loads a whole property file.
    ///
    /// # Errors
    ///
    /// Fails if the state is inactive or the file does not exist.
    pub fn properties(&self, file: &str) -> Result<Arc<PropertySet>, EngineError> {
        self.node.assert_active()?;
        self.node.controller()?.properties(file)
    }
}

impl fmt::Debug for StateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateContext")
            .field("state", &self.node.name)
            .field("active", &self.node.is_active())
            .finish()
    }
}
