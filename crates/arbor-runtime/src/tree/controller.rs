//! Controllers.
//!
//! A controller is a named state machine. It owns its states, exactly one
//! of which is current once the controller has started, plus a map of
//! published outputs. The current state may own child controllers, which is
//! how the tree grows.
//!
//! # Lifecycle
//!
//! ```text
//! start ──▶ on_start ──▶ add_initial_state (entered at once)
//!                         add_state ...
//!       ──▶ registered in the execution context
//!
//! do_transition(dest)
//!   destroy current state ──▶ clear outputs ──▶ enter dest
//!
//! destroy
//!   release locks ──▶ notify stopping ──▶ deregister ──▶ destroy current state
//! ```

use super::state::{State, StateNode};
use crate::engine::ExecutionContext;
use crate::resource::{PropertySet, Resource, ResourceAccessor, ResourceLoader};
use crate::EngineError;
use arbor_service::ServiceCache;
use arbor_types::{validate_name, ControllerId, Params};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Behavior of a controller.
pub trait Controller: Send + Sync + 'static {
    /// Runs when the controller starts.
    ///
    /// Must add the initial state through
    /// [`ControllerContext::add_initial_state`]; the remaining states are
    /// usually added here too.
    ///
    /// # Errors
    ///
    /// Errors abort the start and propagate to whoever created the
    /// controller.
    fn on_start(&self, ctx: &ControllerContext) -> Result<(), EngineError>;

    /// Resource loader for this controller.
    ///
    /// `None` falls back to the application-wide loader.
    fn resources(&self) -> Option<Arc<dyn ResourceLoader>> {
        None
    }
}

/// [`Controller`] built from a closure. See [`controller_fn`].
pub struct ControllerFn<F>(F);

impl<F> Controller for ControllerFn<F>
where
    F: Fn(&ControllerContext) -> Result<(), EngineError> + Send + Sync + 'static,
{
    fn on_start(&self, ctx: &ControllerContext) -> Result<(), EngineError> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as a [`Controller`].
///
/// # Example
///
/// ```
/// use arbor_runtime::{controller_fn, state_fn};
/// use arbor_types::Params;
///
/// let greeter = controller_fn(|ctx| {
///     ctx.add_initial_state(
///         "greeting",
///         state_fn(|state| state.set_output("message", "hello")),
///         Params::new(),
///     )
/// });
/// # let _ = greeter;
/// ```
pub fn controller_fn<F>(f: F) -> ControllerFn<F>
where
    F: Fn(&ControllerContext) -> Result<(), EngineError> + Send + Sync + 'static,
{
    ControllerFn(f)
}

#[derive(Default)]
struct ControllerInner {
    states: Vec<(String, Arc<dyn State>)>,
    current: Option<Arc<StateNode>>,
    outputs: HashMap<String, Value>,
}

impl ControllerInner {
    fn state(&self, name: &str) -> Option<Arc<dyn State>> {
        self.states
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
    }
}

pub(crate) struct ControllerNode {
    id: ControllerId,
    name: String,
    path: String,
    behavior: Arc<dyn Controller>,
    enclosing: Option<Weak<StateNode>>,
    context: Arc<ExecutionContext>,
    cache: Arc<ServiceCache>,
    params: Params,
    resources: ResourceAccessor,
    active: AtomicBool,
    destroyed: AtomicBool,
    inner: Mutex<ControllerInner>,
}

impl ControllerNode {
    pub(crate) fn new(
        path: String,
        name: String,
        behavior: Arc<dyn Controller>,
        enclosing: Option<Weak<StateNode>>,
        context: Arc<ExecutionContext>,
        cache: Arc<ServiceCache>,
        params: Params,
    ) -> Arc<Self> {
        let loader = behavior
            .resources()
            .or_else(|| context.resources.clone());
        let resources = ResourceAccessor::new(loader, context.cache_properties);
        Arc::new(Self {
            id: ControllerId::new(),
            name,
            path,
            behavior,
            enclosing,
            context,
            cache,
            params,
            resources,
            active: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            inner: Mutex::new(ControllerInner::default()),
        })
    }

    pub(crate) fn handle(self: &Arc<Self>) -> ControllerHandle {
        ControllerHandle {
            node: Arc::clone(self),
        }
    }

    pub(crate) fn id(&self) -> ControllerId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_root(&self) -> bool {
        self.enclosing.is_none()
    }

    fn assert_active(&self) -> Result<(), EngineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::inactive("controller", &self.path))
        }
    }

    pub(crate) fn parent_controller(&self) -> Option<Arc<ControllerNode>> {
        self.enclosing
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|state| state.controller().ok())
    }

    fn current_state(&self) -> Option<Arc<StateNode>> {
        self.inner.lock().current.clone()
    }

    pub(crate) fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        self.active.store(true, Ordering::Release);
        debug!(path = %self.path, id = %self.id, "Starting controller");
        self.context.notify_controller_starting(&self.handle());

        let ctx = ControllerContext {
            node: Arc::clone(self),
        };
        self.behavior.on_start(&ctx)?;

        if self.current_state().is_none() {
            return Err(EngineError::NoInitialState {
                controller: self.path.clone(),
            });
        }
        self.context.register(self);
        Ok(())
    }

    fn add_initial_state(
        self: &Arc<Self>,
        name: &str,
        behavior: Arc<dyn State>,
        params: Params,
    ) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "state")?;
        {
            let mut inner = self.inner.lock();
            if !inner.states.is_empty() {
                return Err(EngineError::InitialStateAlreadyAdded {
                    controller: self.path.clone(),
                });
            }
            inner.states.push((name.clone(), Arc::clone(&behavior)));
        }
        self.enter_state(name, behavior, params)?;
        self.context.notify_controller_updated(&self.handle());
        Ok(())
    }

    fn add_state(&self, name: &str, behavior: Arc<dyn State>) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "state")?;
        let mut inner = self.inner.lock();
        if inner.states.is_empty() {
            return Err(EngineError::NoInitialState {
                controller: self.path.clone(),
            });
        }
        if inner.state(&name).is_some() {
            return Err(EngineError::DuplicateState {
                controller: self.path.clone(),
                state: name,
            });
        }
        inner.states.push((name, behavior));
        Ok(())
    }

    fn enter_state(
        self: &Arc<Self>,
        name: String,
        behavior: Arc<dyn State>,
        params: Params,
    ) -> Result<(), EngineError> {
        let state = StateNode::new(
            name,
            behavior,
            params,
            Arc::downgrade(self),
            ServiceCache::child(&self.cache),
        );
        self.inner.lock().current = Some(Arc::clone(&state));
        state.enter()
    }

    pub(crate) fn do_transition(
        self: &Arc<Self>,
        name: &str,
        params: Params,
    ) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "state")?;
        let (behavior, previous) = {
            let mut inner = self.inner.lock();
            let behavior = inner
                .state(&name)
                .ok_or_else(|| EngineError::StateNotFound {
                    controller: self.path.clone(),
                    state: name.clone(),
                })?;
            (behavior, inner.current.take())
        };

        if let Some(previous) = previous {
            debug!(
                controller = %self.path,
                from = previous.name(),
                to = %name,
                "Transition"
            );
            previous.destroy();
        }
        self.inner.lock().outputs.clear();
        self.enter_state(name, behavior, params)?;
        self.context.notify_controller_updated(&self.handle());
        Ok(())
    }

    fn fire_view_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "event")?;
        let state = self
            .current_state()
            .ok_or_else(|| EngineError::NoCurrentState {
                controller: self.path.clone(),
            })?;
        state.process_view_event(&name, params)
    }

    pub(crate) fn set_output(self: &Arc<Self>, name: &str, value: Value) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "output")?;
        if value.is_null() {
            return Err(EngineError::NullOutput { output: name });
        }
        self.inner.lock().outputs.insert(name, value);
        self.context.notify_controller_updated(&self.handle());
        Ok(())
    }

    fn output(&self, name: &str) -> Result<Value, EngineError> {
        self.assert_active()?;
        self.inner
            .lock()
            .outputs
            .get(name.trim())
            .cloned()
            .ok_or_else(|| EngineError::OutputNotFound {
                controller: self.path.clone(),
                output: name.trim().to_string(),
            })
    }

    fn outputs(&self) -> Result<BTreeMap<String, Value>, EngineError> {
        self.assert_active()?;
        Ok(self
            .inner
            .lock()
            .outputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn fire_parent_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        let state = self
            .current_state()
            .ok_or_else(|| EngineError::NoCurrentState {
                controller: self.path.clone(),
            })?;
        state.fire_parent_event(name, params)
    }

    pub(crate) fn fire_child_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.assert_active()?;
        let name = validate_name(name, "event")?;
        let Some(enclosing) = &self.enclosing else {
            return Err(EngineError::NoParentController {
                controller: self.path.clone(),
                event: name,
            });
        };
        let parent = enclosing
            .upgrade()
            .ok_or_else(|| EngineError::inactive("controller", &self.path))?
            .controller()?;
        parent.process_child_event(self.name.clone(), &name, params)
    }

    pub(crate) fn process_parent_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        match self.current_state() {
            Some(state) if self.is_active() => state.process_parent_event(name, params),
            _ => Ok(()),
        }
    }

    pub(crate) fn process_child_event(
        &self,
        source_path: String,
        name: &str,
        params: Params,
    ) -> Result<(), EngineError> {
        self.assert_active()?;
        let state = self
            .current_state()
            .ok_or_else(|| EngineError::NoCurrentState {
                controller: self.path.clone(),
            })?;
        state.process_child_event(source_path, name, params)
    }

    pub(crate) fn destroy(self: &Arc<Self>) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cache.release_locks();
        self.context.notify_controller_stopping(&self.handle());
        self.context.deregister(self);
        self.active.store(false, Ordering::Release);

        let current = self.inner.lock().current.take();
        if let Some(state) = current {
            state.destroy();
        }
        debug!(path = %self.path, "Controller destroyed");
    }

    pub(crate) fn resource(&self, file: &str) -> Result<Resource, EngineError> {
        self.assert_active()?;
        self.resources.resource(file)
    }

    pub(crate) fn property(&self, locator: &str) -> Result<String, EngineError> {
        self.assert_active()?;
        self.resources.property(locator)
    }

    pub(crate) fn properties(&self, file: &str) -> Result<Arc<PropertySet>, EngineError> {
        self.assert_active()?;
        self.resources.properties(file)
    }
}

/// What a [`Controller`] startup hook sees.
pub struct ControllerContext {
    node: Arc<ControllerNode>,
}

impl ControllerContext {
    /// Returns the controller name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Returns the dotted path from the root controller.
    #[must_use]
    pub fn path(&self) -> &str {
        self.node.path()
    }

    /// Returns the controller instance id.
    #[must_use]
    pub fn id(&self) -> ControllerId {
        self.node.id
    }

    /// Returns `true` for the application's root controller.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    /// Returns a controller parameter.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive or the parameter is missing.
    pub fn param(&self, name: &str) -> Result<&Value, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.params.get(name)?)
    }

    /// Returns a string controller parameter.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive, or the parameter is missing or
    /// not a string.
    pub fn param_str(&self, name: &str) -> Result<&str, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.params.get_str(name)?)
    }

    /// Returns all controller parameters.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive.
    pub fn params(&self) -> Result<&Params, EngineError> {
        self.node.assert_active()?;
        Ok(&self.node.params)
    }

    /// Adds and immediately enters the initial state.
    ///
    /// # Errors
    ///
    /// Fails if a state was already added, or the entry hook fails.
    pub fn add_initial_state<S: State>(
        &self,
        name: &str,
        state: S,
        params: Params,
    ) -> Result<(), EngineError> {
        self.node.add_initial_state(name, Arc::new(state), params)
    }

    /// Adds a state reachable by transition.
    ///
    /// # Errors
    ///
    /// Fails if no initial state exists yet or the name is taken.
    pub fn add_state<S: State>(&self, name: &str, state: S) -> Result<(), EngineError> {
        self.node.add_state(name, Arc::new(state))
    }

    /// Publishes an output.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive or the value is `null`.
    pub fn set_output(&self, name: &str, value: impl Into<Value>) -> Result<(), EngineError> {
        self.node.set_output(name, value.into())
    }

    /// Broadcasts an event to the child controllers of the current state.
    ///
    /// # Errors
    ///
    /// Fails if there is no current state or a child's processor fails.
    pub fn fire_parent_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.node.fire_parent_event(name, params)
    }

    /// Raises an event to the parent controller.
    ///
    /// # Errors
    ///
    /// Fails on the root controller or when no ancestor handles the event.
    pub fn fire_child_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.node.fire_child_event(name, params)
    }

    /// Loads a resource file.
    ///
    /// # Errors
    ///
    /// Fails if the resource is unavailable.
    pub fn resource(&self, file: &str) -> Result<Resource, EngineError> {
        self.node.resource(file)
    }

    /// Reads one property by `"<file>:<property>"` locator.
    ///
    /// # Errors
    ///
    /// Fails if the locator is malformed or the property does not exist.
    pub fn property(&self, locator: &str) -> Result<String, EngineError> {
        self.node.property(locator)
    }

    /// Returns a handle to the controller being started.
    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        self.node.handle()
    }
}

impl fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerContext")
            .field("path", &self.node.path)
            .finish()
    }
}

/// External view of a controller.
///
/// Handles stay valid after the controller is destroyed, but every
/// operation except the identity accessors then fails with
/// [`EngineError::Inactive`]. A destroyed controller never comes back: look
/// the path up again to find its replacement.
#[derive(Clone)]
pub struct ControllerHandle {
    node: Arc<ControllerNode>,
}

impl ControllerHandle {
    /// Returns the instance id.
    #[must_use]
    pub fn id(&self) -> ControllerId {
        self.node.id
    }

    /// Returns the controller name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Returns the dotted path from the root controller.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive.
    pub fn path(&self) -> Result<&str, EngineError> {
        self.node.assert_active()?;
        Ok(self.node.path())
    }

    /// Returns `true` until the controller is destroyed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.node.is_active()
    }

    /// Returns `true` for the application's root controller.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    /// Returns the name of the current state.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive or has no current state.
    pub fn current_state_name(&self) -> Result<String, EngineError> {
        self.node.assert_active()?;
        self.node
            .current_state()
            .map(|s| s.name().to_string())
            .ok_or_else(|| EngineError::NoCurrentState {
                controller: self.node.path.clone(),
            })
    }

    /// Returns the names of all states in the order they were added.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive.
    pub fn state_names(&self) -> Result<Vec<String>, EngineError> {
        self.node.assert_active()?;
        Ok(self
            .node
            .inner
            .lock()
            .states
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    /// Fires a view event at the current state.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive, the current state has no view
    /// processor for the event, or the processor fails.
    pub fn fire_view_event(&self, name: &str, params: Params) -> Result<(), EngineError> {
        self.node.fire_view_event(name, params)
    }

    /// Returns a published output.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive or the output was never written
    /// in the current state.
    pub fn output(&self, name: &str) -> Result<Value, EngineError> {
        self.node.output(name)
    }

    /// Returns a snapshot of all published outputs.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive.
    pub fn outputs(&self) -> Result<BTreeMap<String, Value>, EngineError> {
        self.node.outputs()
    }

    /// Returns a child controller of the current state.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive.
    pub fn child_controller(&self, name: &str) -> Result<Option<ControllerHandle>, EngineError> {
        self.node.assert_active()?;
        Ok(self
            .node
            .current_state()
            .and_then(|s| s.child_controller(name))
            .map(|c| c.handle()))
    }

    /// Returns the child controllers of the current state, in the order
    /// they were added.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive.
    pub fn child_controllers(&self) -> Result<Vec<ControllerHandle>, EngineError> {
        self.node.assert_active()?;
        Ok(self
            .node
            .current_state()
            .map(|s| s.child_controllers().iter().map(|c| c.handle()).collect())
            .unwrap_or_default())
    }

    /// Loads a resource file.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive or the resource is unavailable.
    pub fn resource(&self, file: &str) -> Result<Resource, EngineError> {
        self.node.resource(file)
    }

    /// Reads one property by `"<file>:<property>"` locator.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive, the locator is malformed, or
    /// the property does not exist.
    pub fn property(&self, locator: &str) -> Result<String, EngineError> {
        self.node.property(locator)
    }

    /// Loads a whole property file.
    ///
    /// # Errors
    ///
    /// Fails if the controller is inactive or the file does not exist.
    pub fn properties(&self, file: &str) -> Result<Arc<PropertySet>, EngineError> {
        self.node.properties(file)
    }

    /// Returns `true` if both handles refer to the same controller instance.
    #[must_use]
    pub fn same_as(&self, other: &ControllerHandle) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl PartialEq for ControllerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for ControllerHandle {}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("id", &self.node.id)
            .field("path", &self.node.path)
            .field("active", &self.node.is_active())
            .finish()
    }
}
