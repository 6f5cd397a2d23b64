//! Per-application execution context.
//!
//! Tracks which controllers are currently active, by path and by id, and
//! fans lifecycle notifications out to [`ApplicationListener`]s.
//!
//! The registry holds weak references only. Ownership of controllers stays
//! with the tree; a controller that has been dropped simply stops showing
//! up in lookups.

use super::listener::ApplicationListener;
use crate::resource::ResourceLoader;
use crate::tree::{ControllerHandle, ControllerNode};
use arbor_types::{ApplicationId, ControllerId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Registry of active controllers and lifecycle event bus.
pub struct ExecutionContext {
    app: ApplicationId,
    by_path: RwLock<HashMap<String, Weak<ControllerNode>>>,
    by_id: RwLock<HashMap<ControllerId, Weak<ControllerNode>>>,
    listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,
    pub(crate) resources: Option<Arc<dyn ResourceLoader>>,
    pub(crate) cache_properties: bool,
}

fn same_listener(a: &Arc<dyn ApplicationListener>, b: &Arc<dyn ApplicationListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl ExecutionContext {
    pub(crate) fn new(
        app: ApplicationId,
        resources: Option<Arc<dyn ResourceLoader>>,
        cache_properties: bool,
    ) -> Self {
        Self {
            app,
            by_path: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            resources,
            cache_properties,
        }
    }

    /// Returns the id of the owning application.
    #[must_use]
    pub fn application_id(&self) -> ApplicationId {
        self.app
    }

    pub(crate) fn register(&self, node: &Arc<ControllerNode>) {
        trace!(path = node.path(), id = %node.id(), "Registering controller");
        self.by_path
            .write()
            .insert(node.path().to_string(), Arc::downgrade(node));
        self.by_id.write().insert(node.id(), Arc::downgrade(node));
    }

    pub(crate) fn deregister(&self, node: &Arc<ControllerNode>) {
        let ptr = Arc::as_ptr(node);
        {
            let mut by_path = self.by_path.write();
            if by_path.get(node.path()).is_some_and(|w| w.as_ptr() == ptr) {
                by_path.remove(node.path());
            }
        }
        self.by_id.write().remove(&node.id());
    }

    /// Returns the active controller at a dotted path, such as
    /// `"root.contacts.row"`.
    #[must_use]
    pub fn controller_on_path(&self, path: &str) -> Option<ControllerHandle> {
        self.by_path
            .read()
            .get(path.trim())
            .and_then(Weak::upgrade)
            .filter(|node| node.is_active())
            .map(|node| node.handle())
    }

    /// Returns the active controller with the given instance id.
    #[must_use]
    pub fn controller_by_id(&self, id: ControllerId) -> Option<ControllerHandle> {
        self.by_id
            .read()
            .get(&id)
            .and_then(Weak::upgrade)
            .filter(|node| node.is_active())
            .map(|node| node.handle())
    }

    /// Returns the number of registered active controllers.
    #[must_use]
    pub fn active_controller_count(&self) -> usize {
        self.by_id
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .filter(|node| node.is_active())
            .count()
    }

    /// Adds a listener. Adding the same listener twice has no effect.
    pub fn add_listener(&self, listener: Arc<dyn ApplicationListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Removes a listener. Removing an unknown listener has no effect.
    pub fn remove_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        self.listeners
            .write()
            .retain(|l| !same_listener(l, listener));
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn each_listener(&self, f: impl Fn(&dyn ApplicationListener)) {
        let snapshot: Vec<_> = self.listeners.read().clone();
        for listener in &snapshot {
            f(listener.as_ref());
        }
    }

    pub(crate) fn notify_application_starting(&self) {
        self.each_listener(|l| l.application_starting(&self.app));
    }

    pub(crate) fn notify_controller_starting(&self, controller: &ControllerHandle) {
        self.each_listener(|l| l.controller_starting(controller));
    }

    pub(crate) fn notify_controller_updated(&self, controller: &ControllerHandle) {
        self.each_listener(|l| l.controller_updated(controller));
    }

    pub(crate) fn notify_controller_stopping(&self, controller: &ControllerHandle) {
        self.each_listener(|l| l.controller_stopping(controller));
    }

    pub(crate) fn notify_application_stopping(&self) {
        self.each_listener(|l| l.application_stopping(&self.app));
    }

    pub(crate) fn notify_application_destroying(&self) {
        self.each_listener(|l| l.application_destroying(&self.app));
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("app", &self.app)
            .field("controllers", &self.by_id.read().len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ApplicationListener for Recorder {
        fn application_starting(&self, _app: &ApplicationId) {
            self.log.lock().push(format!("{}:starting", self.tag));
        }

        fn application_destroying(&self, _app: &ApplicationId) {
            self.log.lock().push(format!("{}:destroying", self.tag));
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn ApplicationListener> {
        Arc::new(Recorder {
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn listeners_notified_in_registration_order() {
        let ctx = ExecutionContext::new(ApplicationId::new(), None, true);
        let log = Arc::new(Mutex::new(Vec::new()));
        ctx.add_listener(recorder("a", &log));
        ctx.add_listener(recorder("b", &log));

        ctx.notify_application_starting();
        ctx.notify_application_destroying();

        assert_eq!(
            *log.lock(),
            vec!["a:starting", "b:starting", "a:destroying", "b:destroying"]
        );
    }

    #[test]
    fn add_listener_is_idempotent() {
        let ctx = ExecutionContext::new(ApplicationId::new(), None, true);
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder("a", &log);

        ctx.add_listener(Arc::clone(&listener));
        ctx.add_listener(Arc::clone(&listener));
        assert_eq!(ctx.listener_count(), 1);

        ctx.notify_application_starting();
        assert_eq!(log.lock().len(), 1);

        ctx.remove_listener(&listener);
        ctx.remove_listener(&listener);
        assert_eq!(ctx.listener_count(), 0);
    }

    #[test]
    fn lookups_on_empty_context() {
        let ctx = ExecutionContext::new(ApplicationId::new(), None, true);
        assert!(ctx.controller_on_path("root").is_none());
        assert!(ctx.controller_by_id(ControllerId::new()).is_none());
        assert_eq!(ctx.active_controller_count(), 0);
    }
}
