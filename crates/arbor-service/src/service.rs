//! Service trait and registry entries.

use crate::ServiceLock;
use arbor_types::ApplicationId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A named external collaborator used by states and event processors.
///
/// Exclusive services must be locked through a
/// [`ServiceCache`](crate::ServiceCache) before use; shared services are
/// readable by any node at any time. Exclusivity is read once, when the
/// service is registered.
///
/// # Example
///
/// ```
/// use arbor_service::{Service, ServiceRegistry};
///
/// struct Printer;
///
/// impl Service for Printer {
///     fn is_exclusive(&self) -> bool {
///         true
///     }
/// }
///
/// let registry = ServiceRegistry::new();
/// let entry = registry.register("printer", Printer)?;
/// assert!(entry.is_exclusive());
/// assert!(entry.downcast::<Printer>().is_some());
/// # Ok::<(), arbor_service::ServiceError>(())
/// ```
pub trait Service: Any + Send + Sync {
    /// Returns `true` if callers must hold the lock before using this service.
    fn is_exclusive(&self) -> bool {
        false
    }

    /// Called after an application using the registry has started.
    fn application_started(&self, _app: &ApplicationId) {}

    /// Called after an application using the registry has stopped.
    fn application_stopped(&self, _app: &ApplicationId) {}
}

struct Entry {
    name: String,
    exclusive: bool,
    lock: ServiceLock,
    service: Arc<dyn Service>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Cheaply clonable handle to a registered service.
///
/// Two handles obtained for the same name refer to the same lock.
#[derive(Clone)]
pub struct ServiceRef {
    entry: Arc<Entry>,
}

impl ServiceRef {
    pub(crate) fn new<S: Service>(name: String, service: Arc<S>) -> Self {
        let exclusive = service.is_exclusive();
        let any: Arc<dyn Any + Send + Sync> = service.clone();
        Self {
            entry: Arc::new(Entry {
                name,
                exclusive,
                lock: ServiceLock::new(),
                service,
                any,
            }),
        }
    }

    /// Returns the registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Returns `true` if the service requires locking.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.entry.exclusive
    }

    /// Returns the lock guarding this service.
    #[must_use]
    pub fn lock(&self) -> &ServiceLock {
        &self.entry.lock
    }

    /// Returns the service as a trait object.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn Service> {
        &self.entry.service
    }

    /// Returns the concrete service if it is an `S`.
    #[must_use]
    pub fn downcast<S: Service>(&self) -> Option<Arc<S>> {
        Arc::clone(&self.entry.any).downcast::<S>().ok()
    }

    /// Returns `true` if both handles refer to the same registration.
    #[must_use]
    pub fn same_as(&self, other: &ServiceRef) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRef")
            .field("name", &self.entry.name)
            .field("exclusive", &self.entry.exclusive)
            .field("holder", &self.entry.lock.holder())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shared;
    impl Service for Shared {}

    struct Exclusive {
        label: &'static str,
    }
    impl Service for Exclusive {
        fn is_exclusive(&self) -> bool {
            true
        }
    }

    #[test]
    fn exclusivity_captured_at_creation() {
        let shared = ServiceRef::new("a".into(), Arc::new(Shared));
        let exclusive = ServiceRef::new("b".into(), Arc::new(Exclusive { label: "x" }));
        assert!(!shared.is_exclusive());
        assert!(exclusive.is_exclusive());
    }

    #[test]
    fn downcast_to_concrete_type() {
        let entry = ServiceRef::new("b".into(), Arc::new(Exclusive { label: "x" }));
        let concrete = entry.downcast::<Exclusive>().expect("is Exclusive");
        assert_eq!(concrete.label, "x");
        assert!(entry.downcast::<Shared>().is_none());
    }

    #[test]
    fn clones_share_the_lock() {
        let entry = ServiceRef::new("b".into(), Arc::new(Exclusive { label: "x" }));
        let clone = entry.clone();
        assert!(entry.same_as(&clone));

        assert!(entry.lock().try_acquire(ApplicationId::new()));
        assert!(clone.lock().is_locked());
    }

    #[test]
    fn debug_shows_name() {
        let entry = ServiceRef::new("clock".into(), Arc::new(Shared));
        assert!(format!("{entry:?}").contains("clock"));
    }
}
