//! Process-wide service registry.
//!
//! The registry maps names to [`ServiceRef`]s and is shared by every
//! application in the process. Registration normally happens once at
//! startup; lookups and lock traffic come from any thread afterwards.

use crate::{Service, ServiceError, ServiceRef};
use arbor_types::{validate_name, ApplicationId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

static GLOBAL: OnceLock<Arc<ServiceRegistry>> = OnceLock::new();

/// Thread-safe name → service map.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceRef>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry shared by the whole process.
    #[must_use]
    pub fn global() -> Arc<ServiceRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ServiceRegistry::new())))
    }

    /// Registers `service` under `name`.
    ///
    /// # Errors
    ///
    /// Fails on a blank name or if the name is taken.
    pub fn register<S: Service>(&self, name: &str, service: S) -> Result<ServiceRef, ServiceError> {
        self.register_arc(name, Arc::new(service))
    }

    /// Registers an already shared service under `name`.
    ///
    /// # Errors
    ///
    /// Fails on a blank name or if the name is taken.
    pub fn register_arc<S: Service>(
        &self,
        name: &str,
        service: Arc<S>,
    ) -> Result<ServiceRef, ServiceError> {
        let name = validate_name(name, "service")?;
        let mut services = self.services.write();
        if services.contains_key(&name) {
            return Err(ServiceError::AlreadyRegistered { name });
        }
        let entry = ServiceRef::new(name.clone(), service);
        debug!(service = %name, exclusive = entry.is_exclusive(), "Registered service");
        services.insert(name, entry.clone());
        Ok(entry)
    }

    /// Looks up a service.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ServiceRef> {
        self.services.read().get(name.trim()).cloned()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name.trim())
    }

    /// Returns all registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    fn snapshot(&self) -> Vec<ServiceRef> {
        self.services.read().values().cloned().collect()
    }

    /// Tells every service that `app` has started.
    pub fn application_started(&self, app: &ApplicationId) {
        for entry in self.snapshot() {
            entry.service().application_started(app);
        }
    }

    /// Tells every service that `app` has stopped and force-releases any
    /// lock still owned by `app`.
    ///
    /// Returns the number of locks released.
    pub fn application_stopped(&self, app: &ApplicationId) -> usize {
        let mut released = 0;
        for entry in self.snapshot() {
            if entry.lock().release_if_held(*app) {
                info!(service = %entry.name(), app = %app, "Force-released lock on application stop");
                released += 1;
            }
            entry.service().application_stopped(app);
        }
        released
    }
}
