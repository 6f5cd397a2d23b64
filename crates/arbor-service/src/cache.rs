//! Per-node service locking scope.
//!
//! Every controller and every state activation owns a [`ServiceCache`].
//! Caches are chained parent-ward, mirroring the controller tree:
//!
//! ```text
//! root cache (application)
//!   └── controller "shop"
//!         └── state "checkout"      holds: printer
//!               └── controller "receipt"
//!                     └── state "render"   get_service("printer") → Ok
//! ```
//!
//! # Protocol
//!
//! | Operation | Succeeds when | Otherwise |
//! |-----------|---------------|-----------|
//! | `try_lock_service` | exclusive, not held in the chain, lock free | `Ok(None)` on contention, error on misuse |
//! | `lock_service` | as above, within the timeout | `Ok(None)` after the timeout |
//! | `get_service` | shared, or held by self/ancestor | `NotLocked` |
//! | `release_service` | held by this very cache | `NotHeldHere` |
//! | `release_locks` | always | never fails |
//!
//! The acquisition token is the owning application's id, so a hold is
//! "this application holds the service" and every descendant of the holder
//! may use it. Locking again anywhere in the same chain is a programming
//! error and fails with [`ServiceError::AlreadyHeld`] instead of blocking.

use crate::{ServiceError, ServiceRef, ServiceRegistry};
use arbor_types::{validate_name, ApplicationId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default interval between lock attempts in [`ServiceCache::lock_service`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest accepted poll interval; shorter values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A node in the chain of service-holding scopes.
pub struct ServiceCache {
    parent: Option<Arc<ServiceCache>>,
    registry: Arc<ServiceRegistry>,
    token: ApplicationId,
    poll_interval: Duration,
    held: Mutex<HashMap<String, ServiceRef>>,
}

impl ServiceCache {
    /// Creates the top of a chain for one application.
    ///
    /// `poll_interval` is raised to [`MIN_POLL_INTERVAL`] if shorter.
    #[must_use]
    pub fn root(
        registry: Arc<ServiceRegistry>,
        token: ApplicationId,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            registry,
            token,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            held: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a scope chained below `parent`.
    #[must_use]
    pub fn child(parent: &Arc<ServiceCache>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            registry: Arc::clone(&parent.registry),
            token: parent.token,
            poll_interval: parent.poll_interval,
            held: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the token locks are acquired with.
    #[must_use]
    pub fn token(&self) -> ApplicationId {
        self.token
    }

    /// Returns the longest single wait between lock attempts.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the parent scope.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<ServiceCache>> {
        self.parent.as_ref()
    }

    /// Returns the registry this chain resolves names against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Returns `true` if this cache itself holds `name`.
    #[must_use]
    pub fn holds(&self, name: &str) -> bool {
        self.held.lock().contains_key(name.trim())
    }

    /// Returns the names this cache itself holds, sorted.
    #[must_use]
    pub fn held_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.held.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn ancestors_hold(&self, name: &str) -> Option<ServiceRef> {
        let mut scope = self.parent.as_deref();
        while let Some(cache) = scope {
            if let Some(entry) = cache.held.lock().get(name) {
                return Some(entry.clone());
            }
            scope = cache.parent.as_deref();
        }
        None
    }

    fn lookup(&self, name: &str) -> Result<(String, ServiceRef), ServiceError> {
        let name = validate_name(name, "service")?;
        match self.registry.get(&name) {
            Some(entry) => Ok((name, entry)),
            None => Err(ServiceError::UnknownService { name }),
        }
    }

    /// Attempts to lock `name` once, without waiting.
    ///
    /// # Errors
    ///
    /// Fails if the service is unknown or shared, or if this cache or an
    /// ancestor already holds it.
    pub fn try_lock_service(&self, name: &str) -> Result<Option<ServiceRef>, ServiceError> {
        let (name, entry) = self.lookup(name)?;
        if !entry.is_exclusive() {
            return Err(ServiceError::NotExclusive { name });
        }

        let mut held = self.held.lock();
        if held.contains_key(&name) || self.ancestors_hold(&name).is_some() {
            return Err(ServiceError::AlreadyHeld { name });
        }
        if !entry.lock().try_acquire(self.token) {
            trace!(service = %name, app = %self.token, "Service lock contended");
            return Ok(None);
        }
        debug!(service = %name, app = %self.token, "Service locked");
        held.insert(name, entry.clone());
        Ok(Some(entry))
    }

    /// Locks `name`, retrying until it succeeds or `timeout` elapses.
    ///
    /// Between attempts the caller waits for a release notification, never
    /// longer than the poll interval. A zero timeout makes exactly one
    /// attempt.
    ///
    /// Returns `Ok(None)` on timeout; the caller should take a fallback path.
    ///
    /// # Errors
    ///
    /// Same as [`try_lock_service`](Self::try_lock_service). Errors are
    /// returned immediately, never after waiting.
    pub fn lock_service(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<ServiceRef>, ServiceError> {
        let (_, entry) = self.lookup(name)?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(locked) = self.try_lock_service(name)? {
                return Ok(Some(locked));
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(
                    service = %entry.name(),
                    app = %self.token,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for service lock"
                );
                return Ok(None);
            }
            entry
                .lock()
                .wait_released(self.poll_interval.min(deadline - now));
        }
    }

    /// Returns a service for use.
    ///
    /// Shared services are always available. Exclusive services require this
    /// cache or an ancestor to hold the lock.
    ///
    /// # Errors
    ///
    /// Fails if the service is unknown, or exclusive and not held in the chain.
    pub fn get_service(&self, name: &str) -> Result<ServiceRef, ServiceError> {
        let (name, entry) = self.lookup(name)?;
        if !entry.is_exclusive() {
            return Ok(entry);
        }
        if let Some(held) = self.held.lock().get(&name) {
            return Ok(held.clone());
        }
        self.ancestors_hold(&name)
            .ok_or(ServiceError::NotLocked { name })
    }

    /// Releases a lock this cache itself holds.
    ///
    /// # Errors
    ///
    /// Fails if this cache does not hold `name`, even when an ancestor does.
    pub fn release_service(&self, name: &str) -> Result<(), ServiceError> {
        let name = validate_name(name, "service")?;
        let entry = self
            .held
            .lock()
            .remove(&name)
            .ok_or_else(|| ServiceError::NotHeldHere { name: name.clone() })?;
        entry.lock().release_if_held(self.token);
        debug!(service = %name, app = %self.token, "Service released");
        Ok(())
    }

    /// Releases every lock this cache holds.
    pub fn release_locks(&self) {
        let drained: Vec<ServiceRef> = self.held.lock().drain().map(|(_, e)| e).collect();
        for entry in drained {
            if entry.lock().release_if_held(self.token) {
                debug!(service = %entry.name(), app = %self.token, "Service released on teardown");
            }
        }
    }
}

impl Drop for ServiceCache {
    fn drop(&mut self) {
        for (_, entry) in self.held.get_mut().drain() {
            entry.lock().release_if_held(self.token);
        }
    }
}

impl fmt::Debug for ServiceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCache")
            .field("token", &self.token)
            .field("held", &self.held_names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Service;
    use std::thread;

    struct Exclusive;
    impl Service for Exclusive {
        fn is_exclusive(&self) -> bool {
            true
        }
    }

    struct Shared;
    impl Service for Shared {}

    fn registry() -> Arc<ServiceRegistry> {
        let registry = ServiceRegistry::new();
        registry.register("S", Exclusive).expect("register S");
        registry.register("T", Exclusive).expect("register T");
        registry.register("clock", Shared).expect("register clock");
        Arc::new(registry)
    }

    fn root(registry: &Arc<ServiceRegistry>) -> Arc<ServiceCache> {
        ServiceCache::root(
            Arc::clone(registry),
            ApplicationId::new(),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn try_lock_records_hold() {
        let registry = registry();
        let cache = root(&registry);

        let entry = cache.try_lock_service("S").expect("ok").expect("acquired");
        assert_eq!(entry.name(), "S");
        assert!(cache.holds("S"));
        assert_eq!(entry.lock().holder(), Some(cache.token()));
    }

    #[test]
    fn unknown_service_is_error() {
        let cache = root(&registry());
        assert_eq!(
            cache.try_lock_service("nope").unwrap_err(),
            ServiceError::UnknownService {
                name: "nope".into()
            }
        );
        assert!(cache.get_service("nope").is_err());
    }

    #[test]
    fn locking_shared_service_is_error() {
        let cache = root(&registry());
        assert_eq!(
            cache.try_lock_service("clock").unwrap_err(),
            ServiceError::NotExclusive {
                name: "clock".into()
            }
        );
    }

    #[test]
    fn relock_in_same_cache_is_error() {
        let cache = root(&registry());
        cache.try_lock_service("S").expect("ok").expect("acquired");
        assert_eq!(
            cache.try_lock_service("S").unwrap_err(),
            ServiceError::AlreadyHeld { name: "S".into() }
        );
    }

    #[test]
    fn relock_below_holder_is_error_and_does_not_block() {
        let cache = root(&registry());
        let child = ServiceCache::child(&cache);
        let grandchild = ServiceCache::child(&child);
        cache.try_lock_service("S").expect("ok").expect("acquired");

        let start = Instant::now();
        let err = grandchild
            .lock_service("S", Duration::from_secs(5))
            .unwrap_err();
        assert_eq!(err, ServiceError::AlreadyHeld { name: "S".into() });
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sibling_scopes_contend() {
        let cache = root(&registry());
        let left = ServiceCache::child(&cache);
        let right = ServiceCache::child(&cache);

        assert!(left.try_lock_service("S").expect("ok").is_some());
        assert!(right.try_lock_service("S").expect("ok").is_none());
    }

    #[test]
    fn other_application_contends() {
        let registry = registry();
        let a = root(&registry);
        let b = root(&registry);

        assert!(a.try_lock_service("S").expect("ok").is_some());
        assert!(b.try_lock_service("S").expect("ok").is_none());
        assert!(b.try_lock_service("T").expect("ok").is_some());
    }

    #[test]
    fn lock_service_times_out_with_none() {
        let registry = registry();
        let a = root(&registry);
        let b = root(&registry);
        a.try_lock_service("S").expect("ok").expect("acquired");

        let start = Instant::now();
        let result = b.lock_service("S", Duration::from_millis(60)).expect("ok");
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(a.holds("S"));
    }

    #[test]
    fn lock_service_acquires_after_release() {
        let registry = registry();
        let a = root(&registry);
        let b = root(&registry);
        a.try_lock_service("S").expect("ok").expect("acquired");

        let releaser = {
            let a = Arc::clone(&a);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                a.release_locks();
            })
        };

        let result = b.lock_service("S", Duration::from_secs(5)).expect("ok");
        assert!(result.is_some());
        assert!(b.holds("S"));
        releaser.join().expect("releaser thread");
    }

    #[test]
    fn get_shared_service_without_lock() {
        let cache = root(&registry());
        assert_eq!(cache.get_service("clock").expect("shared").name(), "clock");
    }

    #[test]
    fn get_exclusive_requires_hold_in_chain() {
        let cache = root(&registry());
        let child = ServiceCache::child(&cache);

        assert_eq!(
            child.get_service("S").unwrap_err(),
            ServiceError::NotLocked { name: "S".into() }
        );

        cache.try_lock_service("S").expect("ok").expect("acquired");
        assert!(cache.get_service("S").is_ok());
        assert!(child.get_service("S").is_ok());
    }

    #[test]
    fn release_requires_own_hold() {
        let cache = root(&registry());
        let child = ServiceCache::child(&cache);
        cache.try_lock_service("S").expect("ok").expect("acquired");

        assert_eq!(
            child.release_service("S").unwrap_err(),
            ServiceError::NotHeldHere { name: "S".into() }
        );
        cache.release_service("S").expect("release");
        assert!(!cache.holds("S"));
        assert!(cache.release_service("S").is_err());
    }

    #[test]
    fn release_locks_frees_everything() {
        let registry = registry();
        let cache = root(&registry);
        cache.try_lock_service("S").expect("ok").expect("S");
        cache.try_lock_service("T").expect("ok").expect("T");
        assert_eq!(cache.held_names(), vec!["S".to_string(), "T".to_string()]);

        cache.release_locks();
        assert!(cache.held_names().is_empty());

        let other = root(&registry);
        assert!(other.try_lock_service("S").expect("ok").is_some());
        assert!(other.try_lock_service("T").expect("ok").is_some());

        // Nothing held: must not fail.
        cache.release_locks();
    }

    #[test]
    fn zero_poll_interval_is_raised() {
        let cache = ServiceCache::root(registry(), ApplicationId::new(), Duration::ZERO);
        assert_eq!(cache.poll_interval(), MIN_POLL_INTERVAL);
        assert_eq!(ServiceCache::child(&cache).poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn late_teardown_keeps_lock_taken_over_by_another_application() {
        let registry = registry();
        let stale = root(&registry);
        stale.try_lock_service("S").expect("ok").expect("acquired");
        stale.try_lock_service("T").expect("ok").expect("acquired");

        // forced release at application stop, then another application takes S
        registry.application_stopped(&stale.token());
        let other = root(&registry);
        other.try_lock_service("S").expect("ok").expect("acquired");

        stale.release_locks();
        assert_eq!(registry.get("S").expect("S").lock().holder(), Some(other.token()));
        assert!(!registry.get("T").expect("T").lock().is_locked());
        assert!(stale.held_names().is_empty());
    }

    #[test]
    fn late_drop_keeps_lock_taken_over_by_another_application() {
        let registry = registry();
        let other = root(&registry);
        {
            let stale = root(&registry);
            stale.try_lock_service("S").expect("ok").expect("acquired");
            registry.application_stopped(&stale.token());
            other.try_lock_service("S").expect("ok").expect("acquired");
        }
        assert_eq!(registry.get("S").expect("S").lock().holder(), Some(other.token()));
    }

    #[test]
    fn drop_releases_held_locks() {
        let registry = registry();
        {
            let cache = root(&registry);
            cache.try_lock_service("S").expect("ok").expect("acquired");
        }
        let entry = registry.get("S").expect("registered");
        assert!(!entry.lock().is_locked());
    }
}
