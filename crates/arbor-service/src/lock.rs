//! Token-owned service lock.
//!
//! A [`ServiceLock`] is owned by at most one [`ApplicationId`] at a time.
//! It is **not** re-entrant: a second `try_acquire` fails even when it comes
//! from the current holder's own token. Nodes below the acquiring scope use
//! the service through their ancestor's hold instead of locking again.
//!
//! Releasing wakes every thread blocked in [`ServiceLock::wait_released`].

use arbor_types::ApplicationId;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Lock guarding one exclusive service, shared process-wide.
#[derive(Debug, Default)]
pub struct ServiceLock {
    holder: Mutex<Option<ApplicationId>>,
    released: Condvar,
}

impl ServiceLock {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `token` if nobody holds it.
    ///
    /// Returns `false` without blocking when the lock is held, including
    /// when it is held by `token` itself.
    pub fn try_acquire(&self, token: ApplicationId) -> bool {
        let mut holder = self.holder.lock();
        if holder.is_some() {
            return false;
        }
        *holder = Some(token);
        true
    }

    /// Releases the lock regardless of who holds it.
    pub fn release(&self) {
        let mut holder = self.holder.lock();
        if holder.take().is_some() {
            self.released.notify_all();
        }
    }

    /// Releases the lock only if `token` holds it.
    ///
    /// Returns `true` if a release happened.
    pub fn release_if_held(&self, token: ApplicationId) -> bool {
        let mut holder = self.holder.lock();
        if *holder == Some(token) {
            *holder = None;
            self.released.notify_all();
            true
        } else {
            false
        }
    }

    /// Returns the current holder.
    #[must_use]
    pub fn holder(&self) -> Option<ApplicationId> {
        *self.holder.lock()
    }

    /// Returns `true` if anyone holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Blocks until the lock is free or `timeout` elapses.
    ///
    /// Returns `true` if the lock was observed free. A `true` result does not
    /// reserve the lock; another thread may acquire it first.
    pub fn wait_released(&self, timeout: Duration) -> bool {
        let mut holder = self.holder.lock();
        if holder.is_none() {
            return true;
        }
        let _ = self.released.wait_for(&mut holder, timeout);
        holder.is_none()
    }
}
