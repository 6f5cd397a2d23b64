//! Application lifecycle listeners.

use crate::tree::ControllerHandle;
use arbor_types::ApplicationId;

/// Observer of application and controller lifecycle events.
///
/// Every method defaults to a no-op, so implementors override only what
/// they care about. Notifications are delivered synchronously, in listener
/// registration order, before the engine call that caused them returns.
///
/// Listeners must not add or remove listeners from inside a notification;
/// the change takes effect from the next notification only.
///
/// # Example
///
/// ```
/// use arbor_runtime::{ApplicationListener, ControllerHandle};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct UpdateCounter(AtomicUsize);
///
/// impl ApplicationListener for UpdateCounter {
///     fn controller_updated(&self, _controller: &ControllerHandle) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait ApplicationListener: Send + Sync {
    /// The application is about to run its startup hook.
    fn application_starting(&self, _app: &ApplicationId) {}

    /// A controller is about to run its startup hook.
    fn controller_starting(&self, _controller: &ControllerHandle) {}

    /// A controller changed state or published an output.
    fn controller_updated(&self, _controller: &ControllerHandle) {}

    /// A controller is being destroyed.
    fn controller_stopping(&self, _controller: &ControllerHandle) {}

    /// The application is stopping; its root controller is about to be
    /// destroyed.
    fn application_stopping(&self, _app: &ApplicationId) {}

    /// The application is being destroyed.
    fn application_destroying(&self, _app: &ApplicationId) {}
}
