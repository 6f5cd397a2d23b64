//! Shared services and the service locking protocol.
//!
//! Services are external collaborators registered once per process in a
//! [`ServiceRegistry`]. A service is either **shared** (usable by anyone)
//! or **exclusive** (usable only while its [`ServiceLock`] is held).
//!
//! Locks are held on behalf of an application, through a chain of
//! [`ServiceCache`] scopes that mirrors the controller tree. See the
//! [`cache`] module for the full protocol.
//!
//! # Example
//!
//! ```
//! use arbor_service::{Service, ServiceCache, ServiceRegistry, DEFAULT_POLL_INTERVAL};
//! use arbor_types::ApplicationId;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Printer;
//! impl Service for Printer {
//!     fn is_exclusive(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let registry = Arc::new(ServiceRegistry::new());
//! registry.register("printer", Printer)?;
//!
//! let scope = ServiceCache::root(Arc::clone(&registry), ApplicationId::new(), DEFAULT_POLL_INTERVAL);
//! let printer = scope.lock_service("printer", Duration::from_millis(500))?;
//! assert!(printer.is_some());
//!
//! scope.release_locks();
//! # Ok::<(), arbor_service::ServiceError>(())
//! ```

pub mod cache;
mod error;
mod lock;
mod registry;
mod service;

pub use cache::{ServiceCache, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use error::ServiceError;
pub use lock::ServiceLock;
pub use registry::ServiceRegistry;
pub use service::{Service, ServiceRef};
