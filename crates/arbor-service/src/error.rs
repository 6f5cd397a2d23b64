//! Service registry and locking errors.
//!
//! Contention is not an error: a lock attempt that loses to another
//! application returns `Ok(None)`. Everything below is either a wiring
//! mistake (unknown or duplicate names) or a violation of the locking
//! protocol by the application built on the engine.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | `UnknownService` | `SERVICE_UNKNOWN` | No |
//! | `AlreadyRegistered` | `SERVICE_ALREADY_REGISTERED` | No |
//! | `NotExclusive` | `SERVICE_NOT_EXCLUSIVE` | No |
//! | `AlreadyHeld` | `SERVICE_ALREADY_HELD` | No |
//! | `NotLocked` | `SERVICE_NOT_LOCKED` | No |
//! | `NotHeldHere` | `SERVICE_NOT_HELD_HERE` | No |
//! | `InvalidName` | `SERVICE_INVALID_NAME` | Yes |

use arbor_types::{ErrorCode, ValidationError};
use thiserror::Error;

/// Errors raised by [`ServiceRegistry`](crate::ServiceRegistry) and
/// [`ServiceCache`](crate::ServiceCache).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No service is registered under this name.
    #[error("unknown service '{name}'")]
    UnknownService { name: String },

    /// A service is already registered under this name.
    #[error("service '{name}' is already registered")]
    AlreadyRegistered { name: String },

    /// Locking was requested for a shared service.
    #[error("service '{name}' is shared and cannot be locked")]
    NotExclusive { name: String },

    /// This scope or one of its ancestors already holds the service.
    #[error("service '{name}' is already locked by this scope or an ancestor")]
    AlreadyHeld { name: String },

    /// An exclusive service was used without holding its lock in the chain.
    #[error("service '{name}' is exclusive and must be locked before use")]
    NotLocked { name: String },

    /// Release was requested by a scope that does not itself hold the lock.
    #[error("service '{name}' is not locked by this scope")]
    NotHeldHere { name: String },

    /// The service name failed validation.
    #[error(transparent)]
    InvalidName(#[from] ValidationError),
}

impl ErrorCode for ServiceError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownService { .. } => "SERVICE_UNKNOWN",
            Self::AlreadyRegistered { .. } => "SERVICE_ALREADY_REGISTERED",
            Self::NotExclusive { .. } => "SERVICE_NOT_EXCLUSIVE",
            Self::AlreadyHeld { .. } => "SERVICE_ALREADY_HELD",
            Self::NotLocked { .. } => "SERVICE_NOT_LOCKED",
            Self::NotHeldHere { .. } => "SERVICE_NOT_HELD_HERE",
            Self::InvalidName(_) => "SERVICE_INVALID_NAME",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidName(_))
    }
}
