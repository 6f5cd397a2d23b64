//! Core types for the arbor execution engine.
//!
//! This crate holds the small vocabulary every other arbor crate speaks:
//! instance identifiers, validated names, parameter bags and the shared
//! error-code interface.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  arbor-types    : ids, names, Params, ErrorCode   ◄── HERE   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  arbor-service  : Service, ServiceRegistry, ServiceCache     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  arbor-runtime  : Application, Controller, State, events    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use arbor_types::{ApplicationId, ErrorCode, Params};
//!
//! let token = ApplicationId::new();
//! println!("running as {token}");
//!
//! let params = Params::new().with("id", "7")?;
//! assert_eq!(params.get_str("id")?, "7");
//!
//! let err = params.get("page").unwrap_err();
//! assert_eq!(err.code(), "VALIDATION_MISSING_PARAM");
//! # Ok::<(), arbor_types::ValidationError>(())
//! ```

mod error;
mod id;
mod name;
mod params;

pub use error::{assert_error_code, assert_error_codes, ErrorCode, ValidationError};
pub use id::{ApplicationId, ControllerId};
pub use name::validate_name;
pub use params::Params;
