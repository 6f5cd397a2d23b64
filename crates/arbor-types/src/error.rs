//! Error codes and input validation errors.
//!
//! Every error enum in the arbor crates implements [`ErrorCode`], so that a
//! host embedding the engine can branch on a stable machine-readable code
//! instead of matching display strings.
//!
//! # Code prefixes
//!
//! | Crate | Prefix |
//! |-------|--------|
//! | `arbor-types` | `VALIDATION_` |
//! | `arbor-service` | `SERVICE_` |
//! | `arbor-runtime` | `ENGINE_`, `CONFIG_` |
//!
//! # Example
//!
//! ```
//! use arbor_types::{ErrorCode, ValidationError};
//!
//! let err = ValidationError::EmptyName { kind: "event" };
//! assert_eq!(err.code(), "VALIDATION_EMPTY_NAME");
//! assert!(err.is_recoverable());
//! ```

use thiserror::Error;

/// Machine-readable classification shared by all arbor error types.
///
/// Codes are UPPER_SNAKE_CASE, carry the owning crate's prefix and never
/// change once published.
///
/// An error is *recoverable* when the caller can fix it by correcting its
/// input or by trying again later. Programming mistakes in the application
/// built on the engine (calling a destroyed node, locking twice in one
/// chain) are not recoverable.
pub trait ErrorCode {
    /// Returns the stable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the caller can recover by correcting input or retrying.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that `err` has a well-formed code starting with `expected_prefix`.
///
/// Intended for tests that enumerate every variant of an error enum.
///
/// # Panics
///
/// Panics if the code is empty, lacks the prefix, or is not UPPER_SNAKE_CASE.
///
/// # Example
///
/// ```
/// use arbor_types::{assert_error_code, ValidationError};
///
/// assert_error_code(&ValidationError::EmptyName { kind: "state" }, "VALIDATION_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Runs [`assert_error_code`] over a slice of errors.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Malformed names or parameter values supplied by a caller.
///
/// Always recoverable: the caller fixes its input and calls again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A name was empty or whitespace only.
    #[error("{kind} name must not be empty")]
    EmptyName {
        /// What was being named (`"state"`, `"event"`, `"param"`, ...).
        kind: &'static str,
    },

    /// A parameter value was `null`.
    #[error("value of parameter '{name}' must not be null")]
    NullValue { name: String },

    /// A parameter was added twice.
    #[error("parameter '{name}' already exists")]
    DuplicateParam { name: String },

    /// A parameter was read or removed but never added.
    #[error("parameter '{name}' not found")]
    MissingParam { name: String },

    /// A parameter exists but is not of the requested type.
    #[error("parameter '{name}' is not a {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },

    /// A property locator was not of the form `<file>:<property>`.
    #[error("invalid property locator '{locator}', expected '<file>:<property>'")]
    InvalidLocator { locator: String },
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyName { .. } => "VALIDATION_EMPTY_NAME",
            Self::NullValue { .. } => "VALIDATION_NULL_VALUE",
            Self::DuplicateParam { .. } => "VALIDATION_DUPLICATE_PARAM",
            Self::MissingParam { .. } => "VALIDATION_MISSING_PARAM",
            Self::WrongType { .. } => "VALIDATION_WRONG_TYPE",
            Self::InvalidLocator { .. } => "VALIDATION_INVALID_LOCATOR",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<ValidationError> {
        vec![
            ValidationError::EmptyName { kind: "state" },
            ValidationError::NullValue { name: "id".into() },
            ValidationError::DuplicateParam { name: "id".into() },
            ValidationError::MissingParam { name: "id".into() },
            ValidationError::WrongType {
                name: "id".into(),
                expected: "string",
            },
            ValidationError::InvalidLocator {
                locator: "nocolon".into(),
            },
        ]
    }

    #[test]
    fn all_codes_are_valid() {
        assert_error_codes(&all_variants(), "VALIDATION_");
    }

    #[test]
    fn validation_errors_are_recoverable() {
        assert!(all_variants().iter().all(ErrorCode::is_recoverable));
    }

    #[test]
    fn display_names_the_offender() {
        let err = ValidationError::MissingParam { name: "id".into() };
        assert_eq!(err.to_string(), "parameter 'id' not found");

        let err = ValidationError::EmptyName { kind: "event" };
        assert_eq!(err.to_string(), "event name must not be empty");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_error_code_wrong_prefix() {
        assert_error_code(&ValidationError::EmptyName { kind: "x" }, "SERVICE_");
    }

    #[test]
    fn upper_snake_case_detection() {
        assert!(is_upper_snake_case("ENGINE_STATE_NOT_FOUND"));
        assert!(is_upper_snake_case("ERROR_123"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("engine"));
        assert!(!is_upper_snake_case("_ENGINE"));
        assert!(!is_upper_snake_case("ENGINE_"));
        assert!(!is_upper_snake_case("ENGINE__X"));
    }
}
