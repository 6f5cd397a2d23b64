//! Name validation.
//!
//! Controllers, states, events, outputs, parameters and services are all
//! addressed by name. Names are trimmed and must not be empty afterwards.

use crate::ValidationError;

/// Trims `name` and rejects it when nothing remains.
///
/// `kind` names what is being validated and ends up in the error message.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyName`] for empty or whitespace-only input.
///
/// # Example
///
/// ```
/// use arbor_types::validate_name;
///
/// assert_eq!(validate_name("  listing ", "state").unwrap(), "listing");
/// assert!(validate_name("   ", "state").is_err());
/// ```
pub fn validate_name(name: &str, kind: &'static str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName { kind });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(validate_name("\tedit\n", "event"), Ok("edit".to_string()));
    }

    #[test]
    fn keeps_inner_whitespace() {
        assert_eq!(validate_name("a b", "event"), Ok("a b".to_string()));
    }

    #[test]
    fn rejects_blank() {
        assert_eq!(
            validate_name("", "output"),
            Err(ValidationError::EmptyName { kind: "output" })
        );
        assert_eq!(
            validate_name("  ", "param"),
            Err(ValidationError::EmptyName { kind: "param" })
        );
    }
}
