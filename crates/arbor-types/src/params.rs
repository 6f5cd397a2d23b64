//! Named argument bags.
//!
//! [`Params`] carries arguments into a lifecycle call: the params a state is
//! entered with, the params a child controller is started with, the params
//! of a fired event. Values are opaque [`serde_json::Value`]s.
//!
//! # Rules
//!
//! - Names are trimmed and must not be empty.
//! - `null` values are rejected.
//! - Adding a name twice is an error, as is reading a missing name.
//!
//! # Example
//!
//! ```
//! use arbor_types::Params;
//!
//! let params = Params::new()
//!     .with("id", "7")?
//!     .with("limit", 25)?;
//!
//! assert_eq!(params.get_str("id")?, "7");
//! assert_eq!(params.get("limit")?, &serde_json::json!(25));
//! assert!(params.get("missing").is_err());
//! # Ok::<(), arbor_types::ValidationError>(())
//! ```

use crate::{validate_name, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An unordered mapping from validated names to non-null values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    values: HashMap<String, Value>,
}

impl Params {
    /// Creates an empty parameter bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, consuming and returning the bag.
    ///
    /// # Errors
    ///
    /// Fails on a blank name, a `null` value, or a name already present.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, ValidationError> {
        self.add(name, value)?;
        Ok(self)
    }

    /// Adds a parameter in place.
    ///
    /// # Errors
    ///
    /// Fails on a blank name, a `null` value, or a name already present.
    pub fn add(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        let name = validate_name(name, "param")?;
        let value = value.into();
        if value.is_null() {
            return Err(ValidationError::NullValue { name });
        }
        if self.values.contains_key(&name) {
            return Err(ValidationError::DuplicateParam { name });
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Returns the value of `name`.
    ///
    /// # Errors
    ///
    /// Fails on a blank name or when the parameter was never added.
    pub fn get(&self, name: &str) -> Result<&Value, ValidationError> {
        let name = validate_name(name, "param")?;
        self.values
            .get(&name)
            .ok_or(ValidationError::MissingParam { name })
    }

    /// Returns the value of `name`, or `None` when absent or the name is blank.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<&Value> {
        self.values.get(name.trim())
    }

    /// Returns the value of `name` as a string slice.
    ///
    /// # Errors
    ///
    /// Fails when the parameter is missing or is not a JSON string.
    pub fn get_str(&self, name: &str) -> Result<&str, ValidationError> {
        self.get(name)?
            .as_str()
            .ok_or_else(|| ValidationError::WrongType {
                name: name.trim().to_string(),
                expected: "string",
            })
    }

    /// Removes `name` and returns its value.
    ///
    /// # Errors
    ///
    /// Fails on a blank name or when the parameter was never added.
    pub fn remove(&mut self, name: &str) -> Result<Value, ValidationError> {
        let name = validate_name(name, "param")?;
        self.values
            .remove(&name)
            .ok_or(ValidationError::MissingParam { name })
    }

    /// Returns `true` if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name.trim())
    }

    /// Returns all parameter names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameters are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl TryFrom<serde_json::Map<String, Value>> for Params {
    type Error = ValidationError;

    fn try_from(map: serde_json::Map<String, Value>) -> Result<Self, Self::Error> {
        let mut params = Self::new();
        for (name, value) in map {
            params.add(&name, value)?;
        }
        Ok(params)
    }
}
