//! Instance identifiers.
//!
//! Identifiers are random UUID v4 values generated when an instance is
//! created. They are unique for the lifetime of the instance and are **not**
//! stable across destroy/recreate: restarting an application builds a new
//! controller tree whose controllers all carry fresh [`ControllerId`]s.
//!
//! | Type | Identifies | Display |
//! |------|------------|---------|
//! | [`ApplicationId`] | a running application instance, also its lock token | `app:{uuid}` |
//! | [`ControllerId`] | one started controller | `ctl:{uuid}` |

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an application instance.
///
/// Exclusive service locks are owned by this token, so every node of one
/// application tree acts on behalf of the same owner.
///
/// # Example
///
/// ```
/// use arbor_types::ApplicationId;
///
/// let a = ApplicationId::new();
/// let b = ApplicationId::new();
/// assert_ne!(a, b);
/// assert!(a.to_string().starts_with("app:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "app:{}", self.0)
    }
}

/// Identifier of a started controller.
///
/// Assigned when the controller starts; a controller recreated after a
/// restart gets a different id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub Uuid);

impl ControllerId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ControllerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ControllerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctl:{}", self.0)
    }
}
