//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # Example
///
/// ```
/// use arbor_runtime::config::RuntimeConfig;
///
/// let config = RuntimeConfig::from_toml(
///     r#"
/// [locking]
/// poll_interval_ms = 25
/// "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.locking.poll_interval_ms, 25);
/// assert!(config.resources.cache_properties);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Service locking settings.
    pub locking: LockingConfig,

    /// Resource and property file settings.
    pub resources: ResourcesConfig,
}

impl RuntimeConfig {
    /// Serializes to a pretty TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values in `other` that differ from the defaults win.
    pub fn merge(&mut self, other: &Self) {
        self.locking.merge(&other.locking);
        self.resources.merge(&other.resources);
    }
}

/// Service locking settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LockingConfig {
    /// Longest single wait between lock attempts, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl LockingConfig {
    /// Returns the poll interval as a [`Duration`], at least one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    fn merge(&mut self, other: &Self) {
        if other.poll_interval_ms != Self::default().poll_interval_ms {
            self.poll_interval_ms = other.poll_interval_ms;
        }
    }
}

/// Resource and property file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Directory serving resources for controllers without their own loader.
    pub base_dir: Option<PathBuf>,

    /// Keep parsed property files per controller instead of re-reading them.
    pub cache_properties: bool,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            cache_properties: true,
        }
    }
}

impl ResourcesConfig {
    fn merge(&mut self, other: &Self) {
        if other.base_dir.is_some() {
            self.base_dir = other.base_dir.clone();
        }
        if other.cache_properties != Self::default().cache_properties {
            self.cache_properties = other.cache_properties;
        }
    }
}
