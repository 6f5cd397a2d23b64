//! Engine configuration.
//!
//! [`RuntimeConfig`] is loaded by [`ConfigLoader`] from TOML files and
//! `ARBOR_*` environment variables, then handed to
//! [`ApplicationBuilder::config`](crate::ApplicationBuilder::config).
//!
//! ```toml
//! [locking]
//! poll_interval_ms = 100
//!
//! [resources]
//! base_dir = "/srv/app/resources"
//! cache_properties = true
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{LockingConfig, ResourcesConfig, RuntimeConfig};

/// Default config directory (`~/.arbor`).
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".arbor")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}
