//! Configuration loader with layered merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.arbor/config.toml`)
//! 3. Explicit config file ([`ConfigLoader::with_file`])
//! 4. Environment variables (`ARBOR_*`)
//!
//! Each layer overrides the previous.
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ARBOR_LOCK_POLL_INTERVAL_MS` | `locking.poll_interval_ms` |
//! | `ARBOR_RESOURCE_DIR` | `resources.base_dir` |
//! | `ARBOR_CACHE_PROPERTIES` | `resources.cache_properties` |

use super::{default_config_path, ConfigError, RuntimeConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing boolean environment variables.
macro_rules! parse_env_bool {
    ($lookup:expr, $field:expr, $var:literal) => {
        if let Some(val) = $lookup($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use arbor_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_file("/etc/arbor/engine.toml")
///     .skip_env_vars()
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.arbor/config.toml).
    global_config_path: Option<PathBuf>,

    /// Explicit config file layered over the global one.
    file: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip global config loading.
    skip_global: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets an explicit config file, merged after the global config.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be read or
    /// parsed, or an environment variable has an invalid value. Missing
    /// config files are silently ignored.
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let mut config = RuntimeConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_config) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        if let Some(ref path) = self.file {
            if let Some(file_config) = load_file(path)? {
                debug!(path = %path.display(), "Loaded config file");
                config.merge(&file_config);
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config, |name| std::env::var(name).ok())?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning None if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<RuntimeConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config =
        RuntimeConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

    Ok(Some(config))
}

/// Applies environment variable overrides read through `lookup`.
fn apply_env_vars(
    config: &mut RuntimeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(val) = lookup("ARBOR_LOCK_POLL_INTERVAL_MS") {
        config.locking.poll_interval_ms = match val.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                return Err(ConfigError::invalid_env_var(
                    "ARBOR_LOCK_POLL_INTERVAL_MS",
                    "expected positive integer",
                ))
            }
        };
    }

    if let Some(val) = lookup("ARBOR_RESOURCE_DIR") {
        config.resources.base_dir = Some(PathBuf::from(val));
    }

    parse_env_bool!(
        lookup,
        config.resources.cache_properties,
        "ARBOR_CACHE_PROPERTIES"
    );

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn load_global_config() {
        let temp = TempDir::new().unwrap();
        let path = create_config_file(
            temp.path(),
            "config.toml",
            r#"
[locking]
poll_interval_ms = 40
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config.locking.poll_interval_ms, 40);
    }

    #[test]
    fn explicit_file_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = create_config_file(
            temp.path(),
            "global.toml",
            r#"
[locking]
poll_interval_ms = 40

[resources]
base_dir = "/srv/global"
"#,
        );
        let file = create_config_file(
            temp.path(),
            "engine.toml",
            r#"
[locking]
poll_interval_ms = 10
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global)
            .with_file(&file)
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config.locking.poll_interval_ms, 10);
        assert_eq!(config.resources.base_dir, Some(PathBuf::from("/srv/global")));
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_file("/nonexistent/engine.toml")
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = create_config_file(temp.path(), "bad.toml", "[locking\npoll = ");

        let err = ConfigLoader::new()
            .skip_global_config()
            .with_file(&path)
            .skip_env_vars()
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_overrides() {
        let mut config = RuntimeConfig::default();
        apply_env_vars(
            &mut config,
            env(&[
                ("ARBOR_LOCK_POLL_INTERVAL_MS", " 15 "),
                ("ARBOR_RESOURCE_DIR", "/srv/res"),
                ("ARBOR_CACHE_PROPERTIES", "off"),
            ]),
        )
        .unwrap();

        assert_eq!(config.locking.poll_interval_ms, 15);
        assert_eq!(config.resources.base_dir, Some(PathBuf::from("/srv/res")));
        assert!(!config.resources.cache_properties);
    }

    #[test]
    fn env_invalid_values() {
        let mut config = RuntimeConfig::default();
        let err = apply_env_vars(&mut config, env(&[("ARBOR_LOCK_POLL_INTERVAL_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("ARBOR_LOCK_POLL_INTERVAL_MS"));

        let err = apply_env_vars(&mut config, env(&[("ARBOR_LOCK_POLL_INTERVAL_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
        assert_eq!(config.locking.poll_interval_ms, 100);

        let err = apply_env_vars(&mut config, env(&[("ARBOR_CACHE_PROPERTIES", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("expected bool"));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
