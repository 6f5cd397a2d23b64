//! Configuration errors.

use arbor_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid environment variable value.
    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl ConfigError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse TOML error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid env var error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } => "CONFIG_PARSE_TOML",
            Self::Serialize(_) => "CONFIG_SERIALIZE",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
        }
    }

    fn is_recoverable(&self) -> bool {
        // All of these are fixed by editing a file or the environment.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::assert_error_code;

    #[test]
    fn error_display() {
        let err = ConfigError::invalid_env_var("ARBOR_LOCK_POLL_INTERVAL_MS", "expected integer");
        assert!(err.to_string().contains("ARBOR_LOCK_POLL_INTERVAL_MS"));
        assert!(err.to_string().contains("expected integer"));
    }

    #[test]
    fn codes_are_valid() {
        let read = ConfigError::read_file(
            "/tmp/x.toml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_error_code(&read, "CONFIG_");
        assert_error_code(&ConfigError::invalid_env_var("X", "bad"), "CONFIG_");

        let parse = toml::from_str::<toml::Value>("= broken").unwrap_err();
        assert_error_code(&ConfigError::parse_toml("/tmp/x.toml", parse), "CONFIG_");
    }
}
