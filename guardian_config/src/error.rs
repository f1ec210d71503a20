//! Error types for the guardian configuration library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading guardian configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read configuration from {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration YAML.
    #[error("failed to parse configuration from {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to serialize configuration to YAML.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] serde_yaml::Error),

    /// Configuration file not found.
    #[error("configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Permission denied when accessing the configuration file.
    #[error("permission denied accessing configuration at {path}: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// An actionable hint for the user, when there is one.
    pub fn help(&self) -> Option<String> {
        match self {
            ConfigError::NotFound(path) => Some(format!(
                "create {} or drop --config to use the built-in defaults",
                path.display()
            )),
            ConfigError::ParseError { .. } => Some(
                "every section is optional; `guardian config` prints a complete example".into(),
            ),
            ConfigError::PermissionDenied { path, .. } => {
                Some(format!("check the permissions of {}", path.display()))
            }
            _ => None,
        }
    }
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
