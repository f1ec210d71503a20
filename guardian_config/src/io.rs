//! Reading the policy file from disk.
//!
//! String values are expanded (`$VAR`, `${VAR}`) before the document is
//! deserialized, so every field that holds a path can reference the
//! environment.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{Level, debug, instrument};

use crate::error::{ConfigError, Result};
use crate::expand::expand_value;
use crate::paths::ConfigLocator;
use crate::types::GuardianConfig;

/// Reads and parses a configuration file.
#[instrument(level = Level::TRACE)]
pub fn load_config(path: &Path) -> Result<GuardianConfig> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
            path: path.to_path_buf(),
            source: e,
        },
        _ => ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    parse_config(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads a configuration file, returning None if it does not exist.
#[instrument(level = Level::TRACE)]
pub fn load_config_optional(path: &Path) -> Result<Option<GuardianConfig>> {
    match load_config(path) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parses a YAML document, expanding environment references first.
///
/// An empty document yields the defaults.
pub fn parse_config(content: &str) -> std::result::Result<GuardianConfig, serde_yaml::Error> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)?;
    if value.is_null() {
        return Ok(GuardianConfig::default());
    }
    serde_yaml::from_value(expand_value(value))
}

/// Locates and loads the effective configuration.
///
/// Returns the defaults and `None` for the source path when no candidate file
/// exists.
#[instrument(level = Level::TRACE)]
pub fn load_effective(
    locator: &ConfigLocator,
) -> Result<(GuardianConfig, Option<std::path::PathBuf>)> {
    match locator.locate() {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            let config = load_config(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            debug!("no configuration file found, using defaults");
            Ok((GuardianConfig::default(), None))
        }
    }
}

/// Serializes a configuration to YAML.
pub fn to_yaml(config: &GuardianConfig) -> Result<String> {
    Ok(serde_yaml::to_string(config)?)
}
