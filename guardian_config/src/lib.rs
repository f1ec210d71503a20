//! # Guardian Config
//!
//! Policy configuration for the security guardian: the YAML schema, the
//! built-in defaults, environment-variable expansion and config-file
//! discovery.
//!
//! ```rust,no_run
//! use guardian_config::{ConfigLocator, load_effective};
//!
//! let (config, source) = load_effective(&ConfigLocator::new()).unwrap();
//! if let Some(path) = source {
//!     println!("loaded {}", path.display());
//! }
//! println!("{} hard-blocked git patterns", config.git.hard_blocked.len());
//! ```
//!
//! Every section and field is optional. Anything left out takes the shipped
//! default, so `{}` is a complete configuration.

pub mod error;
pub mod expand;
pub mod io;
pub mod paths;
pub mod types;

pub use error::{ConfigError, Result};
pub use expand::{expand_env_vars, expand_with};
pub use io::{load_config, load_config_optional, load_effective, parse_config, to_yaml};
pub use paths::{CONFIG_ENV_VAR, ConfigLocator, find_ancestor_with};
pub use types::{
    BypassPreventionConfig, DirectoriesConfig, DownloadProtectionConfig, GitConfig,
    GuardianConfig, LoggingConfig, ProtectedPathsConfig, UnpackProtectionConfig,
};
