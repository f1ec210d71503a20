use std::fs::OpenOptions;
use std::path::PathBuf;

use guardian_config::LoggingConfig;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;

use crate::paths;

/// Environment variable overriding the log file location.
pub const LOG_ENV_VAR: &str = "GUARDIAN_LOG";

const LOG_FILE: &str = "security-guardian.log";

/// Where diagnostic logs go: `GUARDIAN_LOG` or `<log_directory>/security-guardian.log`.
pub fn log_file_path(config: &LoggingConfig) -> PathBuf {
    std::env::var(LOG_ENV_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(paths::expand(&config.log_directory)).join(LOG_FILE))
}

pub fn init_tracing(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }

    let log_path = log_file_path(config);

    // Ensure parent directory exists.
    let log_file = log_path
        .parent()
        .and_then(|parent| std::fs::create_dir_all(parent).ok())
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .ok()
        });

    let layer: Box<dyn Layer<_> + Send + Sync> = match log_file {
        Some(file) => tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_filter(LevelFilter::from_level(Level::DEBUG))
            .boxed(),
        None => {
            // Stderr carries the hook's message to the agent; keep it quiet.
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(LevelFilter::from_level(Level::WARN))
                .boxed()
        }
    };

    let _ = tracing_subscriber::registry().with(layer).try_init();
}
