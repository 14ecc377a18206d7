//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber from [`LoggingConfig`]. `RUST_LOG`
//! directives take precedence over the configured level.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// # Errors
/// `ConfigError` if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let console = config.log_to_console.then(|| {
        let layer = fmt::layer().with_target(true);
        if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    let file = match (config.log_to_file, &config.log_file_path) {
        (true, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file: {e}")))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            Some(if config.json_format {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install subscriber: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
