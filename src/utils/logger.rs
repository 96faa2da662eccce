//! Logging setup
//!
//! Diagnostics go to stderr so they never interleave with command output on
//! stdout.

use crate::config::{DEFAULT_LOG_FILTER, LOG_ENV};
use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialise the tracing subscriber
///
/// # Arguments
/// * `log_level` - filter directive (trace, debug, info, warn, error or a full
///   `EnvFilter` string); when `None` the `PMAN_LOG` variable is used, then `warn`
/// * `log_file` - additionally append plain-text logs to this file
///
/// # Examples
/// ```no_run
/// use pman::utils::logger::init_logger;
///
/// init_logger(None, None).unwrap();
///
/// use std::path::PathBuf;
/// init_logger(Some("debug"), Some(PathBuf::from("/tmp/pman.log"))).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(console::colors_enabled_stderr())
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(file))
            .with_target(true)
            .with_ansi(false)
            .with_level(true);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    tracing::debug!("Logger initialized");
    Ok(())
}
