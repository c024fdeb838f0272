//! Logging initialization
//!
//! Console output always, plus an optional plain-text log file. The filter
//! defaults to `info` and honours `RUST_LOG`.

use std::fs::File;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::error::{AppError, AppResult};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the global subscriber
///
/// # Arguments
/// * `log_file_path` - Optional path of a file that mirrors console output
///
/// # Returns
/// * `Ok(())` - Subscriber installed
/// * `Err(AppError::Config)` - File could not be created or a subscriber was already set
pub fn init_logger(log_file_path: Option<&str>) -> AppResult<()> {
    let console = fmt::layer().with_target(false);

    let file_layer = match log_file_path {
        Some(path) => {
            let file = File::create(path).map_err(|e| AppError::Config(format!("Failed to create log file: {}", e)))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialize logger: {}", e)))?;

    Ok(())
}
