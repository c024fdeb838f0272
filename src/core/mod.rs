//! Core utilities: configuration, errors and logging

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::ClientConfig;
pub use error::{AppError, AppResult, AuthError, HttpError};
pub use logging::init_logger;
