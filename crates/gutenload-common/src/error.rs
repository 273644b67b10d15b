//! Error types for gutenload

use thiserror::Error;

/// Result type alias for gutenload operations
pub type Result<T> = std::result::Result<T, GutenloadError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum GutenloadError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },
}
