//! Core error types

use thiserror::Error;

/// Core error type for Murmuration
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be parsed or validated
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
