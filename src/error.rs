//! # Error Types
//!
//! Custom error types for the current node using `thiserror`.

use thiserror::Error;

/// Main error type for the current node
#[derive(Debug, Error)]
pub enum NodeError {
    /// Caller passed a value outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Point serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sink rejected or could not accept a batch
    #[error("Sink error: {0}")]
    Sink(String),

    /// Link association failed
    #[error("Link error: {0}")]
    Link(String),

    /// Time source could not be synchronized
    #[error("Time sync error: {0}")]
    TimeSync(String),
}

/// Result type alias for the current node
pub type Result<T> = std::result::Result<T, NodeError>;
