//! Error types for the poll watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the poll watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The watched root is neither an existing file nor a directory.
    #[error("invalid resource: {0} must be an existing file or directory")]
    InvalidResource(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
