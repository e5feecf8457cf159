//! Configuration Cache Error Hierarchy
//!
//! Defines the error types of the cache and notification core, categorized by
//! the layer that raises them. Only argument and configuration errors reach the
//! caller; delivery and diff failures are absorbed where they happen.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Blank or malformed identity inputs (dataId, group, tag, encoded keys)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Listener delivery failures (filter chain, callback, executor)
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Malformed content of a recognized content type
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Local failover/snapshot file failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failures reported by the long-poll transport collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// A content filter rejected or failed to transform the content
    #[error("Filter {filter} failed: {reason}")]
    Filter { filter: String, reason: String },

    /// The listener callback returned an error
    #[error("Listener callback failed: {0}")]
    Listener(String),

    /// The listener callback panicked
    #[error("Listener callback panicked: {0}")]
    Panicked(String),

    /// The listener's executor refused the job
    #[error("Executor rejected delivery: {0}")]
    Executor(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Content could not be parsed as the declared type
    #[error("Failed to parse {content_type} content: {reason}")]
    Malformed { content_type: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during failover/snapshot access
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure with the offending path attached
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Shorthand used by the validation helpers
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
