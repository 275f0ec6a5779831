//! Error types for checkpoint storage operations.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while saving, loading, or listing checkpoints.
///
/// This is the concrete error type behind the spec's `SerializationError`
/// taxonomy entry; `workflow_core::error::GraphError` wraps it via `#[from]`.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists for the given id.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// The checkpoint payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store (directory, connection, etc.) reported a failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A checkpoint was read but failed schema validation (missing required field).
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// Filesystem I/O failure in the file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
