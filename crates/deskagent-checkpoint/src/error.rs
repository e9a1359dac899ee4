//! Error types for checkpoint storage backends.

use thiserror::Error;

/// Errors raised by checkpoint savers.
///
/// Integrity failures must propagate to the caller; a run must never
/// continue on a checkpoint that silently failed to persist.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The supplied configuration is missing a required field
    #[error("Invalid checkpoint config: {0}")]
    Invalid(String),

    /// No checkpoint matched the requested configuration
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// Checkpoint payload could not be serialized or deserialized
    #[error("Checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying SQLite store returned an error
    #[error("Checkpoint database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
