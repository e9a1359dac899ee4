//! Engine error types.

use thiserror::Error;

/// Errors raised by the agent engine.
///
/// Tool-level failures are surfaced to the model as `"Error: ..."` tool
/// results rather than aborting the run; these variants carry the text for
/// that surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid input (bad arguments, missing pending action, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A security policy rejected the operation before execution
    #[error("Security violation: {0}")]
    Security(String),

    /// A referenced path or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A tool ran out of its time budget
    #[error("Execution error: {0}")]
    Timeout(String),

    /// Filesystem or process I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A model provider failed
    #[error(transparent)]
    Llm(#[from] deskagent_llm::LlmError),

    /// The graph runtime failed
    #[error(transparent)]
    Graph(#[from] deskagent_graph::GraphError),

    /// Checkpoint persistence failed
    #[error(transparent)]
    Checkpoint(#[from] deskagent_checkpoint::CheckpointError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
