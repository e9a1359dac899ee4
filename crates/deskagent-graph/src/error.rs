//! Error types for graph construction and execution.

use thiserror::Error;

/// Errors raised while building or running a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph structure is invalid (dangling edge, missing entry, ...)
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// A node referenced during execution does not exist
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A node executor or edge router failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// The hard step ceiling was hit, indicating mis-configured edges
    #[error("Recursion limit of {0} steps exceeded")]
    RecursionLimit(usize),

    /// A state update could not be merged
    #[error(transparent)]
    State(#[from] crate::state::StateError),

    /// Checkpoint persistence failed; the run must not continue
    #[error(transparent)]
    Checkpoint(#[from] deskagent_checkpoint::CheckpointError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
