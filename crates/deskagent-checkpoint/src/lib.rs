//! Durable checkpoint storage for deskagent graph threads.
//!
//! Every step of a graph run produces a snapshot of the thread's channel
//! values. This crate defines the storage contract ([`CheckpointSaver`]) and
//! two backends:
//!
//! - [`InMemorySaver`] — ephemeral, for tests and short-lived sessions
//! - [`SqliteSaver`] — embedded SQLite store; threads survive process
//!   restarts and can be inspected or rewound
//!
//! A checkpoint is identified by `(thread_id, checkpoint_ns, checkpoint_id)`.
//! Pending channel writes are persisted separately per task so a partially
//! applied step can be reconstructed.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource, CheckpointTuple,
    PendingWrite,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemorySaver;
pub use sqlite::SqliteSaver;
pub use traits::{CheckpointSaver, CheckpointStream};
