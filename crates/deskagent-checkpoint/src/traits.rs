//! The storage contract all checkpoint backends implement.
//!
//! # Overview
//!
//! [`CheckpointSaver`] is the seam between the graph executor and durable
//! storage. Backends must be `Send + Sync`; concurrent `put`/`put_writes`
//! calls for different threads may interleave freely, but writes for one
//! `(thread_id, checkpoint_ns, checkpoint_id)` must be serialized.
//!
//! Contract summary:
//!
//! - `get_tuple` — most recent checkpoint for `(thread_id, namespace)`, or
//!   the exact one when `checkpoint_id` is set. `Ok(None)` when nothing is
//!   stored; errors are reserved for storage failures.
//! - `list` — newest-first stream; `before` cuts by creation time and the
//!   metadata `filter` is an AND of equalities.
//! - `put` — insert or replace by the full key, linking the parent from the
//!   incoming config; returns a config pointing at the stored checkpoint.
//! - `put_writes` — persist pending channel writes atomically,
//!   replace-on-conflict.
//! - `delete_thread` — purge everything for a thread; other threads are
//!   unaffected.

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::Result,
};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Async stream of checkpoint tuples, newest first.
pub type CheckpointStream = Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

/// Storage backend for graph checkpoints.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch just the checkpoint for the given configuration.
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Retrieve a complete checkpoint tuple.
    ///
    /// Returns the latest checkpoint for `(thread_id, namespace)` unless
    /// `checkpoint_id` is set, in which case that exact checkpoint is
    /// returned. `Ok(None)` means no checkpoint exists for the config.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// Stream checkpoints matching the criteria, newest first.
    ///
    /// * `config` — restrict to a thread (and namespace) when provided
    /// * `filter` — metadata equalities, all of which must match
    /// * `before` — only checkpoints created before the referenced one
    /// * `limit` — maximum number of results
    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<std::collections::HashMap<String, serde_json::Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Store a checkpoint, replacing any previous one with the same key.
    ///
    /// The incoming config's `checkpoint_id` (if any) becomes the stored
    /// checkpoint's parent. Returns a config pointing at the new checkpoint,
    /// which callers thread through subsequent `put` calls to maintain the
    /// lineage chain.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig>;

    /// Persist pending channel writes for a task, atomically.
    ///
    /// Writes are keyed by `(thread, namespace, checkpoint_id, task_id, idx)`
    /// and replace on conflict, so re-running a task is idempotent.
    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()>;

    /// Delete all checkpoints and writes for a thread.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}
