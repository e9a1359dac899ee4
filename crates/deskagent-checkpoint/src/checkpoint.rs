//! Checkpoint data structures.
//!
//! A [`Checkpoint`] is a complete snapshot of a thread's channel values at a
//! point in time, plus the node(s) the executor would run next. Snapshots
//! form a chain through `parent_checkpoint_id`, so a thread's history can be
//! listed newest-first and replayed from any point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type.
pub type CheckpointId = String;

/// Pending write tuple: `(task_id, channel, value)`.
pub type PendingWrite = (String, String, serde_json::Value);

/// Origin of a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Created from the initial input of a run
    Input,
    /// Created after a node executed inside the run loop
    Loop,
    /// Created from an external state update (approve/deny)
    Update,
}

/// Metadata stored alongside a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Step number within the thread, monotonically increasing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// Additional custom metadata, usable as a `list` filter
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// State snapshot at a given point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Checkpoint format version (currently 1)
    pub v: i32,

    /// Unique checkpoint id
    pub id: CheckpointId,

    /// Creation timestamp
    pub ts: DateTime<Utc>,

    /// Channel name -> value at the time of the snapshot
    pub channel_values: HashMap<String, serde_json::Value>,

    /// Nodes the executor will run next. Empty when the run reached END;
    /// a single interrupt target when the thread is paused for approval.
    #[serde(default)]
    pub next_nodes: Vec<String>,
}

impl Checkpoint {
    /// Current checkpoint format version.
    pub const CURRENT_VERSION: i32 = 1;

    pub fn new(
        channel_values: HashMap<String, serde_json::Value>,
        next_nodes: Vec<String>,
    ) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            channel_values,
            next_nodes,
        }
    }

    /// Create an empty checkpoint.
    pub fn empty() -> Self {
        Self::new(HashMap::new(), Vec::new())
    }
}

/// Identifies which checkpoint an operation targets.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Thread id grouping related checkpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Namespace within the thread (empty string by default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_ns: Option<String>,

    /// Specific checkpoint id; latest for the thread when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,
}

impl CheckpointConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            checkpoint_ns: None,
            checkpoint_id: None,
        }
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    pub fn with_checkpoint_ns(mut self, checkpoint_ns: impl Into<String>) -> Self {
        self.checkpoint_ns = Some(checkpoint_ns.into());
        self
    }

    /// Namespace, defaulting to the empty string.
    pub fn namespace(&self) -> &str {
        self.checkpoint_ns.as_deref().unwrap_or("")
    }
}

/// A checkpoint together with its identity, metadata and lineage.
#[derive(Debug, Clone)]
pub struct CheckpointTuple {
    /// Config pointing at this exact checkpoint
    pub config: CheckpointConfig,

    /// The snapshot itself
    pub checkpoint: Checkpoint,

    /// Metadata recorded at save time
    pub metadata: CheckpointMetadata,

    /// Config of the parent checkpoint, if any
    pub parent_config: Option<CheckpointConfig>,

    /// Uncommitted channel writes attached to this checkpoint
    pub pending_writes: Option<Vec<PendingWrite>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checkpoint_has_current_version_and_id() {
        let ckpt = Checkpoint::empty();
        assert_eq!(ckpt.v, Checkpoint::CURRENT_VERSION);
        assert!(!ckpt.id.is_empty());
        assert!(ckpt.channel_values.is_empty());
        assert!(ckpt.next_nodes.is_empty());
    }

    #[test]
    fn metadata_builder() {
        let metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Input)
            .with_step(-1)
            .with_extra("turn", serde_json::json!(3));

        assert_eq!(metadata.source, Some(CheckpointSource::Input));
        assert_eq!(metadata.step, Some(-1));
        assert_eq!(metadata.extra.get("turn"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn config_namespace_defaults_to_empty() {
        let config = CheckpointConfig::new("t1");
        assert_eq!(config.namespace(), "");

        let config = config.with_checkpoint_ns("inner");
        assert_eq!(config.namespace(), "inner");
    }

    #[test]
    fn checkpoint_roundtrips_through_json() {
        let mut values = HashMap::new();
        values.insert("messages".to_string(), serde_json::json!([{"role": "user"}]));
        let ckpt = Checkpoint::new(values, vec!["supervisor".to_string()]);

        let bytes = serde_json::to_vec(&ckpt).unwrap();
        let restored: Checkpoint = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, ckpt);
    }
}
