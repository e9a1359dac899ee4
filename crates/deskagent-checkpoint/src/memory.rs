//! In-memory checkpoint storage for tests and ephemeral sessions.
//!
//! Stores every thread's checkpoints in an `Arc<RwLock<HashMap>>`. Nothing
//! survives a restart; use [`SqliteSaver`](crate::SqliteSaver) for durable
//! threads.

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::{CheckpointError, Result},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CheckpointEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: CheckpointConfig,
    parent_config: Option<CheckpointConfig>,
    writes: Vec<(String, String, serde_json::Value)>, // (task_id, channel, value)
}

type Storage = Arc<RwLock<HashMap<String, Vec<CheckpointEntry>>>>;

/// In-memory [`CheckpointSaver`] implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemorySaver {
    storage: Storage,
}

impl InMemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads currently tracked.
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of checkpoints across all threads.
    pub async fn checkpoint_count(&self) -> usize {
        self.storage.read().await.values().map(Vec::len).sum()
    }

    /// Drop all stored checkpoints.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }

    fn entry_to_tuple(entry: &CheckpointEntry) -> CheckpointTuple {
        CheckpointTuple {
            config: entry.config.clone(),
            checkpoint: entry.checkpoint.clone(),
            metadata: entry.metadata.clone(),
            parent_config: entry.parent_config.clone(),
            pending_writes: if entry.writes.is_empty() {
                None
            } else {
                Some(entry.writes.clone())
            },
        }
    }
}

fn require_thread_id(config: &CheckpointConfig) -> Result<&str> {
    config
        .thread_id
        .as_deref()
        .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
}

#[async_trait]
impl CheckpointSaver for InMemorySaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let storage = self.storage.read().await;
        let thread_id = require_thread_id(config)?;

        let Some(entries) = storage.get(thread_id) else {
            return Ok(None);
        };

        let entry = match &config.checkpoint_id {
            Some(id) => entries.iter().find(|e| &e.checkpoint.id == id),
            None => entries
                .iter()
                .filter(|e| e.config.namespace() == config.namespace())
                .next_back(),
        };

        Ok(entry.map(Self::entry_to_tuple))
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<HashMap<String, serde_json::Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let storage = self.storage.read().await;

        let thread_ids: Vec<String> = match config.and_then(|c| c.thread_id.clone()) {
            Some(thread_id) => vec![thread_id],
            None => storage.keys().cloned().collect(),
        };

        let before_ts = match before.and_then(|c| c.checkpoint_id.as_ref()) {
            Some(before_id) => storage
                .values()
                .flatten()
                .find(|e| &e.checkpoint.id == before_id)
                .map(|e| e.checkpoint.ts),
            None => None,
        };

        let mut results = Vec::new();
        'outer: for thread_id in thread_ids {
            let Some(entries) = storage.get(&thread_id) else {
                continue;
            };
            for entry in entries.iter().rev() {
                if let Some(cutoff) = before_ts {
                    if entry.checkpoint.ts >= cutoff {
                        continue;
                    }
                }
                if let Some(filter_map) = &filter {
                    let matches = filter_map
                        .iter()
                        .all(|(key, value)| entry.metadata.extra.get(key) == Some(value));
                    if !matches {
                        continue;
                    }
                }

                results.push(Ok(Self::entry_to_tuple(entry)));
                if let Some(lim) = limit {
                    if results.len() >= lim {
                        break 'outer;
                    }
                }
            }
        }

        Ok(Box::pin(stream::iter(results)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = require_thread_id(config)?.to_string();
        let mut storage = self.storage.write().await;
        let entries = storage.entry(thread_id.clone()).or_default();

        let stored_config = CheckpointConfig {
            thread_id: Some(thread_id.clone()),
            checkpoint_ns: config.checkpoint_ns.clone(),
            checkpoint_id: Some(checkpoint.id.clone()),
        };
        let parent_config = config
            .checkpoint_id
            .as_ref()
            .map(|parent_id| CheckpointConfig {
                thread_id: Some(thread_id),
                checkpoint_ns: config.checkpoint_ns.clone(),
                checkpoint_id: Some(parent_id.clone()),
            });

        // Replace-on-conflict by checkpoint id.
        entries.retain(|e| e.checkpoint.id != checkpoint.id);
        entries.push(CheckpointEntry {
            checkpoint,
            metadata,
            config: stored_config.clone(),
            parent_config,
            writes: Vec::new(),
        });

        Ok(stored_config)
    }

    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()> {
        let thread_id = require_thread_id(config)?;
        let checkpoint_id = config
            .checkpoint_id
            .as_ref()
            .ok_or_else(|| CheckpointError::Invalid("checkpoint_id is required".to_string()))?;

        let mut storage = self.storage.write().await;
        let entry = storage
            .get_mut(thread_id)
            .and_then(|entries| {
                entries
                    .iter_mut()
                    .find(|e| &e.checkpoint.id == checkpoint_id)
            })
            .ok_or_else(|| {
                CheckpointError::NotFound(format!("checkpoint {checkpoint_id} for writes"))
            })?;

        entry.writes.retain(|(task, _, _)| task != &task_id);
        for (channel, value) in writes {
            entry.writes.push((task_id.clone(), channel, value));
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        Ok(())
    }
}
