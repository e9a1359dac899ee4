//! SQLite-backed checkpoint storage.
//!
//! # Overview
//!
//! [`SqliteSaver`] persists checkpoints and pending writes to an embedded
//! SQLite database so threads survive process restarts. Two tables:
//!
//! - `graph_checkpoints` — one row per snapshot, keyed by
//!   `(thread_id, checkpoint_ns, checkpoint_id)`, carrying the serialized
//!   checkpoint and metadata plus a serialization `_type` tag per payload
//! - `graph_writes` — pending channel writes keyed by
//!   `(thread_id, checkpoint_ns, checkpoint_id, task_id, idx)`
//!
//! The connection runs in WAL mode with foreign keys enabled. Schema setup
//! is migrate-in-place: tables are created with the full schema when absent,
//! and pre-existing tables missing the `checkpoint_type` / `metadata_type` /
//! `type` columns get them added with default `'json'`. Data is never
//! dropped.
//!
//! All writes inside one `put_writes` call are transactional, as is
//! `delete_thread` (writes removed before checkpoints).

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple, PendingWrite},
    error::{CheckpointError, Result},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Serialization format tag stored alongside each payload.
const FORMAT_JSON: &str = "json";

const CREATE_CHECKPOINTS: &str = "\
CREATE TABLE IF NOT EXISTS graph_checkpoints (
    thread_id TEXT NOT NULL,
    checkpoint_ns TEXT NOT NULL DEFAULT '',
    checkpoint_id TEXT NOT NULL,
    parent_checkpoint_id TEXT,
    checkpoint BLOB NOT NULL,
    metadata BLOB NOT NULL,
    checkpoint_type TEXT NOT NULL DEFAULT 'json',
    metadata_type TEXT NOT NULL DEFAULT 'json',
    created_at TEXT NOT NULL,
    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id)
)";

const CREATE_WRITES: &str = "\
CREATE TABLE IF NOT EXISTS graph_writes (
    thread_id TEXT NOT NULL,
    checkpoint_ns TEXT NOT NULL DEFAULT '',
    checkpoint_id TEXT NOT NULL,
    task_id TEXT NOT NULL,
    idx INTEGER NOT NULL,
    channel TEXT NOT NULL,
    value BLOB,
    type TEXT NOT NULL DEFAULT 'json',
    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
)";

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_graph_checkpoints_thread
     ON graph_checkpoints(thread_id, checkpoint_ns)",
    "CREATE INDEX IF NOT EXISTS idx_graph_writes_checkpoint
     ON graph_writes(thread_id, checkpoint_ns, checkpoint_id)",
];

/// SQLite [`CheckpointSaver`] implementation.
#[derive(Debug, Clone)]
pub struct SqliteSaver {
    pool: SqlitePool,
}

impl SqliteSaver {
    /// Open (or create) a checkpoint database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.as_ref().display(), "Opened checkpoint database");
        let saver = Self { pool };
        saver.migrate().await?;
        Ok(saver)
    }

    /// Open an in-memory database, useful for tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .foreign_keys(true);

        // A pool of one: each new in-memory connection is a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let saver = Self { pool };
        saver.migrate().await?;
        Ok(saver)
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create missing tables and bring pre-existing ones up to the current
    /// schema without dropping data.
    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_CHECKPOINTS).execute(&self.pool).await?;
        sqlx::query(CREATE_WRITES).execute(&self.pool).await?;

        self.ensure_column("graph_checkpoints", "checkpoint_type")
            .await?;
        self.ensure_column("graph_checkpoints", "metadata_type")
            .await?;
        self.ensure_column("graph_writes", "type").await?;

        for ddl in CREATE_INDEXES {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn ensure_column(&self, table: &str, column: &str) -> Result<()> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?;
        let exists = rows
            .iter()
            .any(|row| row.get::<String, _>("name") == column);

        if !exists {
            tracing::info!(table, column, "Adding missing serialization-type column");
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} TEXT NOT NULL DEFAULT '{FORMAT_JSON}'"
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8], format: &str) -> Result<T> {
        if format != FORMAT_JSON {
            return Err(CheckpointError::Invalid(format!(
                "unsupported serialization format '{format}'"
            )));
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    fn row_to_tuple(row: &SqliteRow) -> Result<CheckpointTuple> {
        let thread_id: String = row.get("thread_id");
        let checkpoint_ns: String = row.get("checkpoint_ns");
        let checkpoint_id: String = row.get("checkpoint_id");
        let parent_checkpoint_id: Option<String> = row.get("parent_checkpoint_id");

        let checkpoint: Checkpoint = Self::decode(
            row.get::<Vec<u8>, _>("checkpoint").as_slice(),
            &row.get::<String, _>("checkpoint_type"),
        )?;
        let metadata: CheckpointMetadata = Self::decode(
            row.get::<Vec<u8>, _>("metadata").as_slice(),
            &row.get::<String, _>("metadata_type"),
        )?;

        let make_config = |id: String| CheckpointConfig {
            thread_id: Some(thread_id.clone()),
            checkpoint_ns: Some(checkpoint_ns.clone()),
            checkpoint_id: Some(id),
        };

        Ok(CheckpointTuple {
            config: make_config(checkpoint_id),
            checkpoint,
            metadata,
            parent_config: parent_checkpoint_id.map(make_config),
            pending_writes: None,
        })
    }

    async fn load_writes(
        &self,
        thread_id: &str,
        namespace: &str,
        checkpoint_id: &str,
    ) -> Result<Vec<PendingWrite>> {
        let rows = sqlx::query(
            "SELECT task_id, channel, value, type FROM graph_writes
             WHERE thread_id = ? AND checkpoint_ns = ? AND checkpoint_id = ?
             ORDER BY task_id, idx",
        )
        .bind(thread_id)
        .bind(namespace)
        .bind(checkpoint_id)
        .fetch_all(&self.pool)
        .await?;

        let mut writes = Vec::with_capacity(rows.len());
        for row in rows {
            let value: serde_json::Value = match row.get::<Option<Vec<u8>>, _>("value") {
                Some(bytes) => Self::decode(&bytes, &row.get::<String, _>("type"))?,
                None => serde_json::Value::Null,
            };
            writes.push((row.get("task_id"), row.get("channel"), value));
        }
        Ok(writes)
    }
}

fn require_thread_id(config: &CheckpointConfig) -> Result<&str> {
    config
        .thread_id
        .as_deref()
        .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
}

#[async_trait]
impl CheckpointSaver for SqliteSaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = require_thread_id(config)?;
        let namespace = config.namespace();

        let row = match &config.checkpoint_id {
            Some(checkpoint_id) => {
                sqlx::query(
                    "SELECT * FROM graph_checkpoints
                     WHERE thread_id = ? AND checkpoint_ns = ? AND checkpoint_id = ?",
                )
                .bind(thread_id)
                .bind(namespace)
                .bind(checkpoint_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM graph_checkpoints
                     WHERE thread_id = ? AND checkpoint_ns = ?
                     ORDER BY created_at DESC LIMIT 1",
                )
                .bind(thread_id)
                .bind(namespace)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let mut tuple = Self::row_to_tuple(&row)?;
        let writes = self
            .load_writes(thread_id, namespace, &tuple.checkpoint.id)
            .await?;
        if !writes.is_empty() {
            tuple.pending_writes = Some(writes);
        }
        Ok(Some(tuple))
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<HashMap<String, serde_json::Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let before_ts: Option<String> = match before.and_then(|c| c.checkpoint_id.as_ref()) {
            Some(before_id) => sqlx::query_scalar(
                "SELECT created_at FROM graph_checkpoints WHERE checkpoint_id = ? LIMIT 1",
            )
            .bind(before_id)
            .fetch_optional(&self.pool)
            .await?,
            None => None,
        };

        let rows = match config.and_then(|c| c.thread_id.as_deref()) {
            Some(thread_id) => {
                let namespace = config.map(|c| c.namespace()).unwrap_or("");
                sqlx::query(
                    "SELECT * FROM graph_checkpoints
                     WHERE thread_id = ? AND checkpoint_ns = ?
                       AND (? IS NULL OR created_at < ?)
                     ORDER BY created_at DESC",
                )
                .bind(thread_id)
                .bind(namespace)
                .bind(&before_ts)
                .bind(&before_ts)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM graph_checkpoints
                     WHERE (? IS NULL OR created_at < ?)
                     ORDER BY created_at DESC",
                )
                .bind(&before_ts)
                .bind(&before_ts)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut results = Vec::new();
        for row in &rows {
            let tuple = Self::row_to_tuple(row)?;
            if let Some(filter_map) = &filter {
                let matches = filter_map
                    .iter()
                    .all(|(key, value)| tuple.metadata.extra.get(key) == Some(value));
                if !matches {
                    continue;
                }
            }
            results.push(Ok(tuple));
            if let Some(lim) = limit {
                if results.len() >= lim {
                    break;
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
        let thread_id = require_thread_id(config)?;
        let namespace = config.namespace();

        let checkpoint_bytes = serde_json::to_vec(&checkpoint)?;
        let metadata_bytes = serde_json::to_vec(&metadata)?;
        let created_at = checkpoint.ts.to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO graph_checkpoints
             (thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id,
              checkpoint, metadata, checkpoint_type, metadata_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(namespace)
        .bind(&checkpoint.id)
        .bind(&config.checkpoint_id)
        .bind(checkpoint_bytes)
        .bind(metadata_bytes)
        .bind(FORMAT_JSON)
        .bind(FORMAT_JSON)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(thread_id, checkpoint_id = %checkpoint.id, "Stored checkpoint");

        Ok(CheckpointConfig {
            thread_id: Some(thread_id.to_string()),
            checkpoint_ns: Some(namespace.to_string()),
            checkpoint_id: Some(checkpoint.id),
        })
    }

    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()> {
        let thread_id = require_thread_id(config)?;
        let namespace = config.namespace();
        let checkpoint_id = config
            .checkpoint_id
            .as_ref()
            .ok_or_else(|| CheckpointError::Invalid("checkpoint_id is required".to_string()))?;

        let mut tx = self.pool.begin().await?;
        for (idx, (channel, value)) in writes.into_iter().enumerate() {
            let value_bytes = serde_json::to_vec(&value)?;
            sqlx::query(
                "INSERT OR REPLACE INTO graph_writes
                 (thread_id, checkpoint_ns, checkpoint_id, task_id, idx, channel, value, type)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(thread_id)
            .bind(namespace)
            .bind(checkpoint_id)
            .bind(&task_id)
            .bind(idx as i64)
            .bind(&channel)
            .bind(value_bytes)
            .bind(FORMAT_JSON)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM graph_writes WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM graph_checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(thread_id, "Deleted thread checkpoints");
        Ok(())
    }
}
