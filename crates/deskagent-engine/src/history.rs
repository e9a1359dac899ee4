//! Host-side chat history store.
//!
//! The engine's durable truth is the checkpoint store; this is the
//! user-visible chat history the desktop shell displays. The orchestrator
//! writes user and final assistant messages here. Hosts provide their own
//! backing store by implementing [`HistoryStore`]; [`InMemoryHistoryStore`]
//! covers tests and ephemeral sessions.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One stored chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A chat session with its transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<StoredMessage>,
}

/// Host-side chat history operations.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create a session with the given title; returns its id.
    async fn create(&self, title: &str) -> Result<String>;

    /// Session summaries (no transcripts), newest first.
    async fn list(&self) -> Result<Vec<ChatSession>>;

    /// Load a full session.
    async fn load(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// Append a message, creating the session implicitly if needed.
    async fn append_message(&self, session_id: &str, role: &str, content: &str) -> Result<()>;

    /// Rename a session.
    async fn update_title(&self, session_id: &str, title: &str) -> Result<()>;

    /// Delete a session.
    async fn delete(&self, session_id: &str) -> Result<()>;
}

/// In-memory [`HistoryStore`] for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStore {
    sessions: Arc<RwLock<HashMap<String, ChatSession>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create(&self, title: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let session = ChatSession {
            id: id.clone(),
            title: title.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        };
        self.sessions.write().await.insert(id.clone(), session);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .read()
            .await
            .values()
            .map(|session| ChatSession {
                messages: Vec::new(),
                ..session.clone()
            })
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn load(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn append_message(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| ChatSession {
                id: session_id.to_string(),
                title: "New conversation".to_string(),
                created_at: Utc::now(),
                messages: Vec::new(),
            });
        session.messages.push(StoredMessage {
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session '{session_id}'")))?;
        session.title = title.to_string();
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_creates_session_implicitly() {
        let store = InMemoryHistoryStore::new();
        store.append_message("t1", "user", "hi").await.unwrap();

        let session = store.load("t1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, "user");
    }

    #[tokio::test]
    async fn create_list_rename_delete() {
        let store = InMemoryHistoryStore::new();
        let id = store.create("First").await.unwrap();
        store.update_title(&id, "Renamed").await.unwrap();

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Renamed");

        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());
    }
}
