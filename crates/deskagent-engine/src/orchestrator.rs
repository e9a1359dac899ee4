//! Orchestrator façade: user turns in, semantic events out.
//!
//! Translates a UI-facing API (`ask`, `approve_action`, `deny_action`,
//! `resume`) into graph runs and keeps the host history store in sync:
//! every `ask` appends the user message, and every completed turn appends
//! the final assistant response.

use crate::agent::AgentGraph;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::AgentEvent;
use crate::history::{HistoryStore, InMemoryHistoryStore};
use crate::tools::path::PathPolicy;
use crate::workers;
use deskagent_checkpoint::SqliteSaver;
use deskagent_llm::{ChatModel, GeminiClient, OllamaClient};
use std::sync::Arc;

/// The engine's UI-facing entry point.
pub struct Orchestrator {
    graph: AgentGraph,
    history: Arc<dyn HistoryStore>,
}

impl Orchestrator {
    pub fn new(graph: AgentGraph, history: Arc<dyn HistoryStore>) -> Self {
        Self { graph, history }
    }

    /// Build a fully wired engine: Gemini routing and worker models, local
    /// Ollama for the researcher, SQLite checkpoints at the configured path.
    pub async fn bootstrap(config: EngineConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let checkpointer = Arc::new(SqliteSaver::open(&config.database_path).await?);

        let api_key = config.google_api_key.clone().unwrap_or_default();
        let routing_model: Arc<dyn ChatModel> =
            Arc::new(GeminiClient::new(api_key.clone(), &config.routing_model)?);
        let worker_model: Arc<dyn ChatModel> =
            Arc::new(GeminiClient::new(api_key, &config.worker_model)?);
        let local_model: Arc<dyn ChatModel> = Arc::new(
            OllamaClient::new(&config.local_model)?.with_base_url(&config.ollama_base_url),
        );

        let policy = Arc::new(PathPolicy::standard());
        let pool = vec![
            workers::filesystem_worker(policy.clone(), worker_model.clone()),
            workers::system_worker(policy.clone(), worker_model.clone()),
            workers::researcher_worker(policy.clone(), local_model),
            workers::code_worker(policy, worker_model),
        ];

        let graph = AgentGraph::new(routing_model, pool, checkpointer)?;
        Ok(Self::new(graph, Arc::new(InMemoryHistoryStore::new())))
    }

    /// Liveness probe.
    pub fn ping(&self) -> &'static str {
        "pong"
    }

    /// The underlying graph, for state inspection.
    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }

    /// The history store the orchestrator writes to.
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Run one user turn (or resume a paused one) and forward events.
    #[tracing::instrument(skip(self, text, on_event))]
    pub async fn ask(
        &self,
        thread_id: &str,
        text: &str,
        mut on_event: impl FnMut(AgentEvent) + Send,
    ) -> Result<()> {
        self.history.append_message(thread_id, "user", text).await?;

        let mut rx = self.graph.stream(thread_id, Some(text.to_string()));
        while let Some(event) = rx.recv().await {
            if let AgentEvent::Complete { response } = &event {
                self.history
                    .append_message(thread_id, "assistant", response)
                    .await?;
            }
            on_event(event);
        }
        Ok(())
    }

    /// Approve the pending action. Follow with [`resume`](Self::resume) (or
    /// the next `ask`) to drive the stream onward.
    pub async fn approve_action(&self, thread_id: &str) -> Result<()> {
        self.graph.approve_action(thread_id).await
    }

    /// Deny the pending action with an optional reason.
    pub async fn deny_action(&self, thread_id: &str, reason: Option<&str>) -> Result<()> {
        self.graph.deny_action(thread_id, reason).await
    }

    /// Resume a paused thread and forward events.
    pub async fn resume(
        &self,
        thread_id: &str,
        mut on_event: impl FnMut(AgentEvent) + Send,
    ) -> Result<()> {
        let mut rx = self.graph.stream(thread_id, None);
        while let Some(event) = rx.recv().await {
            if let AgentEvent::Complete { response } = &event {
                self.history
                    .append_message(thread_id, "assistant", response)
                    .await?;
            }
            on_event(event);
        }
        Ok(())
    }

    /// Destroy a thread: durable graph state and chat history.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.graph.delete_thread(thread_id).await?;
        self.history.delete(thread_id).await?;
        Ok(())
    }
}
