//! Agent state: channels, reducers, node names and iteration ceilings.
//!
//! The graph state is a JSON object merged channel-by-channel (see
//! [`build_schema`]); [`AgentState`] is the typed view node code works with.
//! Missing channels deserialize to their defaults, so a fresh thread needs
//! no explicit initialization.

use crate::tools::Sensitivity;
use deskagent_graph::{
    CounterReducer, KeepLastReducer, Message, MessageHistoryReducer, StateSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ceiling on supervisor passes within one user turn.
pub const MAX_ITERATIONS: i64 = 15;

/// Ceiling on consecutive self-loops of one worker.
pub const MAX_WORKER_ITERATIONS: i64 = 5;

/// Tool output longer than this is truncated in the supervisor's view.
pub const MAX_TOOL_OUTPUT_LENGTH: usize = 500;

/// The supervisor sees at most this many trailing messages.
pub const MAX_MESSAGES_FOR_SUPERVISOR: usize = 20;

/// Graph node names.
pub mod nodes {
    pub const SUPERVISOR: &str = "supervisor";
    pub const FILESYSTEM_WORKER: &str = "filesystem_worker";
    pub const SYSTEM_WORKER: &str = "system_worker";
    pub const RESEARCHER_WORKER: &str = "researcher_worker";
    pub const CODE_WORKER: &str = "code_worker";
    pub const HUMAN_APPROVAL: &str = "human_approval";

    /// The four worker nodes, in routing-prompt order.
    pub const WORKERS: [&str; 4] = [
        FILESYSTEM_WORKER,
        SYSTEM_WORKER,
        RESEARCHER_WORKER,
        CODE_WORKER,
    ];
}

/// A sensitive tool invocation deferred for human approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    /// Matches the originating tool call id
    pub id: String,

    /// Worker that issued the call and will execute it on approval
    pub worker_name: String,

    pub tool_name: String,

    pub tool_args: Value,

    pub sensitivity: Sensitivity,

    /// Human-legible sentence for the approval UI
    pub description: String,
}

/// Typed view over the graph state object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentState {
    pub messages: Vec<Message>,

    pub current_worker: Option<String>,

    pub next: Option<String>,

    pub pending_action: Option<PendingAction>,

    pub awaiting_approval: bool,

    pub final_response: Option<String>,

    pub error: Option<String>,

    pub iteration_count: i64,

    pub worker_iteration_count: i64,

    pub task_complete: bool,

    pub task_summary: Option<String>,
}

impl AgentState {
    /// Deserialize from the raw channel object, defaulting missing fields.
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(value.clone())
    }

    /// The task summary, treating the empty string (a fresh turn's reset
    /// marker) as absent.
    pub fn active_task_summary(&self) -> Option<&str> {
        self.task_summary.as_deref().filter(|s| !s.is_empty())
    }
}

/// Reducer wiring for every channel of the agent state.
///
/// `messages` appends with id-based replacement; the two counters increment
/// on a `null` update; `task_summary` survives `null` so a paused worker
/// step does not erase it. Everything else is plain replacement.
pub fn build_schema() -> StateSchema {
    StateSchema::new()
        .with_channel("messages", Box::new(MessageHistoryReducer))
        .with_channel("iteration_count", Box::new(CounterReducer))
        .with_channel("worker_iteration_count", Box::new(CounterReducer))
        .with_channel("task_summary", Box::new(KeepLastReducer))
}
