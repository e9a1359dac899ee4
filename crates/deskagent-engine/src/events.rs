//! Semantic events emitted to the UI while a turn runs.

use crate::state::PendingAction;
use serde::Serialize;
use serde_json::Value;

/// One tool invocation as surfaced in a [`AgentEvent::ToolCall`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolCallInfo {
    pub name: String,
    pub args: Value,
}

/// Events surfaced by [`AgentGraph::stream`](crate::agent::AgentGraph::stream).
///
/// Serializes as `{"type": ..., "data": ...}` for transport to a UI layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A worker node began executing
    WorkerStarted { worker: String },

    /// The supervisor routed to a worker
    Routing { next: String },

    /// An assistant message requested tool calls
    ToolCall { tools: Vec<ToolCallInfo> },

    /// A tool result was appended to the transcript
    ToolResult { result: String },

    /// The run paused; a sensitive action needs a human decision
    ApprovalRequired { action: PendingAction },

    /// The turn finished with a final response
    Complete { response: String },

    /// The turn failed
    Error { message: String },

    /// Reserved for future token-level streaming
    Token { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_and_data() {
        let event = AgentEvent::Routing {
            next: "filesystem_worker".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "routing");
        assert_eq!(value["data"]["next"], "filesystem_worker");

        let event = AgentEvent::Complete {
            response: "done".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["data"]["response"], "done");
    }
}
