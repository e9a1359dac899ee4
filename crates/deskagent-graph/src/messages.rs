//! Conversation message types.
//!
//! Messages are the authoritative transcript of a thread. Assistant messages
//! may carry tool calls; every tool call id must be resolved by exactly one
//! tool message with the same `tool_call_id` before the next model
//! invocation — [`merge_messages`] enforces the replace-by-id semantics that
//! make placeholder resolution possible.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of a message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Identifier pairing this call with its tool result
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Tool arguments as a JSON object
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single message in a thread transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier; generated when absent so replace-by-id works
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Sender role
    pub role: MessageRole,

    /// Textual content
    pub content: String,

    /// Tool calls requested by an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For tool messages, the id of the call being answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool-result message answering the given call id.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Whether this assistant message requests any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// Generate an id if the message does not carry one.
    pub fn ensure_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
    }
}

/// Merge an update into an existing transcript.
///
/// Append-only with two replacement rules:
/// 1. a message whose `id` matches an existing message replaces it in place;
/// 2. a tool message whose `tool_call_id` matches an existing tool message
///    replaces that message (this is how an approval placeholder is resolved
///    by the real tool result).
pub fn merge_messages(mut current: Vec<Message>, updates: Vec<Message>) -> Vec<Message> {
    for mut message in updates {
        message.ensure_id();

        if let Some(pos) = current.iter().position(|m| m.id == message.id) {
            current[pos] = message;
            continue;
        }

        if message.role == MessageRole::Tool {
            if let Some(call_id) = &message.tool_call_id {
                if let Some(pos) = current.iter().position(|m| {
                    m.role == MessageRole::Tool && m.tool_call_id.as_ref() == Some(call_id)
                }) {
                    current[pos] = message;
                    continue;
                }
            }
        }

        current.push(message);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role_and_id() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.id.is_some());

        let tool = Message::tool("output", "call-1");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn merge_appends_new_messages_in_order() {
        let merged = merge_messages(
            vec![Message::user("one").with_id("a")],
            vec![
                Message::assistant("two").with_id("b"),
                Message::user("three").with_id("c"),
            ],
        );
        let ids: Vec<_> = merged.iter().map(|m| m.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_replaces_by_id() {
        let merged = merge_messages(
            vec![Message::assistant("draft").with_id("a")],
            vec![Message::assistant("final").with_id("a")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "final");
    }

    #[test]
    fn tool_result_replaces_placeholder_with_same_call_id() {
        let placeholder = Message::tool("[Awaiting user approval]", "call-7");
        let merged = merge_messages(
            vec![Message::user("write the file").with_id("u"), placeholder],
            vec![Message::tool("Successfully wrote to file", "call-7")],
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].content, "Successfully wrote to file");
        assert_eq!(merged[1].tool_call_id.as_deref(), Some("call-7"));
    }

    #[test]
    fn merge_assigns_ids_to_incoming_messages() {
        let mut incoming = Message::user("no id yet");
        incoming.id = None;
        let merged = merge_messages(vec![], vec![incoming]);
        assert!(merged[0].id.is_some());
    }
}
