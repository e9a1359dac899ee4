//! The worker step protocol.
//!
//! # Overview
//!
//! A [`Worker`] is a value: a name, a description for the supervisor's
//! routing prompt, a system prompt, a static tool registry and a model
//! binding. One `process` call is one step:
//!
//! 1. invoke the model with `[system prompt, *thread messages]` and the
//!    worker's tool definitions bound;
//! 2. if the reply has no tool calls, the step is complete;
//! 3. otherwise walk the calls in order. Safe and moderate calls execute
//!    inline. The first sensitive call becomes a [`PendingAction`] with an
//!    `"[Awaiting user approval]"` placeholder result and stops processing;
//!    every remaining call gets a queued placeholder so each call id still
//!    resolves to exactly one tool result.
//!
//! After an approval decision, [`Worker::execute_pending_action`] runs the
//! stored call and returns the real tool result under the original call id,
//! which replaces the placeholder in the transcript.

use crate::state::{AgentState, PendingAction};
use crate::tools::{tool_sensitivity, Sensitivity, ToolRegistry};
use deskagent_llm::{ChatModel, ChatRequest};
use deskagent_graph::{Message, MessageRole};
use std::sync::Arc;
use uuid::Uuid;

/// Placeholder result for the call awaiting approval.
pub const AWAITING_APPROVAL_PLACEHOLDER: &str = "[Awaiting user approval]";

/// Placeholder result for calls queued behind a pending approval.
pub const QUEUED_PLACEHOLDER: &str = "[Queued — previous action awaiting approval]";

const SUMMARY_ARG_PREVIEW: usize = 30;
const SUMMARY_RESULT_PREVIEW: usize = 100;

/// Outcome of one worker step.
#[derive(Debug, Clone, Default)]
pub struct WorkerStep {
    /// Messages to append to the transcript (assistant reply + tool results)
    pub messages: Vec<Message>,

    /// Deferred sensitive call, if one was encountered
    pub pending_action: Option<PendingAction>,

    /// True iff the run must pause for approval
    pub awaiting_approval: bool,

    /// True iff the model made no tool calls this step
    pub task_complete: bool,

    /// Compressed trace for the supervisor; `None` keeps the previous one
    pub task_summary: Option<String>,
}

/// A capability-scoped tool executor bound to a model.
pub struct Worker {
    name: String,
    description: String,
    system_prompt: String,
    tools: ToolRegistry,
    model: Arc<dyn ChatModel>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: ToolRegistry,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools,
            model,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run one step against the current thread state.
    ///
    /// Never fails: model errors become an assistant message describing the
    /// failure, so the supervisor can decide what to do next.
    #[tracing::instrument(skip(self, state), fields(worker = %self.name))]
    pub async fn process(&self, state: &AgentState) -> WorkerStep {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(state.messages.iter().cloned());

        let request = ChatRequest::new(messages).with_tools(self.tools.definitions());
        let mut reply = match self.model.chat(request).await {
            Ok(response) => response.message,
            Err(e) => {
                tracing::error!(error = %e, "Worker model invocation failed");
                return WorkerStep {
                    messages: vec![Message::assistant(format!(
                        "Worker {} encountered an error: {e}",
                        self.name
                    ))],
                    ..WorkerStep::default()
                };
            }
        };

        // Every call needs an id for result pairing.
        if let Some(calls) = reply.tool_calls.as_mut() {
            for call in calls.iter_mut() {
                if call.id.is_empty() {
                    call.id = Uuid::new_v4().to_string();
                }
            }
        }

        let calls = reply.tool_calls.clone().unwrap_or_default();
        let has_tool_calls = !calls.is_empty();
        let mut result_messages = vec![reply];
        let mut pending_action: Option<PendingAction> = None;

        for call in calls {
            if pending_action.is_some() {
                // One sensitive action at a time; the model re-issues the
                // rest after the approval round-trip if still needed.
                result_messages.push(Message::tool(QUEUED_PLACEHOLDER, call.id));
                continue;
            }

            let Some(tool) = self.tools.get(&call.name) else {
                tracing::error!(tool = %call.name, "Tool not found");
                result_messages.push(Message::tool(
                    format!("Error: Tool {} not found", call.name),
                    call.id,
                ));
                continue;
            };

            let sensitivity = tool_sensitivity(&call.name, &call.arguments);
            if sensitivity == Sensitivity::Sensitive {
                tracing::info!(tool = %call.name, "Sensitive action, deferring for approval");
                pending_action = Some(PendingAction {
                    id: call.id.clone(),
                    worker_name: self.name.clone(),
                    tool_name: call.name.clone(),
                    tool_args: call.arguments.clone(),
                    sensitivity,
                    description: describe_action(&call.name, &call.arguments),
                });
                result_messages.push(Message::tool(AWAITING_APPROVAL_PLACEHOLDER, call.id));
                continue;
            }

            tracing::info!(tool = %call.name, "Executing tool");
            let content = match tool.execute(call.arguments.clone()).await {
                Ok(result) => result,
                Err(e) => format!("Error: {e}"),
            };
            result_messages.push(Message::tool(content, call.id));
        }

        if let Some(action) = pending_action {
            return WorkerStep {
                messages: result_messages,
                pending_action: Some(action),
                awaiting_approval: true,
                task_complete: false,
                task_summary: None,
            };
        }

        let task_summary = Some(self.summarize(&result_messages));
        WorkerStep {
            messages: result_messages,
            pending_action: None,
            awaiting_approval: false,
            task_complete: !has_tool_calls,
            task_summary,
        }
    }

    /// Execute an approved pending action; the result carries the original
    /// call id so it replaces the placeholder in the transcript.
    pub async fn execute_pending_action(&self, action: &PendingAction) -> Message {
        tracing::info!(tool = %action.tool_name, "Executing approved action");
        let Some(tool) = self.tools.get(&action.tool_name) else {
            return Message::tool(
                format!("Error: Tool {} not found", action.tool_name),
                &action.id,
            );
        };

        match tool.execute(action.tool_args.clone()).await {
            Ok(result) => Message::tool(result, &action.id),
            Err(e) => Message::tool(format!("Error: {e}"), &action.id),
        }
    }

    /// Compressed trace of this step for the supervisor's context.
    fn summarize(&self, messages: &[Message]) -> String {
        let mut parts = Vec::new();

        for message in messages {
            if message.role == MessageRole::Assistant {
                if let Some(calls) = &message.tool_calls {
                    for call in calls {
                        let args_preview = call
                            .arguments
                            .as_object()
                            .map(|args| {
                                args.iter()
                                    .take(2)
                                    .map(|(key, value)| {
                                        format!("{key}={}", preview(&value.to_string(), SUMMARY_ARG_PREVIEW))
                                    })
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            })
                            .unwrap_or_default();
                        parts.push(format!("Called {}({args_preview})", call.name));
                    }
                }
            }
            if message.role == MessageRole::Tool {
                parts.push(format!(
                    "Result: {}",
                    preview(&message.content, SUMMARY_RESULT_PREVIEW)
                ));
            }
        }

        if parts.is_empty() {
            format!("[{}] Processed request", self.name)
        } else {
            format!("[{}] {}", self.name, parts.join(" | "))
        }
    }
}

/// Char-safe prefix with an ellipsis when truncated.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

/// Human-legible sentence describing an action for the approval UI.
pub fn describe_action(tool_name: &str, args: &serde_json::Value) -> String {
    let arg = |key: &str| {
        args.get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?")
            .to_string()
    };
    match tool_name {
        "write_file" => format!("Write to file: {}", arg("path")),
        "create_directory" => format!("Create directory: {}", arg("path")),
        "delete_file" => format!("Delete file: {}", arg("path")),
        "execute_shell_command" => format!("Execute shell command: {}", arg("command")),
        _ => format!("Execute {tool_name} with args: {args}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{required_str, Tool};
    use deskagent_llm::ScriptedModel;
    use deskagent_graph::ToolCall;
    use serde_json::json;

    fn echo_tool() -> Tool {
        Tool::new(
            "read_file",
            "Read a file",
            json!({"type": "object"}),
            Arc::new(|args| {
                Box::pin(async move { Ok(format!("contents of {}", required_str(&args, "path")?)) })
            }),
        )
    }

    fn failing_tool() -> Tool {
        Tool::new(
            "list_directory",
            "List a directory",
            json!({"type": "object"}),
            Arc::new(|_args| {
                Box::pin(async {
                    Err(crate::error::EngineError::Validation("broken".to_string()))
                })
            }),
        )
    }

    fn write_tool() -> Tool {
        Tool::new(
            "write_file",
            "Write a file",
            json!({"type": "object"}),
            Arc::new(|_args| Box::pin(async { Ok("written".to_string()) })),
        )
    }

    fn worker_with(tools: Vec<Tool>, model: ScriptedModel) -> Worker {
        Worker::new(
            "filesystem_worker",
            "Handles files",
            "You are a test worker.",
            ToolRegistry::new(tools),
            Arc::new(model),
        )
    }

    #[tokio::test]
    async fn no_tool_calls_completes_the_task() {
        let model = ScriptedModel::new([ScriptedModel::text("All done.")]);
        let worker = worker_with(vec![echo_tool()], model);

        let step = worker.process(&AgentState::default()).await;

        assert!(step.task_complete);
        assert!(!step.awaiting_approval);
        assert_eq!(step.messages.len(), 1);
        assert_eq!(
            step.task_summary.as_deref(),
            Some("[filesystem_worker] Processed request")
        );
    }

    #[tokio::test]
    async fn safe_calls_execute_inline() {
        let call = ToolCall::new("c1", "read_file", json!({"path": "/tmp/a"}));
        let model = ScriptedModel::new([ScriptedModel::tool_calls(vec![call])]);
        let worker = worker_with(vec![echo_tool()], model);

        let step = worker.process(&AgentState::default()).await;

        assert!(!step.task_complete);
        assert!(!step.awaiting_approval);
        assert_eq!(step.messages.len(), 2);
        assert_eq!(step.messages[1].content, "contents of /tmp/a");
        assert_eq!(step.messages[1].tool_call_id.as_deref(), Some("c1"));
        let summary = step.task_summary.unwrap();
        assert!(summary.contains("Called read_file"));
        assert!(summary.contains("Result: contents of /tmp/a"));
    }

    #[tokio::test]
    async fn first_sensitive_call_pauses_and_queues_the_rest() {
        let calls = vec![
            ToolCall::new("c1", "write_file", json!({"path": "/tmp/a", "content": "x"})),
            ToolCall::new("c2", "write_file", json!({"path": "/tmp/b", "content": "y"})),
            ToolCall::new("c3", "read_file", json!({"path": "/tmp/c"})),
        ];
        let model = ScriptedModel::new([ScriptedModel::tool_calls(calls)]);
        let worker = worker_with(vec![echo_tool(), write_tool()], model);

        let step = worker.process(&AgentState::default()).await;

        assert!(step.awaiting_approval);
        let action = step.pending_action.unwrap();
        assert_eq!(action.id, "c1");
        assert_eq!(action.tool_name, "write_file");
        assert_eq!(action.description, "Write to file: /tmp/a");

        // Every call id resolved: one awaiting, two queued.
        assert_eq!(step.messages.len(), 4);
        assert_eq!(step.messages[1].content, AWAITING_APPROVAL_PLACEHOLDER);
        assert_eq!(step.messages[2].content, QUEUED_PLACEHOLDER);
        assert_eq!(step.messages[3].content, QUEUED_PLACEHOLDER);
        assert_eq!(step.messages[3].tool_call_id.as_deref(), Some("c3"));
    }

    #[tokio::test]
    async fn unknown_tool_and_failures_become_error_results() {
        let calls = vec![
            ToolCall::new("c1", "no_such_tool", json!({})),
            ToolCall::new("c2", "list_directory", json!({"path": "/"})),
        ];
        let model = ScriptedModel::new([ScriptedModel::tool_calls(calls)]);
        let worker = worker_with(vec![failing_tool()], model);

        let step = worker.process(&AgentState::default()).await;

        assert!(!step.awaiting_approval);
        assert_eq!(
            step.messages[1].content,
            "Error: Tool no_such_tool not found"
        );
        assert!(step.messages[2].content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn model_failure_becomes_an_assistant_message() {
        let model = ScriptedModel::new([]);
        let worker = worker_with(vec![], model);

        let step = worker.process(&AgentState::default()).await;

        assert!(!step.task_complete);
        assert!(step.messages[0]
            .content
            .starts_with("Worker filesystem_worker encountered an error"));
    }

    #[tokio::test]
    async fn missing_call_ids_are_generated() {
        let mut call = ToolCall::new("", "read_file", json!({"path": "/x"}));
        call.id = String::new();
        let model = ScriptedModel::new([ScriptedModel::tool_calls(vec![call])]);
        let worker = worker_with(vec![echo_tool()], model);

        let step = worker.process(&AgentState::default()).await;

        let assistant_calls = step.messages[0].tool_calls.as_ref().unwrap();
        assert!(!assistant_calls[0].id.is_empty());
        assert_eq!(
            step.messages[1].tool_call_id.as_ref(),
            Some(&assistant_calls[0].id)
        );
    }

    #[tokio::test]
    async fn approved_action_returns_real_result_under_original_id() {
        let model = ScriptedModel::new([]);
        let worker = worker_with(vec![write_tool()], model);

        let action = PendingAction {
            id: "c9".to_string(),
            worker_name: "filesystem_worker".to_string(),
            tool_name: "write_file".to_string(),
            tool_args: json!({"path": "/tmp/a", "content": "x"}),
            sensitivity: Sensitivity::Sensitive,
            description: "Write to file: /tmp/a".to_string(),
        };

        let message = worker.execute_pending_action(&action).await;
        assert_eq!(message.content, "written");
        assert_eq!(message.tool_call_id.as_deref(), Some("c9"));
    }
}
