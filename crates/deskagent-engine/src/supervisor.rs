//! The supervisor: structured-output routing over pruned context.
//!
//! # Overview
//!
//! The supervisor is a deterministic function of state. Ceilings and errors
//! short-circuit before any model call; otherwise the routing model is asked
//! for a structured decision `{reasoning, next, final_response}` where
//! `next` is one of the four workers or `FINISH`.
//!
//! The supervisor's context window is a reduced view of the transcript:
//! tool results longer than 500 characters are truncated (view-only, the
//! stored transcript is untouched), only the trailing 20 messages survive
//! pruning, and the last task summary is prepended as a synthetic user
//! message. The supervisor never mutates `messages`.

use crate::state::{
    nodes, AgentState, MAX_ITERATIONS, MAX_MESSAGES_FOR_SUPERVISOR, MAX_TOOL_OUTPUT_LENGTH,
};
use deskagent_graph::{Message, MessageRole, END};
use deskagent_llm::{ChatModel, ChatRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const MAX_STEPS_RESPONSE: &str = "I apologize, but I reached the maximum number of steps for \
this task. Please try breaking down your request into smaller parts.";

const FAILURE_RESPONSE: &str =
    "I encountered an error while processing your request. Please try again.";

/// Structured output schema of the routing model.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorDecision {
    #[allow(dead_code)]
    pub reasoning: String,

    pub next: String,

    #[serde(default)]
    pub final_response: Option<String>,
}

/// Routing outcome applied to the graph state.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteUpdate {
    /// Next node name, or the END sentinel
    pub next: String,

    /// Terminal user-visible answer when routing to END
    pub final_response: Option<String>,

    /// Worker that holds the floor after this decision
    pub current_worker: Option<String>,
}

impl RouteUpdate {
    fn finish(response: impl Into<String>) -> Self {
        Self {
            next: END.to_string(),
            final_response: Some(response.into()),
            current_worker: None,
        }
    }
}

/// Central router over the worker pool.
pub struct Supervisor {
    model: Arc<dyn ChatModel>,
    /// `(name, description)` per worker, for the routing prompt
    workers: Vec<(String, String)>,
}

impl Supervisor {
    pub fn new(model: Arc<dyn ChatModel>, workers: Vec<(String, String)>) -> Self {
        Self { model, workers }
    }

    /// Decide the next action for the current state.
    ///
    /// Never fails: every failure path maps to END with a user-safe message.
    #[tracing::instrument(skip(self, state), fields(iteration = state.iteration_count))]
    pub async fn route(&self, state: &AgentState) -> RouteUpdate {
        if state.iteration_count >= MAX_ITERATIONS {
            tracing::warn!("Maximum iterations reached, forcing END");
            return RouteUpdate::finish(MAX_STEPS_RESPONSE);
        }

        if let Some(error) = &state.error {
            return RouteUpdate::finish(format!("An error occurred: {error}"));
        }

        let context = self.build_context(state);
        let request =
            ChatRequest::new(context).with_response_schema(Self::decision_schema());

        let decision = match self.model.chat(request).await {
            Ok(response) => Self::parse_decision(&response.message.content),
            Err(e) => {
                tracing::error!(error = %e, "Routing model invocation failed");
                return RouteUpdate::finish(FAILURE_RESPONSE);
            }
        };

        let Some(decision) = decision else {
            tracing::error!("Routing model returned an unparseable decision");
            return RouteUpdate::finish(FAILURE_RESPONSE);
        };

        if decision.next == "FINISH" {
            return RouteUpdate {
                next: END.to_string(),
                final_response: Some(
                    decision
                        .final_response
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "Task completed.".to_string()),
                ),
                current_worker: None,
            };
        }

        if !nodes::WORKERS.contains(&decision.next.as_str()) {
            tracing::error!(next = %decision.next, "Routing model chose an unknown worker");
            return RouteUpdate::finish(FAILURE_RESPONSE);
        }

        tracing::info!(next = %decision.next, "Routing to worker");
        RouteUpdate {
            current_worker: Some(decision.next.clone()),
            next: decision.next,
            final_response: None,
        }
    }

    fn parse_decision(content: &str) -> Option<SupervisorDecision> {
        serde_json::from_str(content.trim()).ok()
    }

    /// The supervisor's context window: system prompt, optional task
    /// summary, truncated + pruned transcript, trailing directive.
    fn build_context(&self, state: &AgentState) -> Vec<Message> {
        let truncated = truncate_tool_messages(&state.messages);
        let pruned = prune_messages(truncated, MAX_MESSAGES_FOR_SUPERVISOR);

        let mut context = Vec::with_capacity(pruned.len() + 3);
        context.push(Message::system(self.system_prompt()));
        if let Some(summary) = state.active_task_summary() {
            context.push(Message::user(format!("[Previous Task Summary]: {summary}")));
        }
        context.extend(pruned);
        context.push(Message::user(
            "Based on the conversation above, decide the next action. \
             If the task is complete, provide a final response.",
        ));
        context
    }

    fn system_prompt(&self) -> String {
        let home = dirs::home_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let worker_list = self
            .workers
            .iter()
            .enumerate()
            .map(|(i, (name, description))| format!("{}. {name} - {description}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are the Supervisor of a desktop AI assistant with deep OS integration.
Your role is to analyze user requests and route them to the appropriate specialized worker.

Available Workers:
{worker_list}

Environment:
- Platform: {}
- User Home: {home}

Routing Guidelines:
1. For file read/write/list operations -> filesystem_worker
2. For system info, npm/git commands, network diagnostics -> system_worker
3. For summarizing content, extracting facts, analyzing context -> researcher_worker
4. For code analysis, generation, refactoring, explanation -> code_worker
5. For complex tasks, route to workers in sequence (e.g. read file -> analyze code)

Decision Rules:
- If a worker has just completed a task and the overall goal is achieved, choose FINISH
- If a worker's output needs to be processed by another worker, route accordingly
- If the user's request is a simple question that doesn't need tools, choose FINISH and provide the answer
- Always provide a final_response when choosing FINISH
- IMPORTANT: When finishing, include the relevant data/results from tool outputs in your \
final_response. Do not just say \"I listed the files\", actually include the file list or a \
summary of results.

Analyze the conversation history to understand:
1. What the user originally requested
2. What workers have already done
3. What still needs to be done",
            std::env::consts::OS,
        )
    }

    fn decision_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {
                    "type": "string",
                    "description": "Brief explanation of the routing decision"
                },
                "next": {
                    "type": "string",
                    "enum": [
                        nodes::FILESYSTEM_WORKER,
                        nodes::SYSTEM_WORKER,
                        nodes::RESEARCHER_WORKER,
                        nodes::CODE_WORKER,
                        "FINISH"
                    ],
                    "description": "The next worker to route to, or FINISH if the task is complete"
                },
                "final_response": {
                    "type": "string",
                    "description": "Final response to the user (only if next is FINISH)"
                }
            },
            "required": ["reasoning", "next"]
        })
    }
}

/// Replace oversized tool results with a truncated view. The stored
/// transcript is never modified; this is the supervisor's view only.
fn truncate_tool_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|message| {
            if message.role == MessageRole::Tool
                && message.content.chars().count() > MAX_TOOL_OUTPUT_LENGTH
            {
                let mut truncated = message.clone();
                truncated.content = message
                    .content
                    .chars()
                    .take(MAX_TOOL_OUTPUT_LENGTH)
                    .collect::<String>()
                    + "... [truncated]";
                truncated
            } else {
                message.clone()
            }
        })
        .collect()
}

/// Keep only the trailing `max_count` messages.
fn prune_messages(messages: Vec<Message>, max_count: usize) -> Vec<Message> {
    if messages.len() <= max_count {
        messages
    } else {
        messages[messages.len() - max_count..].to_vec()
    }
}
