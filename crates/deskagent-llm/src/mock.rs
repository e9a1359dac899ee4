//! Scripted model for deterministic tests.

use crate::config::ChatRequest;
use crate::error::{LlmError, Result};
use crate::traits::{ChatModel, ChatResponse};
use async_trait::async_trait;
use deskagent_graph::{Message, ToolCall};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A [`ChatModel`] that replays a fixed sequence of responses.
///
/// Each `chat` call pops the next scripted response; once the script is
/// exhausted, calls fail with [`LlmError::EmptyResponse`] so tests exercise
/// the engine's model-failure paths too. Every request is recorded for
/// assertion.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    script: Arc<Mutex<VecDeque<ChatResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedModel {
    pub fn new(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A scripted response that is plain assistant text.
    pub fn text(content: impl Into<String>) -> ChatResponse {
        ChatResponse::new(Message::assistant(content))
    }

    /// A scripted response that requests the given tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> ChatResponse {
        ChatResponse::new(Message::assistant("").with_tool_calls(calls))
    }

    /// Append another response to the script.
    pub fn push(&self, response: ChatResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of chat calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}
