//! Ollama provider: local model for privacy-sensitive workers.
//!
//! Talks to a locally running Ollama daemon over `/api/chat`. Tool calls use
//! Ollama's function-call format; when a response schema is set, the request
//! asks for strict JSON output.

use crate::config::ChatRequest;
use crate::error::{LlmError, Result};
use crate::traits::{ChatModel, ChatResponse};
use async_trait::async_trait;
use deskagent_graph::{Message, MessageRole, ToolCall};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama chat client.
#[derive(Clone)]
pub struct OllamaClient {
    model: String,
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::Tool => "tool",
                };
                let mut value = serde_json::json!({
                    "role": role,
                    "content": message.content,
                });
                if let Some(calls) = &message.tool_calls {
                    value["tool_calls"] = calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments,
                                }
                            })
                        })
                        .collect();
                }
                value
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    #[tracing::instrument(skip(self, request), fields(model = %self.model))]
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::convert_messages(&request.messages),
            "stream": false,
        });
        if !request.config.tools.is_empty() {
            body["tools"] = request
                .config
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters.clone().unwrap_or_else(
                                || serde_json::json!({"type": "object", "properties": {}})
                            ),
                        }
                    })
                })
                .collect();
        }
        if request.config.response_schema.is_some() {
            body["format"] = "json".into();
        }
        if let Some(temperature) = request.config.temperature {
            body["options"] = serde_json::json!({"temperature": temperature});
        }

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Ollama request failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OllamaChatResponse = response.json().await?;
        let raw = parsed.message.ok_or(LlmError::EmptyResponse)?;

        let mut message = Message::assistant(raw.content);
        if !raw.tool_calls.is_empty() {
            let calls = raw
                .tool_calls
                .into_iter()
                .map(|call| {
                    ToolCall::new(
                        Uuid::new_v4().to_string(),
                        call.function.name,
                        call.function.arguments,
                    )
                })
                .collect();
            message = message.with_tool_calls(calls);
        }

        Ok(ChatResponse::new(message))
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,

    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaFunction {
    name: String,

    #[serde(default)]
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_roles_and_tool_calls() {
        let call = ToolCall::new("id-1", "summarize_context", serde_json::json!({"text": "x"}));
        let messages = vec![
            Message::system("prompt"),
            Message::assistant("").with_tool_calls(vec![call]),
            Message::tool("summary", "id-1"),
        ];

        let converted = OllamaClient::convert_messages(&messages);
        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[1]["role"], "assistant");
        assert_eq!(
            converted[1]["tool_calls"][0]["function"]["name"],
            "summarize_context"
        );
        assert_eq!(converted[2]["role"], "tool");
    }
}
