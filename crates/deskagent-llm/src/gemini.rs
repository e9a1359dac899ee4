//! Gemini provider: remote routing-class model.
//!
//! Supports native function calling (tool definitions become
//! `functionDeclarations`, assistant tool calls become `functionCall` parts,
//! tool results become `functionResponse` parts) and provider-enforced JSON
//! output via `responseSchema` when the request carries a response schema.

use crate::config::ChatRequest;
use crate::error::{LlmError, Result};
use crate::traits::{ChatModel, ChatResponse, UsageMetadata};
use async_trait::async_trait;
use deskagent_graph::{Message, MessageRole, ToolCall};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini chat client.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey("GOOGLE_API_KEY".to_string()));
        }
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn convert_messages(messages: &[Message]) -> (Option<Value>, Vec<GeminiContent>) {
        let mut system_instruction = None;
        let mut contents = Vec::new();
        // functionResponse parts need the tool name; recover it from the
        // assistant call that carries the same id.
        let mut call_names: HashMap<String, String> = HashMap::new();

        for message in messages {
            match message.role {
                MessageRole::System => {
                    system_instruction = Some(serde_json::json!({
                        "parts": [{"text": message.content}]
                    }));
                }
                MessageRole::User => contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: vec![GeminiPart::text(&message.content)],
                }),
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(GeminiPart::text(&message.content));
                    }
                    if let Some(calls) = &message.tool_calls {
                        for call in calls {
                            call_names.insert(call.id.clone(), call.name.clone());
                            parts.push(GeminiPart {
                                text: None,
                                function_call: Some(GeminiFunctionCall {
                                    name: call.name.clone(),
                                    args: call.arguments.clone(),
                                }),
                                function_response: None,
                            });
                        }
                    }
                    if parts.is_empty() {
                        parts.push(GeminiPart::text(""));
                    }
                    contents.push(GeminiContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
                MessageRole::Tool => {
                    let name = message
                        .tool_call_id
                        .as_ref()
                        .and_then(|id| call_names.get(id))
                        .cloned()
                        .unwrap_or_else(|| "tool".to_string());
                    contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart {
                            text: None,
                            function_call: None,
                            function_response: Some(GeminiFunctionResponse {
                                name,
                                response: serde_json::json!({"result": message.content}),
                            }),
                        }],
                    });
                }
            }
        }

        (system_instruction, contents)
    }

    fn convert_response(response: GeminiResponse) -> Result<ChatResponse> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        let mut text_segments = Vec::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.parts {
            if let Some(text) = part.text {
                text_segments.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::new(
                    Uuid::new_v4().to_string(),
                    call.name,
                    call.args,
                ));
            }
        }

        let mut message = Message::assistant(text_segments.join(""));
        if !tool_calls.is_empty() {
            message = message.with_tool_calls(tool_calls);
        }

        let usage = response
            .usage_metadata
            .map(|u| UsageMetadata::new(u.prompt_token_count, u.candidates_token_count));

        Ok(ChatResponse {
            message,
            usage,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    #[tracing::instrument(skip(self, request), fields(model = %self.model))]
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let (system_instruction, contents) = Self::convert_messages(&request.messages);

        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.config.temperature {
            generation_config.insert("temperature".to_string(), temperature.into());
        }
        if let Some(max_tokens) = request.config.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), max_tokens.into());
        }
        if let Some(schema) = &request.config.response_schema {
            generation_config.insert(
                "responseMimeType".to_string(),
                "application/json".into(),
            );
            generation_config.insert("responseSchema".to_string(), schema.clone());
        }

        let mut body = serde_json::json!({ "contents": contents });
        if let Some(instruction) = system_instruction {
            body["systemInstruction"] = instruction;
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }
        if !request.config.tools.is_empty() {
            let declarations: Vec<Value> = request
                .config
                .tools
                .iter()
                .map(|tool| {
                    let mut decl = serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                    });
                    if let Some(parameters) = &tool.parameters {
                        decl["parameters"] = parameters.clone();
                    }
                    decl
                })
                .collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
        }

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Gemini request failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        Self::convert_response(parsed)
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,

    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_call: None,
            function_response: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,

    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,

    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,

    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(matches!(
            GeminiClient::new("", "gemini-2.5-flash"),
            Err(LlmError::MissingApiKey(_))
        ));
    }

    #[test]
    fn system_message_becomes_instruction() {
        let (instruction, contents) = GeminiClient::convert_messages(&[
            Message::system("You are the supervisor"),
            Message::user("hello"),
        ]);

        assert!(instruction.is_some());
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
    }

    #[test]
    fn tool_result_recovers_function_name_from_call_id() {
        let call = ToolCall::new("call-1", "list_directory", serde_json::json!({"path": "/"}));
        let messages = vec![
            Message::assistant("").with_tool_calls(vec![call]),
            Message::tool("[\"a.txt\"]", "call-1"),
        ];

        let (_, contents) = GeminiClient::convert_messages(&messages);
        let response = contents[1].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "list_directory");
    }

    #[test]
    fn response_parts_map_to_tool_calls() {
        let response = GeminiResponse {
            candidates: vec![GeminiCandidate {
                content: GeminiCandidateContent {
                    parts: vec![GeminiPart {
                        text: None,
                        function_call: Some(GeminiFunctionCall {
                            name: "read_file".to_string(),
                            args: serde_json::json!({"path": "/tmp/x"}),
                        }),
                        function_response: None,
                    }],
                },
            }],
            usage_metadata: None,
        };

        let chat = GeminiClient::convert_response(response).unwrap();
        let calls = chat.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert!(!calls[0].id.is_empty());
    }
}
