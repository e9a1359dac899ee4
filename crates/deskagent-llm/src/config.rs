//! Chat request types and tool definitions.

use deskagent_graph::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool signature exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema of the tool's arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// A chat invocation: message history plus generation settings.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,

    pub config: ChatConfig,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Bind tool signatures the model may call.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.config.tools = tools;
        self
    }

    /// Require structured output matching the given JSON Schema.
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.config.response_schema = Some(schema);
        self
    }
}

/// Generation settings for a chat invocation.
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    pub temperature: Option<f32>,

    pub max_tokens: Option<usize>,

    /// Tools bound for this invocation
    pub tools: Vec<ToolDefinition>,

    /// When set, the provider must return JSON matching this schema
    pub response_schema: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder_sets_config() {
        let request = ChatRequest::new(vec![Message::user("hi")])
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_tools(vec![ToolDefinition::new("read_file", "Read a file")])
            .with_response_schema(json!({"type": "object"}));

        assert_eq!(request.config.temperature, Some(0.2));
        assert_eq!(request.config.max_tokens, Some(512));
        assert_eq!(request.config.tools.len(), 1);
        assert!(request.config.response_schema.is_some());
    }
}
