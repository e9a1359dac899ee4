//! The chat model trait implemented by every provider.

use crate::config::ChatRequest;
use crate::error::Result;
use async_trait::async_trait;
use deskagent_graph::Message;

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageMetadata {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// The assistant's reply to a chat invocation.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Assistant message; may carry tool calls instead of (or besides) text
    pub message: Message,

    /// Token usage when the provider reports it
    pub usage: Option<UsageMetadata>,
}

impl ChatResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A chat-capable language model.
///
/// Implementations must be `Send + Sync`; the engine shares one instance
/// across all threads of a worker.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one chat completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
