//! Chat model abstraction and providers.
//!
//! [`ChatModel`] is the single seam between the agent engine and language
//! models: messages plus bound tools (and optionally a response schema for
//! provider-enforced structured output) in, an assistant message out.
//!
//! Providers:
//! - [`GeminiClient`] — remote routing-class model (function calling + JSON
//!   schema output)
//! - [`OllamaClient`] — local model for privacy-sensitive workers
//! - [`ScriptedModel`] — deterministic test double

pub mod config;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod traits;

pub use config::{ChatConfig, ChatRequest, ToolDefinition};
pub use error::{LlmError, Result};
pub use gemini::GeminiClient;
pub use mock::ScriptedModel;
pub use ollama::OllamaClient;
pub use traits::{ChatModel, ChatResponse, UsageMetadata};
