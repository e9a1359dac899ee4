//! Tool registry and sensitivity classification.
//!
//! # Overview
//!
//! A [`Tool`] is a named async function over JSON arguments returning text.
//! Workers hold a static [`ToolRegistry`] and expose its definitions to the
//! model; unknown tool names never crash a worker, they produce error tool
//! results.
//!
//! [`tool_sensitivity`] decides whether an invocation executes inline
//! (`safe` / `moderate`) or pauses for human approval (`sensitive`). Unknown
//! tools are sensitive — default-deny. Shell commands delegate to the
//! command classifier in [`shell`].

pub mod code;
pub mod fs;
pub mod path;
pub mod research;
pub mod shell;
pub mod system;

use crate::error::{EngineError, Result};
use deskagent_llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a tool executor.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// Async tool body: JSON arguments in, text out.
pub type ToolExecutor = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// How risky a tool invocation is, for human-in-the-loop purposes.
///
/// Only `Sensitive` pauses the run for approval; `Safe` and `Moderate`
/// execute inline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Safe,
    Moderate,
    Sensitive,
}

/// A callable tool with its model-facing signature.
pub struct Tool {
    pub name: String,

    pub description: String,

    /// JSON Schema of the arguments object
    pub input_schema: Value,

    pub executor: ToolExecutor,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        executor: ToolExecutor,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            executor,
        }
    }

    /// Invoke the tool.
    pub async fn execute(&self, args: Value) -> Result<String> {
        (self.executor)(args).await
    }

    /// Model-facing signature.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description)
            .with_parameters(self.input_schema.clone())
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("executor", &"<function>")
            .finish()
    }
}

/// The static tool set of one worker.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Classify a tool invocation for HITL purposes.
pub fn tool_sensitivity(tool_name: &str, tool_args: &Value) -> Sensitivity {
    match tool_name {
        "read_file" | "list_directory" | "get_system_info" => Sensitivity::Safe,
        "write_file" | "create_directory" | "delete_file" => Sensitivity::Sensitive,
        "analyze_code" | "generate_code" | "refactor_code" | "explain_code" => Sensitivity::Safe,
        "summarize_context" | "extract_facts" | "analyze_code_context" => Sensitivity::Safe,
        "execute_shell_command" => match tool_args.get("command").and_then(Value::as_str) {
            Some(command) if !command.is_empty() => shell::command_sensitivity(command),
            _ => Sensitivity::Sensitive,
        },
        // Default-deny: anything unrecognized requires approval.
        _ => Sensitivity::Sensitive,
    }
}

/// Extract a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Validation(format!("missing required argument '{key}'")))
}

/// Extract an optional string argument.
pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_is_empty_check() {
        assert!(ToolRegistry::default().is_empty());
    }

    #[test]
    fn read_tools_are_safe_mutating_tools_are_sensitive() {
        assert_eq!(tool_sensitivity("read_file", &json!({})), Sensitivity::Safe);
        assert_eq!(
            tool_sensitivity("list_directory", &json!({})),
            Sensitivity::Safe
        );
        assert_eq!(
            tool_sensitivity("write_file", &json!({})),
            Sensitivity::Sensitive
        );
        assert_eq!(
            tool_sensitivity("delete_file", &json!({})),
            Sensitivity::Sensitive
        );
    }

    #[test]
    fn unknown_tools_are_default_deny() {
        assert_eq!(
            tool_sensitivity("launch_missiles", &json!({})),
            Sensitivity::Sensitive
        );
    }

    #[test]
    fn shell_sensitivity_delegates_to_command_classifier() {
        assert_eq!(
            tool_sensitivity("execute_shell_command", &json!({"command": "echo hi"})),
            Sensitivity::Safe
        );
        assert_eq!(
            tool_sensitivity("execute_shell_command", &json!({"command": "npm install"})),
            Sensitivity::Sensitive
        );
        // Missing or empty command cannot be classified.
        assert_eq!(
            tool_sensitivity("execute_shell_command", &json!({})),
            Sensitivity::Sensitive
        );
        assert_eq!(
            tool_sensitivity("execute_shell_command", &json!({"command": ""})),
            Sensitivity::Sensitive
        );
    }

    #[tokio::test]
    async fn registry_lookup_and_definitions() {
        let tool = Tool::new(
            "echo",
            "Echo the input",
            json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            Arc::new(|args| {
                Box::pin(async move { Ok(required_str(&args, "text")?.to_string()) })
            }),
        );
        let registry = ToolRegistry::new(vec![tool]);

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.definitions()[0].name, "echo");

        let result = registry
            .get("echo")
            .unwrap()
            .execute(json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, "hi");
    }
}
