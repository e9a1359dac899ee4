//! Research tools: summarization and fact extraction.
//!
//! Prompt-expansion tools like the code tools; the researcher worker's local
//! model does the actual work on its next step.

use super::{optional_str, required_str, Tool};
use serde_json::json;
use std::sync::Arc;

pub fn summarize_context() -> Tool {
    Tool::new(
        "summarize_context",
        "Summarize provided text or conversation context into key points.",
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text to summarize"},
                "max_points": {"type": "integer", "description": "Number of key points (optional)"}
            },
            "required": ["text"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let text = required_str(&args, "text")?;
                let max_points = args
                    .get("max_points")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(5);
                Ok(format!(
                    "Please summarize the following text into {max_points} key points:\n\n{text}"
                ))
            })
        }),
    )
}

pub fn extract_facts() -> Tool {
    Tool::new(
        "extract_facts",
        "Extract factual information from provided text.",
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text to extract facts from"},
                "topic": {"type": "string", "description": "Topic to focus on (optional)"}
            },
            "required": ["text"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let text = required_str(&args, "text")?;
                let focus = optional_str(&args, "topic")
                    .map(|topic| format!(" Focus on facts related to: {topic}"))
                    .unwrap_or_default();
                Ok(format!(
                    "Please extract key facts from the following text.{focus}\n\n{text}"
                ))
            })
        }),
    )
}

pub fn analyze_code_context() -> Tool {
    Tool::new(
        "analyze_code_context",
        "Analyze code context and provide insights about structure, patterns, or issues.",
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Code to analyze"},
                "analysis_type": {"type": "string", "description": "Kind of analysis (optional)"}
            },
            "required": ["code"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let code = required_str(&args, "code")?;
                let kind = optional_str(&args, "analysis_type").unwrap_or("general");
                Ok(format!("Please analyze the following code for {kind}:\n\n{code}"))
            })
        }),
    )
}

/// All research tools.
pub fn research_tools() -> Vec<Tool> {
    vec![summarize_context(), extract_facts(), analyze_code_context()]
}
