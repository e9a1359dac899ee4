//! Code-analysis tools.
//!
//! These are prompt-expansion tools: they reshape their arguments into an
//! instruction the worker's own model then completes on its next step. No
//! external process runs, which is why they classify as safe.

use super::{optional_str, required_str, Tool};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn analyze_code() -> Tool {
    Tool::new(
        "analyze_code",
        "Analyze code for structure, quality, potential bugs, and improvements.",
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Code to analyze"},
                "language": {"type": "string", "description": "Programming language (optional)"},
                "focus_areas": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Aspects to focus on (optional)"
                }
            },
            "required": ["code"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let code = required_str(&args, "code")?;
                let language = optional_str(&args, "language")
                    .map(|l| format!(" ({l})"))
                    .unwrap_or_default();
                let focus = match args.get("focus_areas").and_then(Value::as_array) {
                    Some(areas) if !areas.is_empty() => {
                        let names: Vec<&str> =
                            areas.iter().filter_map(Value::as_str).collect();
                        if names.contains(&"all") {
                            "all aspects".to_string()
                        } else {
                            names.join(", ")
                        }
                    }
                    _ => "all aspects".to_string(),
                };
                Ok(format!(
                    "Analyze the following code{language} focusing on {focus}:\n\n{code}"
                ))
            })
        }),
    )
}

pub fn generate_code() -> Tool {
    Tool::new(
        "generate_code",
        "Generate code based on requirements or specifications.",
        json!({
            "type": "object",
            "properties": {
                "requirements": {"type": "string", "description": "What the code should do"},
                "language": {"type": "string", "description": "Target language"},
                "style": {"type": "string", "description": "Code style (optional)"}
            },
            "required": ["requirements", "language"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let requirements = required_str(&args, "requirements")?;
                let language = required_str(&args, "language")?;
                let style = optional_str(&args, "style").unwrap_or("documented");
                Ok(format!("Generate {style} {language} code for: {requirements}"))
            })
        }),
    )
}

pub fn refactor_code() -> Tool {
    Tool::new(
        "refactor_code",
        "Suggest refactoring improvements for existing code.",
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Code to refactor"},
                "goals": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Refactoring goals (optional)"
                }
            },
            "required": ["code"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let code = required_str(&args, "code")?;
                let goals = match args.get("goals").and_then(Value::as_array) {
                    Some(goals) if !goals.is_empty() => goals
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                    _ => "readability".to_string(),
                };
                Ok(format!(
                    "Suggest refactoring for the following code to improve {goals}:\n\n{code}"
                ))
            })
        }),
    )
}

pub fn explain_code() -> Tool {
    Tool::new(
        "explain_code",
        "Explain what a piece of code does in plain language.",
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Code to explain"},
                "detail_level": {"type": "string", "description": "How detailed (optional)"}
            },
            "required": ["code"]
        }),
        Arc::new(|args| {
            Box::pin(async move {
                let code = required_str(&args, "code")?;
                let detail = optional_str(&args, "detail_level").unwrap_or("detailed");
                Ok(format!("Explain the following code ({detail}):\n\n{code}"))
            })
        }),
    )
}

/// All code tools.
pub fn code_tools() -> Vec<Tool> {
    vec![analyze_code(), generate_code(), refactor_code(), explain_code()]
}
