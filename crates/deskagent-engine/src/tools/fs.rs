//! Filesystem tools: list, read, write, create, delete.
//!
//! All paths pass through the [`PathPolicy`]. Reads and writes are capped at
//! 1 MB; directory listings return a JSON array of `{name, type, size?}`.

use super::path::PathPolicy;
use super::{required_str, Tool};
use crate::error::EngineError;
use serde_json::json;
use std::sync::Arc;

/// Size cap for file reads and writes.
const MAX_FILE_SIZE: u64 = 1024 * 1024;

pub fn list_directory(policy: Arc<PathPolicy>) -> Tool {
    Tool::new(
        "list_directory",
        "List the contents of a directory. Returns a JSON array of file and directory entries.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list"}
            },
            "required": ["path"]
        }),
        Arc::new(move |args| {
            let policy = policy.clone();
            Box::pin(async move {
                let path = policy.validate_directory_path(required_str(&args, "path")?)?;

                let mut entries = Vec::new();
                let mut reader = tokio::fs::read_dir(&path).await?;
                while let Some(entry) = reader.next_entry().await? {
                    let metadata = entry.metadata().await?;
                    let mut item = json!({
                        "name": entry.file_name().to_string_lossy(),
                        "type": if metadata.is_dir() { "directory" } else { "file" },
                    });
                    if metadata.is_file() {
                        item["size"] = json!(metadata.len());
                    }
                    entries.push(item);
                }

                Ok(serde_json::to_string_pretty(&entries)?)
            })
        }),
    )
}

pub fn read_file(policy: Arc<PathPolicy>) -> Tool {
    Tool::new(
        "read_file",
        "Read the contents of a text file. Returns the file content as a string.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to read"}
            },
            "required": ["path"]
        }),
        Arc::new(move |args| {
            let policy = policy.clone();
            Box::pin(async move {
                let path = policy.validate_read_path(required_str(&args, "path")?)?;

                let size = tokio::fs::metadata(&path).await?.len();
                if size > MAX_FILE_SIZE {
                    return Err(EngineError::Validation(format!(
                        "file too large ({}KB); maximum allowed size is {}KB",
                        size / 1024,
                        MAX_FILE_SIZE / 1024
                    )));
                }

                Ok(tokio::fs::read_to_string(&path).await?)
            })
        }),
    )
}

pub fn write_file(policy: Arc<PathPolicy>) -> Tool {
    Tool::new(
        "write_file",
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Target file path"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["path", "content"]
        }),
        Arc::new(move |args| {
            let policy = policy.clone();
            Box::pin(async move {
                let content = required_str(&args, "content")?.to_string();
                if content.len() as u64 > MAX_FILE_SIZE {
                    return Err(EngineError::Validation(format!(
                        "content too large ({}KB); maximum allowed size is {}KB",
                        content.len() / 1024,
                        MAX_FILE_SIZE / 1024
                    )));
                }

                let path = policy.validate_write_path(required_str(&args, "path")?)?;
                tokio::fs::write(&path, content).await?;
                Ok(format!("Successfully wrote to file: {}", path.display()))
            })
        }),
    )
}

pub fn create_directory(policy: Arc<PathPolicy>) -> Tool {
    Tool::new(
        "create_directory",
        "Create a new directory, including missing parent directories.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to create"}
            },
            "required": ["path"]
        }),
        Arc::new(move |args| {
            let policy = policy.clone();
            Box::pin(async move {
                let path = policy.validate_write_path(required_str(&args, "path")?)?;
                tokio::fs::create_dir_all(&path).await?;
                Ok(format!("Successfully created directory: {}", path.display()))
            })
        }),
    )
}

pub fn delete_file(policy: Arc<PathPolicy>) -> Tool {
    Tool::new(
        "delete_file",
        "Delete a file from the file system. Use with caution.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to delete"}
            },
            "required": ["path"]
        }),
        Arc::new(move |args| {
            let policy = policy.clone();
            Box::pin(async move {
                let path = policy.validate_read_path(required_str(&args, "path")?)?;
                tokio::fs::remove_file(&path).await?;
                Ok(format!("Successfully deleted file: {}", path.display()))
            })
        }),
    )
}

/// All filesystem tools bound to one policy.
pub fn file_tools(policy: Arc<PathPolicy>) -> Vec<Tool> {
    vec![
        list_directory(policy.clone()),
        read_file(policy.clone()),
        write_file(policy.clone()),
        create_directory(policy.clone()),
        delete_file(policy),
    ]
}
