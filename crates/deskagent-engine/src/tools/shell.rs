//! Shell command tool with whitelist and blocked-pattern enforcement.
//!
//! # Overview
//!
//! Commands are validated before execution: the command base must be on the
//! whitelist, and the full command line must not match any blocked pattern
//! (chaining, substitution, privilege escalation, destructive filesystem
//! operations, power/user management, service and registry edits). A blocked
//! command is rejected before classification and never runs.
//!
//! [`command_sensitivity`] is the sub-classifier the tool sensitivity map
//! delegates to: read-only bases without output redirection are safe, `git`
//! and `npm` query subcommands are safe, and every other whitelisted
//! command is sensitive (it can mutate state, so it pauses for approval).
//!
//! Execution runs through the platform shell with a 30 second timeout and a
//! 100 KB output cap; stderr is appended under a `Stderr:` header.

use super::path::PathPolicy;
use super::{optional_str, required_str, Sensitivity, Tool};
use crate::error::EngineError;
use regex::Regex;
use serde_json::json;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Command bases allowed to execute at all.
pub const ALLOWED_COMMANDS: [&str; 17] = [
    "npm", "npx", "yarn", "pnpm", "git", "ping", "curl", "wget", "ls", "dir", "cat", "type",
    "echo", "pwd", "ps", "tasklist", "whoami",
];

/// Per-command timeout.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Output beyond this many bytes is truncated.
pub const MAX_OUTPUT_SIZE: usize = 100 * 1024;

const BLOCKED_PATTERNS: [&str; 31] = [
    r"\$\(",       // $(...) command substitution
    r"`[^`]*`",    // backtick command substitution
    r";",          // command separator
    r"&&",         // AND chaining
    r"\|\|",       // OR chaining
    r"\|",         // pipe
    r"\n",         // newline separator
    r"rm\s+-rf",
    r"del\s+/[sfq]",
    r"format\s+",
    r"mkfs",
    r"dd\s+if=",
    r">\s*/dev/",
    r"shutdown",
    r"reboot",
    r"halt",
    r"poweroff",
    r"init\s+0",
    r"kill\s+-9\s+-1",
    r"pkill\s+-9",
    r"chmod\s+777",
    r"chown\s+root",
    r"sudo",
    r"su\s+-",
    r"passwd",
    r"useradd",
    r"userdel",
    r"groupadd",
    r"visudo",
    r"crontab",
    r"reg\s+(add|delete|import|export)|regedit|registry|systemctl|service\s+",
];

fn blocked_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        BLOCKED_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i){pattern}")).expect("blocked pattern must compile")
            })
            .collect()
    })
}

fn command_base(command: &str) -> String {
    command
        .trim()
        .to_lowercase()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Reject commands that are not whitelisted or match a blocked pattern.
pub fn validate_command(command: &str) -> crate::error::Result<()> {
    if command.trim().is_empty() {
        return Err(EngineError::Validation(
            "command cannot be empty".to_string(),
        ));
    }

    let base = command_base(command);
    let allowed = ALLOWED_COMMANDS.iter().any(|candidate| *candidate == base);
    if !allowed {
        return Err(EngineError::Security(format!(
            "command '{base}' is not in the whitelist; allowed commands: {}",
            ALLOWED_COMMANDS.join(", ")
        )));
    }

    for pattern in blocked_patterns() {
        if pattern.is_match(command) {
            return Err(EngineError::Security(
                "command contains a blocked pattern; this operation is not permitted".to_string(),
            ));
        }
    }

    Ok(())
}

/// Classify a whitelisted command for HITL purposes.
///
/// Read-only bases without output redirection are safe; `git` and `npm`
/// query subcommands are safe; everything else whitelisted can mutate state
/// and is sensitive.
pub fn command_sensitivity(command: &str) -> Sensitivity {
    let trimmed = command.trim().to_lowercase();
    let base = command_base(command);

    const SAFE_BASES: [&str; 10] = [
        "ls", "dir", "cat", "type", "echo", "pwd", "ps", "tasklist", "whoami", "ping",
    ];
    if SAFE_BASES.contains(&base.as_str()) && !trimmed.contains('>') {
        return Sensitivity::Safe;
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if base == "git" {
        const SAFE_SUBCOMMANDS: [&str; 8] = [
            "status", "log", "diff", "branch", "remote", "show", "ls-files", "ls-tree",
        ];
        if parts.get(1).is_some_and(|sub| SAFE_SUBCOMMANDS.contains(sub)) {
            return Sensitivity::Safe;
        }
    }
    if base == "npm" {
        const SAFE_SUBCOMMANDS: [&str; 7] =
            ["list", "ls", "view", "info", "search", "outdated", "audit"];
        if parts.get(1).is_some_and(|sub| SAFE_SUBCOMMANDS.contains(sub)) {
            return Sensitivity::Safe;
        }
    }

    Sensitivity::Sensitive
}

/// The shell execution tool.
pub fn execute_shell_command(policy: Arc<PathPolicy>) -> Tool {
    Tool::new(
        "execute_shell_command",
        "Execute a whitelisted shell command and return its output.",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line to run"},
                "cwd": {"type": "string", "description": "Working directory (optional)"}
            },
            "required": ["command"]
        }),
        Arc::new(move |args| {
            let policy = policy.clone();
            Box::pin(async move {
                let command = required_str(&args, "command")?.to_string();
                validate_command(&command)?;

                let mut process = shell_invocation(&command);
                if let Some(cwd) = optional_str(&args, "cwd") {
                    let cwd = policy.validate_directory_path(cwd)?;
                    process.current_dir(cwd);
                }
                process.stdin(Stdio::null());
                process.stdout(Stdio::piped());
                process.stderr(Stdio::piped());
                process.kill_on_drop(true);

                tracing::info!(command = %command, "Executing shell command");
                let child = process.spawn().map_err(|e| {
                    EngineError::Validation(format!("command could not be started: {e}"))
                })?;

                let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
                    .await
                    .map_err(|_| {
                        EngineError::Timeout(format!(
                            "command timed out after {} seconds",
                            COMMAND_TIMEOUT.as_secs()
                        ))
                    })??;

                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut text = stdout.to_string();
                if !stderr.is_empty() {
                    if text.is_empty() {
                        text.push_str("Stderr:\n");
                    } else {
                        text.push_str("\n\nStderr:\n");
                    }
                    text.push_str(&stderr);
                }

                if text.len() > MAX_OUTPUT_SIZE {
                    let mut cut = MAX_OUTPUT_SIZE;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    text.truncate(cut);
                    text.push_str("\n... [truncated]");
                }

                if text.is_empty() {
                    text = "Command executed successfully (no output)".to_string();
                }
                Ok(text)
            })
        }),
    )
}

#[cfg(not(windows))]
fn shell_invocation(command: &str) -> tokio::process::Command {
    let mut process = tokio::process::Command::new("sh");
    process.arg("-c").arg(command);
    process
}

#[cfg(windows)]
fn shell_invocation(command: &str) -> tokio::process::Command {
    let mut process = tokio::process::Command::new("powershell.exe");
    process.arg("-Command").arg(command);
    process
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelisted_commands_validate() {
        assert!(validate_command("echo hello").is_ok());
        assert!(validate_command("git status").is_ok());
        assert!(validate_command("npm list").is_ok());
    }

    #[test]
    fn non_whitelisted_commands_are_rejected() {
        assert!(matches!(
            validate_command("rm -rf /"),
            Err(EngineError::Security(_))
        ));
        assert!(matches!(
            validate_command("python script.py"),
            Err(EngineError::Security(_))
        ));
    }

    #[test]
    fn blocked_patterns_are_rejected_even_for_whitelisted_bases() {
        assert!(matches!(
            validate_command("echo hi; reboot"),
            Err(EngineError::Security(_))
        ));
        assert!(matches!(
            validate_command("git status && git push"),
            Err(EngineError::Security(_))
        ));
        assert!(matches!(
            validate_command("cat $(whoami)"),
            Err(EngineError::Security(_))
        ));
        assert!(matches!(
            validate_command("echo sudo something"),
            Err(EngineError::Security(_))
        ));
    }

    #[test]
    fn empty_command_is_a_validation_error() {
        assert!(matches!(
            validate_command("  "),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn read_only_commands_are_safe() {
        assert_eq!(command_sensitivity("echo hello"), Sensitivity::Safe);
        assert_eq!(command_sensitivity("ls -la"), Sensitivity::Safe);
        assert_eq!(command_sensitivity("ping example.com"), Sensitivity::Safe);
    }

    #[test]
    fn redirection_makes_read_only_commands_sensitive() {
        assert_eq!(
            command_sensitivity("echo hi > file.txt"),
            Sensitivity::Sensitive
        );
    }

    #[test]
    fn vcs_and_package_queries_are_safe_mutations_are_not() {
        assert_eq!(command_sensitivity("git status"), Sensitivity::Safe);
        assert_eq!(command_sensitivity("git log --oneline"), Sensitivity::Safe);
        assert_eq!(command_sensitivity("git push"), Sensitivity::Sensitive);
        assert_eq!(command_sensitivity("npm list"), Sensitivity::Safe);
        assert_eq!(command_sensitivity("npm install"), Sensitivity::Sensitive);
        assert_eq!(command_sensitivity("curl https://x"), Sensitivity::Sensitive);
    }

    #[tokio::test]
    async fn executes_and_captures_output() {
        let policy = Arc::new(PathPolicy::standard());
        let output = execute_shell_command(policy)
            .execute(json!({"command": "echo shell-tool-test"}))
            .await
            .unwrap();
        assert!(output.contains("shell-tool-test"));
    }

    #[tokio::test]
    async fn empty_output_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Arc::new(PathPolicy::with_roots(vec![dir.path().to_path_buf()]));
        let output = execute_shell_command(policy)
            .execute(json!({
                "command": "ls",
                "cwd": dir.path().to_string_lossy(),
            }))
            .await
            .unwrap();
        assert_eq!(output, "Command executed successfully (no output)");
    }

    #[tokio::test]
    async fn blocked_command_never_executes() {
        let policy = Arc::new(PathPolicy::standard());
        let err = execute_shell_command(policy)
            .execute(json!({"command": "echo hi | cat"}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Security(_)));
    }
}
