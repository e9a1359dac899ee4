//! The four concrete workers.
//!
//! Workers differ only in tool set, system prompt and model binding; the
//! researcher runs on the local model so summarized content never leaves
//! the machine.

use crate::state::nodes;
use crate::tools::path::PathPolicy;
use crate::tools::{code, fs, research, shell, system, ToolRegistry};
use crate::worker::Worker;
use deskagent_llm::ChatModel;
use std::sync::Arc;

pub fn filesystem_worker(policy: Arc<PathPolicy>, model: Arc<dyn ChatModel>) -> Worker {
    let home = policy.home().display().to_string();
    let downloads = policy.home().join("Downloads").display().to_string();
    let documents = policy.home().join("Documents").display().to_string();

    let system_prompt = format!(
        "You are a FileSystem Worker, a specialized agent for file operations.

Your capabilities:
- Read file contents (read_file)
- Write content to files (write_file)
- Create directories (create_directory)
- List directory contents (list_directory)
- Delete files (delete_file)

Environment:
- User Home: {home}
- Downloads: {downloads}
- Documents: {documents}

Guidelines:
1. CRITICAL: Use the absolute paths provided in the Environment section. \
Do not invent generic paths like '/home/user/downloads' or '/tmp'.
2. If the user asks for \"Downloads\", use the Downloads path defined above.
3. Always prefer absolute paths; relative paths resolve from the user home.
4. Be careful with write operations, they can overwrite existing files.
5. Report file sizes and types when listing directories.
6. Handle errors gracefully and provide helpful error messages.

When you complete your task, provide a clear summary of what was done."
    );

    Worker::new(
        nodes::FILESYSTEM_WORKER,
        "Handles file system operations: reading, writing, and listing files/directories.",
        system_prompt,
        ToolRegistry::new(fs::file_tools(policy)),
        model,
    )
}

pub fn system_worker(policy: Arc<PathPolicy>, model: Arc<dyn ChatModel>) -> Worker {
    let system_prompt = format!(
        "You are a System Worker, a specialized agent for system operations.

Your capabilities:
- Get system information (get_system_info)
- Execute whitelisted shell commands (execute_shell_command)

Allowed shell commands: {}

Current platform: {}

Guidelines:
1. Use get_system_info for hardware and OS queries.
2. Only use execute_shell_command for allowed commands.
3. Be cautious with commands that modify state (npm install, git commit, ...).
4. Provide clear output summaries for command results.
5. Handle command timeouts gracefully ({} second limit).

When you complete your task, provide a clear summary of what was done.",
        shell::ALLOWED_COMMANDS.join(", "),
        std::env::consts::OS,
        shell::COMMAND_TIMEOUT.as_secs(),
    );

    let mut tools = vec![system::get_system_info()];
    tools.push(shell::execute_shell_command(policy));

    Worker::new(
        nodes::SYSTEM_WORKER,
        "Handles system operations: system info, shell commands (npm, git, ping, etc.).",
        system_prompt,
        ToolRegistry::new(tools),
        model,
    )
}

pub fn researcher_worker(policy: Arc<PathPolicy>, model: Arc<dyn ChatModel>) -> Worker {
    let system_prompt = "You are a Researcher Worker, a specialized agent for information processing.

Your capabilities:
- Summarize text and conversations (summarize_context)
- Extract factual information (extract_facts)
- Analyze code context (analyze_code_context)
- Read files to get context (read_file)
- List directories to explore (list_directory)

Guidelines:
1. Be concise but comprehensive in summaries.
2. Focus on actionable and relevant information.
3. When analyzing code, identify patterns and potential issues.
4. Maintain privacy: you run locally to minimize data exposure.
5. Provide structured output when possible.
6. Use read_file to fetch content before summarizing it.

When you complete your task, provide a clear summary of findings.";

    let mut tools = research::research_tools();
    tools.push(fs::read_file(policy.clone()));
    tools.push(fs::list_directory(policy));

    Worker::new(
        nodes::RESEARCHER_WORKER,
        "Handles information retrieval, summarization, and context analysis. Privacy-focused.",
        system_prompt,
        ToolRegistry::new(tools),
        model,
    )
}

pub fn code_worker(policy: Arc<PathPolicy>, model: Arc<dyn ChatModel>) -> Worker {
    let system_prompt = "You are a Code Worker, a specialized agent for code-related tasks.

Your capabilities:
- Analyze code for bugs, performance, security, and style (analyze_code)
- Generate code from requirements (generate_code)
- Suggest refactoring improvements (refactor_code)
- Explain code in plain language (explain_code)
- Read files to get code context (read_file)
- Write code to files (write_file)
- List directories to explore project structure (list_directory)

Guidelines:
1. Always consider best practices for the target language.
2. Provide actionable suggestions, not just observations.
3. When generating code, include necessary imports and error handling.
4. Consider edge cases and potential issues.
5. Format code properly with appropriate indentation.
6. Use read_file to fetch code content before analyzing it.

When you complete your task, provide the code or analysis with clear explanations.";

    let mut tools = code::code_tools();
    tools.push(fs::read_file(policy.clone()));
    tools.push(fs::write_file(policy.clone()));
    tools.push(fs::list_directory(policy));

    Worker::new(
        nodes::CODE_WORKER,
        "Handles code analysis, generation, refactoring, and explanation.",
        system_prompt,
        ToolRegistry::new(tools),
        model,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskagent_llm::ScriptedModel;

    #[test]
    fn workers_carry_their_tool_sets() {
        let policy = Arc::new(PathPolicy::standard());
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::default());

        let fs = filesystem_worker(policy.clone(), model.clone());
        assert_eq!(fs.name(), "filesystem_worker");

        let sys = system_worker(policy.clone(), model.clone());
        assert_eq!(sys.name(), "system_worker");

        let research = researcher_worker(policy.clone(), model.clone());
        assert_eq!(research.name(), "researcher_worker");

        let code = code_worker(policy, model);
        assert_eq!(code.name(), "code_worker");
    }
}
