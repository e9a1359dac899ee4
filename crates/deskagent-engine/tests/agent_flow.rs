//! End-to-end runs of the agent graph with scripted models.

use deskagent_checkpoint::{CheckpointSaver, InMemorySaver, SqliteSaver};
use deskagent_engine::{
    workers, AgentEvent, AgentGraph, AgentState, HistoryStore, InMemoryHistoryStore, Orchestrator,
    PathPolicy,
};
use deskagent_graph::{MessageRole, ToolCall};
use deskagent_llm::ScriptedModel;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Harness {
    graph: AgentGraph,
    supervisor: ScriptedModel,
    fs_model: ScriptedModel,
    sys_model: ScriptedModel,
    _dir: tempfile::TempDir,
    home: std::path::PathBuf,
}

fn build(saver: Arc<dyn CheckpointSaver>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_path_buf();
    let policy = Arc::new(PathPolicy::with_roots(vec![home.clone()]));

    let supervisor = ScriptedModel::default();
    let fs_model = ScriptedModel::default();
    let sys_model = ScriptedModel::default();
    let research_model = ScriptedModel::default();
    let code_model = ScriptedModel::default();

    let pool = vec![
        workers::filesystem_worker(policy.clone(), Arc::new(fs_model.clone())),
        workers::system_worker(policy.clone(), Arc::new(sys_model.clone())),
        workers::researcher_worker(policy.clone(), Arc::new(research_model)),
        workers::code_worker(policy, Arc::new(code_model)),
    ];

    let graph = AgentGraph::new(Arc::new(supervisor.clone()), pool, saver).unwrap();
    Harness {
        graph,
        supervisor,
        fs_model,
        sys_model,
        _dir: dir,
        home,
    }
}

fn route_to(worker: &str) -> deskagent_llm::ChatResponse {
    ScriptedModel::text(
        json!({"reasoning": "route", "next": worker, "final_response": null}).to_string(),
    )
}

fn finish(response: &str) -> deskagent_llm::ChatResponse {
    ScriptedModel::text(
        json!({"reasoning": "done", "next": "FINISH", "final_response": response}).to_string(),
    )
}

async fn collect(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn final_response(events: &[AgentEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        AgentEvent::Complete { response } => Some(response.clone()),
        _ => None,
    })
}

async fn state_of(graph: &AgentGraph, thread_id: &str) -> AgentState {
    graph.get_state(thread_id).await.unwrap().unwrap()
}

/// Every assistant tool call id must resolve to exactly one tool message.
fn assert_tool_calls_resolved(state: &AgentState) {
    for message in &state.messages {
        let Some(calls) = &message.tool_calls else {
            continue;
        };
        for call in calls {
            let resolutions = state
                .messages
                .iter()
                .filter(|m| {
                    m.role == MessageRole::Tool && m.tool_call_id.as_deref() == Some(&call.id)
                })
                .count();
            assert_eq!(resolutions, 1, "call {} resolved {resolutions} times", call.id);
        }
    }
}

#[tokio::test]
async fn direct_answer_without_tools() {
    let harness = build(Arc::new(InMemorySaver::new()));
    harness.supervisor.push(finish("Hello."));

    let events = collect(harness.graph.stream("t1", Some("hi".to_string()))).await;

    assert_eq!(final_response(&events).as_deref(), Some("Hello."));
    assert!(!events
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolCall { .. })));

    let state = state_of(&harness.graph, "t1").await;
    assert_eq!(state.messages.len(), 1); // just the user message
    assert_eq!(state.final_response.as_deref(), Some("Hello."));
    assert!(state.current_worker.is_none());
    assert_eq!(state.iteration_count, 1);
}

#[tokio::test]
async fn safe_listing_executes_inline() {
    let harness = build(Arc::new(InMemorySaver::new()));
    std::fs::write(harness.home.join("notes.txt"), "x").unwrap();

    let home_path = harness.home.to_string_lossy().to_string();
    harness.supervisor.push(route_to("filesystem_worker"));
    harness.supervisor.push(finish("The directory contains notes.txt."));
    harness.fs_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
        "c1",
        "list_directory",
        json!({"path": home_path}),
    )]));
    harness
        .fs_model
        .push(ScriptedModel::text("Listed the directory."));

    let events = collect(harness.graph.stream("t2", Some("List my files".to_string()))).await;

    // routing -> worker_started -> tool_call -> tool_result -> ... -> complete
    let routing_at = events
        .iter()
        .position(|e| matches!(e, AgentEvent::Routing { next } if next == "filesystem_worker"))
        .unwrap();
    let started_at = events
        .iter()
        .position(|e| matches!(e, AgentEvent::WorkerStarted { worker } if worker == "filesystem_worker"))
        .unwrap();
    let call_at = events
        .iter()
        .position(
            |e| matches!(e, AgentEvent::ToolCall { tools } if tools[0].name == "list_directory"),
        )
        .unwrap();
    let result_at = events
        .iter()
        .position(|e| matches!(e, AgentEvent::ToolResult { result } if result.contains("notes.txt")))
        .unwrap();
    assert!(routing_at < started_at && started_at < call_at && call_at < result_at);
    assert_eq!(
        final_response(&events).as_deref(),
        Some("The directory contains notes.txt.")
    );

    let state = state_of(&harness.graph, "t2").await;
    assert_tool_calls_resolved(&state);
    // The wrap-up step (no tool calls) replaces the tool-trace summary.
    assert_eq!(
        state.task_summary.as_deref(),
        Some("[filesystem_worker] Processed request")
    );
    // Two worker invocations: tool round, then the wrap-up.
    assert_eq!(harness.fs_model.call_count(), 2);
}

#[tokio::test]
async fn sensitive_write_pauses_then_approval_executes() {
    let harness = build(Arc::new(InMemorySaver::new()));
    let target = harness.home.join("note.txt");

    harness.supervisor.push(route_to("filesystem_worker"));
    harness.supervisor.push(finish("Created note.txt."));
    harness.fs_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
        "c1",
        "write_file",
        json!({"path": target.to_string_lossy(), "content": "hello"}),
    )]));

    let events = collect(
        harness
            .graph
            .stream("t3", Some("Create note.txt with 'hello'".to_string())),
    )
    .await;

    // The run paused: approval_required is the last event, nothing written.
    let action = match events.last().unwrap() {
        AgentEvent::ApprovalRequired { action } => action.clone(),
        other => panic!("expected approval_required, got {other:?}"),
    };
    assert_eq!(action.tool_name, "write_file");
    assert_eq!(action.id, "c1");
    assert_eq!(
        action.description,
        format!("Write to file: {}", target.display())
    );
    assert!(!target.exists());

    let state = state_of(&harness.graph, "t3").await;
    assert!(state.awaiting_approval);
    assert_eq!(state.current_worker.as_deref(), Some("filesystem_worker"));
    assert_eq!(
        state.messages.last().unwrap().content,
        "[Awaiting user approval]"
    );

    // Approve, then resume: the real write happens, placeholder replaced.
    harness.graph.approve_action("t3").await.unwrap();

    let state = state_of(&harness.graph, "t3").await;
    assert!(!state.awaiting_approval);
    assert!(state.pending_action.is_none());
    assert!(target.exists());
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");

    let events = collect(harness.graph.stream("t3", None)).await;
    assert_eq!(final_response(&events).as_deref(), Some("Created note.txt."));

    let state = state_of(&harness.graph, "t3").await;
    assert_tool_calls_resolved(&state);
    let resolved = state
        .messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("c1"))
        .unwrap();
    assert!(resolved.content.starts_with("Successfully wrote to file:"));
}

#[tokio::test]
async fn sensitive_write_denied_leaves_no_trace() {
    let harness = build(Arc::new(InMemorySaver::new()));
    let target = harness.home.join("note.txt");

    harness.supervisor.push(route_to("filesystem_worker"));
    harness.supervisor.push(finish("Understood, nothing was written."));
    harness.fs_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
        "c1",
        "write_file",
        json!({"path": target.to_string_lossy(), "content": "hello"}),
    )]));

    collect(
        harness
            .graph
            .stream("t4", Some("Create note.txt".to_string())),
    )
    .await;

    harness
        .graph
        .deny_action("t4", Some("not now"))
        .await
        .unwrap();
    let events = collect(harness.graph.stream("t4", None)).await;

    assert_eq!(
        final_response(&events).as_deref(),
        Some("Understood, nothing was written.")
    );
    assert!(!target.exists());

    let state = state_of(&harness.graph, "t4").await;
    assert!(state
        .messages
        .iter()
        .any(|m| m.role == MessageRole::User && m.content == "Action denied by user: not now"));
}

#[tokio::test]
async fn resume_while_paused_only_reemits_approval() {
    let harness = build(Arc::new(InMemorySaver::new()));
    let target = harness.home.join("note.txt");

    harness.supervisor.push(route_to("filesystem_worker"));
    harness.fs_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
        "c1",
        "write_file",
        json!({"path": target.to_string_lossy(), "content": "hello"}),
    )]));

    collect(harness.graph.stream("t5", Some("write".to_string()))).await;
    let supervisor_calls = harness.supervisor.call_count();

    // No decision applied; streaming again must not advance the graph.
    let events = collect(harness.graph.stream("t5", None)).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], AgentEvent::ApprovalRequired { .. }));
    assert_eq!(harness.supervisor.call_count(), supervisor_calls);
    assert!(state_of(&harness.graph, "t5").await.awaiting_approval);
}

#[tokio::test]
async fn worker_self_loop_is_bounded() {
    let harness = build(Arc::new(InMemorySaver::new()));

    harness.supervisor.push(route_to("system_worker"));
    harness.supervisor.push(finish("Stopped after repeated tool use."));
    // A worker that never stops making (safe) tool calls.
    for i in 0..10 {
        harness.sys_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
            format!("c{i}"),
            "get_system_info",
            json!({}),
        )]));
    }

    let events = collect(harness.graph.stream("t6", Some("loop forever".to_string()))).await;

    let started = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::WorkerStarted { .. }))
        .count();
    assert_eq!(started, 5, "worker must be forced back after 5 self-loops");
    assert_eq!(harness.sys_model.call_count(), 5);
    assert_eq!(
        final_response(&events).as_deref(),
        Some("Stopped after repeated tool use.")
    );

    let state = state_of(&harness.graph, "t6").await;
    // Reset on the supervisor pass that finished the turn.
    assert_eq!(state.worker_iteration_count, 0);
    assert_tool_calls_resolved(&state);
}

#[tokio::test]
async fn transcript_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("checkpoints.db");

    let before = {
        let saver = Arc::new(SqliteSaver::open(&db_path).await.unwrap());
        let harness = build(saver);
        harness.supervisor.push(finish("Hello."));
        collect(harness.graph.stream("t7", Some("hi".to_string()))).await;
        state_of(&harness.graph, "t7").await
    };

    // Fresh process: new graph over the same database file.
    let saver = Arc::new(SqliteSaver::open(&db_path).await.unwrap());
    let harness = build(saver);
    let after = state_of(&harness.graph, "t7").await;

    assert_eq!(after.messages, before.messages);
    assert_eq!(after.final_response, before.final_response);
    assert_eq!(harness.supervisor.call_count(), 0);
}

#[tokio::test]
async fn delete_thread_is_isolated() {
    let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemorySaver::new());
    let harness = build(saver);
    harness.supervisor.push(finish("One."));
    harness.supervisor.push(finish("Two."));

    collect(harness.graph.stream("keep", Some("a".to_string()))).await;
    collect(harness.graph.stream("drop", Some("b".to_string()))).await;

    harness.graph.delete_thread("drop").await.unwrap();

    assert!(harness.graph.get_state("drop").await.unwrap().is_none());
    assert!(harness.graph.get_state("keep").await.unwrap().is_some());
}

#[tokio::test]
async fn counters_reset_between_turns() {
    let harness = build(Arc::new(InMemorySaver::new()));
    harness.supervisor.push(finish("First."));
    harness.supervisor.push(finish("Second."));

    collect(harness.graph.stream("t8", Some("one".to_string()))).await;
    let state = state_of(&harness.graph, "t8").await;
    assert_eq!(state.iteration_count, 1);

    collect(harness.graph.stream("t8", Some("two".to_string()))).await;
    let state = state_of(&harness.graph, "t8").await;
    // Reset to 0 at turn start, one supervisor pass this turn.
    assert_eq!(state.iteration_count, 1);
    assert_eq!(state.messages.len(), 2);
}

#[tokio::test]
async fn orchestrator_persists_user_and_assistant_messages() {
    let harness = build(Arc::new(InMemorySaver::new()));
    harness.supervisor.push(finish("Hello."));

    let history = Arc::new(InMemoryHistoryStore::new());
    let orchestrator = Orchestrator::new(harness.graph.clone(), history.clone());

    assert_eq!(orchestrator.ping(), "pong");

    let mut seen = Vec::new();
    orchestrator
        .ask("t9", "hi", |event| seen.push(event))
        .await
        .unwrap();

    assert_eq!(final_response(&seen).as_deref(), Some("Hello."));
    let session = history.load("t9").await.unwrap().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, "user");
    assert_eq!(session.messages[0].content, "hi");
    assert_eq!(session.messages[1].role, "assistant");
    assert_eq!(session.messages[1].content, "Hello.");
}

#[tokio::test]
async fn denied_action_allows_a_clean_retry() {
    let harness = build(Arc::new(InMemorySaver::new()));
    let target = harness.home.join("retry.txt");
    let path = target.to_string_lossy().to_string();

    // Turn 1: denied.
    harness.supervisor.push(route_to("filesystem_worker"));
    harness.supervisor.push(finish("Not written."));
    harness.fs_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
        "c1",
        "write_file",
        json!({"path": path, "content": "v1"}),
    )]));

    collect(harness.graph.stream("t10", Some("write retry.txt".to_string()))).await;
    harness.graph.deny_action("t10", None).await.unwrap();
    collect(harness.graph.stream("t10", None)).await;

    // Turn 2: same request routes the same way and succeeds on approval.
    harness.supervisor.push(route_to("filesystem_worker"));
    harness.supervisor.push(finish("Written."));
    harness.fs_model.push(ScriptedModel::tool_calls(vec![ToolCall::new(
        "c2",
        "write_file",
        json!({"path": target.to_string_lossy(), "content": "v1"}),
    )]));

    let events = collect(
        harness
            .graph
            .stream("t10", Some("write retry.txt".to_string())),
    )
    .await;
    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::ApprovalRequired { .. }
    ));

    harness.graph.approve_action("t10").await.unwrap();
    let events = collect(harness.graph.stream("t10", None)).await;
    assert_eq!(final_response(&events).as_deref(), Some("Written."));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "v1");
}

#[tokio::test]
async fn checkpoint_database_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("checkpoints.db");
    tokio::fs::create_dir_all(db_path.parent().unwrap())
        .await
        .unwrap();

    let saver = Arc::new(SqliteSaver::open(&db_path).await.unwrap());
    let harness = build(saver);
    harness.supervisor.push(finish("Hi."));
    collect(harness.graph.stream("t11", Some("hello".to_string()))).await;

    assert!(Path::new(&db_path).exists());
}
