//! Graph assembly: supervisor, workers, human approval, and the event
//! stream.
//!
//! # Overview
//!
//! [`AgentGraph`] wires the supervisor and the worker pool into a compiled
//! state graph:
//!
//! ```text
//! START -> supervisor --(next)--> worker --+--> supervisor
//!             ^                            |--> worker (self-loop)
//!             |                            '--> human_approval
//!             '------- human_approval <----'        (interrupt before)
//! ```
//!
//! The supervisor node increments `iteration_count` and resets the
//! per-worker counters; each worker node increments
//! `worker_iteration_count`. A worker's out-edge sends it to
//! `human_approval` when a sensitive call is pending, back to the
//! supervisor when its task is complete or it exhausted its self-loop
//! budget, and to itself otherwise.
//!
//! The graph pauses before `human_approval`; the approval decision is
//! written into state by [`AgentGraph::approve_action`] /
//! [`AgentGraph::deny_action`], and the next stream call resumes through
//! the node (which clears `awaiting_approval`) into the supervisor.

use crate::error::{EngineError, Result};
use crate::events::{AgentEvent, ToolCallInfo};
use crate::state::{build_schema, nodes, AgentState, MAX_WORKER_ITERATIONS};
use crate::supervisor::Supervisor;
use crate::worker::Worker;
use deskagent_checkpoint::{CheckpointConfig, CheckpointSaver};
use deskagent_graph::{
    CompiledGraph, ExecutionEvent, Graph, GraphError, Message, MessageRole, NodeExecutor,
    StateSnapshot, END, START,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The multi-agent state graph for one engine instance.
#[derive(Clone)]
pub struct AgentGraph {
    compiled: Arc<CompiledGraph>,
    workers: Arc<HashMap<String, Arc<Worker>>>,
    checkpointer: Arc<dyn CheckpointSaver>,
}

impl AgentGraph {
    /// Assemble the graph from a routing model and a worker pool.
    pub fn new(
        routing_model: Arc<dyn deskagent_llm::ChatModel>,
        workers: Vec<Worker>,
        checkpointer: Arc<dyn CheckpointSaver>,
    ) -> Result<Self> {
        let descriptions = workers
            .iter()
            .map(|w| (w.name().to_string(), w.description().to_string()))
            .collect();
        let supervisor = Arc::new(Supervisor::new(routing_model, descriptions));
        let workers: Arc<HashMap<String, Arc<Worker>>> = Arc::new(
            workers
                .into_iter()
                .map(|w| (w.name().to_string(), Arc::new(w)))
                .collect(),
        );

        let mut graph = Graph::new();

        graph.add_node(nodes::SUPERVISOR, supervisor_node(supervisor));
        for (name, worker) in workers.iter() {
            graph.add_node(name.clone(), worker_node(worker.clone()));
        }
        let approval: NodeExecutor =
            Arc::new(|_state| Box::pin(async { Ok(json!({"awaiting_approval": false})) }));
        graph.add_node(nodes::HUMAN_APPROVAL, approval);

        graph.add_edge(START, nodes::SUPERVISOR);

        let mut supervisor_branches: HashMap<String, String> = workers
            .keys()
            .map(|name| (name.clone(), name.clone()))
            .collect();
        supervisor_branches.insert(END.to_string(), END.to_string());
        graph.add_conditional_edge(
            nodes::SUPERVISOR,
            Arc::new(|state: &Value| {
                state["next"]
                    .as_str()
                    .unwrap_or(nodes::SUPERVISOR)
                    .to_string()
            }),
            supervisor_branches,
        );

        for name in workers.keys() {
            let own_name = name.clone();
            graph.add_conditional_edge(
                name.clone(),
                Arc::new(move |state: &Value| {
                    if state["awaiting_approval"].as_bool().unwrap_or(false) {
                        nodes::HUMAN_APPROVAL.to_string()
                    } else if state["task_complete"].as_bool().unwrap_or(false) {
                        nodes::SUPERVISOR.to_string()
                    } else if state["worker_iteration_count"].as_i64().unwrap_or(0)
                        >= MAX_WORKER_ITERATIONS
                    {
                        nodes::SUPERVISOR.to_string()
                    } else {
                        own_name.clone()
                    }
                }),
                HashMap::from([
                    (
                        nodes::HUMAN_APPROVAL.to_string(),
                        nodes::HUMAN_APPROVAL.to_string(),
                    ),
                    (nodes::SUPERVISOR.to_string(), nodes::SUPERVISOR.to_string()),
                    (name.clone(), name.clone()),
                ]),
            );
        }

        graph.add_edge(nodes::HUMAN_APPROVAL, nodes::SUPERVISOR);

        let compiled = graph
            .compile(build_schema())?
            .with_checkpointer(checkpointer.clone())
            .with_interrupt_before([nodes::HUMAN_APPROVAL.to_string()]);

        Ok(Self {
            compiled: Arc::new(compiled),
            workers,
            checkpointer,
        })
    }

    /// Start or resume a run for a thread; events arrive on the returned
    /// receiver until the run pauses, completes or fails.
    pub fn stream(&self, thread_id: &str, user_input: Option<String>) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(64);
        let graph = self.clone();
        let thread_id = thread_id.to_string();
        tokio::spawn(async move {
            graph.run_stream(thread_id, user_input, tx).await;
        });
        rx
    }

    async fn run_stream(
        &self,
        thread_id: String,
        user_input: Option<String>,
        tx: mpsc::Sender<AgentEvent>,
    ) {
        if let Err(e) = self.run_stream_inner(&thread_id, user_input, &tx).await {
            tracing::error!(thread_id = %thread_id, error = %e, "Agent stream failed");
            let _ = tx
                .send(AgentEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    }

    async fn run_stream_inner(
        &self,
        thread_id: &str,
        user_input: Option<String>,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<()> {
        let config = CheckpointConfig::new(thread_id);
        let snapshot = self.compiled.get_state(&config).await?;

        let paused = snapshot
            .as_ref()
            .filter(|s| s.is_paused_at(nodes::HUMAN_APPROVAL));

        let input = if let Some(paused_snapshot) = paused {
            let state = agent_state(paused_snapshot)?;
            if state.awaiting_approval {
                // No approve/deny has been applied; re-emit the pause and
                // leave the checkpoint untouched.
                if let Some(action) = state.pending_action {
                    let _ = tx.send(AgentEvent::ApprovalRequired { action }).await;
                }
                return Ok(());
            }
            // Decision applied; resume through human_approval with no delta.
            None
        } else {
            match user_input {
                Some(text) => Some(turn_input(&text)?),
                None => {
                    // Nothing to resume. Re-emitting a finished turn's
                    // response keeps resume idempotent for the caller.
                    if let Some(snapshot) = &snapshot {
                        let state = agent_state(snapshot)?;
                        if let Some(response) = state.final_response {
                            let _ = tx.send(AgentEvent::Complete { response }).await;
                            return Ok(());
                        }
                    }
                    return Err(EngineError::Validation(format!(
                        "thread '{thread_id}' has nothing to resume"
                    )));
                }
            }
        };

        let (exec_tx, mut exec_rx) = mpsc::channel::<ExecutionEvent>(64);
        let compiled = self.compiled.clone();
        let run_config = config.clone();
        let run = tokio::spawn(async move {
            compiled.stream(input, &run_config, exec_tx).await
        });

        while let Some(event) = exec_rx.recv().await {
            for translated in translate_event(event) {
                let _ = tx.send(translated).await;
            }
        }

        match run.await {
            Ok(Ok(_values)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => return Err(EngineError::Validation(format!("run task failed: {e}"))),
        }

        // Terminal event from the committed state: a pause surfaces the
        // pending action, a finished run surfaces the final response.
        if let Some(snapshot) = self.compiled.get_state(&config).await? {
            let state = agent_state(&snapshot)?;
            if state.awaiting_approval {
                if let Some(action) = state.pending_action {
                    let _ = tx.send(AgentEvent::ApprovalRequired { action }).await;
                    return Ok(());
                }
            }
            if let Some(response) = state.final_response {
                if !response.is_empty() {
                    let _ = tx.send(AgentEvent::Complete { response }).await;
                }
            }
        }
        Ok(())
    }

    /// Execute the pending action and commit the decision into state.
    /// Follow with [`stream`](Self::stream) (no input) to resume the run.
    pub async fn approve_action(&self, thread_id: &str) -> Result<()> {
        let config = CheckpointConfig::new(thread_id);
        let state = self.require_state(&config).await?;

        let action = state
            .pending_action
            .ok_or_else(|| EngineError::Validation("no pending action to approve".to_string()))?;
        let worker_name = state
            .current_worker
            .ok_or_else(|| EngineError::Validation("no worker holds the floor".to_string()))?;
        let worker = self.workers.get(&worker_name).ok_or_else(|| {
            EngineError::Validation(format!("worker '{worker_name}' not found"))
        })?;

        tracing::info!(thread_id, tool = %action.tool_name, "Action approved");
        let result_message = worker.execute_pending_action(&action).await;

        self.compiled
            .update_state(
                &config,
                json!({
                    "messages": [result_message],
                    "pending_action": null,
                    "awaiting_approval": false,
                }),
            )
            .await?;
        Ok(())
    }

    /// Record a denial and commit it into state; no tool runs.
    pub async fn deny_action(&self, thread_id: &str, reason: Option<&str>) -> Result<()> {
        let config = CheckpointConfig::new(thread_id);
        let state = self.require_state(&config).await?;
        if state.pending_action.is_none() {
            return Err(EngineError::Validation(
                "no pending action to deny".to_string(),
            ));
        }

        let denial = match reason {
            Some(reason) => format!("Action denied by user: {reason}"),
            None => "Action denied by user".to_string(),
        };
        tracing::info!(thread_id, "Action denied");

        self.compiled
            .update_state(
                &config,
                json!({
                    "messages": [Message::user(denial)],
                    "pending_action": null,
                    "awaiting_approval": false,
                }),
            )
            .await?;
        Ok(())
    }

    /// The thread's current typed state, if any.
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<AgentState>> {
        let config = CheckpointConfig::new(thread_id);
        match self.compiled.get_state(&config).await? {
            Some(snapshot) => Ok(Some(agent_state(&snapshot)?)),
            None => Ok(None),
        }
    }

    /// Destroy a thread's durable state.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.checkpointer.delete_thread(thread_id).await?;
        Ok(())
    }

    async fn require_state(&self, config: &CheckpointConfig) -> Result<AgentState> {
        let snapshot = self
            .compiled
            .get_state(config)
            .await?
            .ok_or_else(|| EngineError::Validation("thread has no state".to_string()))?;
        agent_state(&snapshot)
    }
}

fn agent_state(snapshot: &StateSnapshot) -> Result<AgentState> {
    Ok(AgentState::from_value(&snapshot.values)?)
}

/// The state delta that begins a fresh user turn.
fn turn_input(text: &str) -> Result<Value> {
    Ok(json!({
        "messages": [Message::user(text)],
        "iteration_count": 0,
        "worker_iteration_count": 0,
        "task_complete": false,
        // Empty string resets the summary (a null would keep the old one).
        "task_summary": "",
        "error": null,
        "final_response": null,
        "current_worker": null,
        "next": nodes::SUPERVISOR,
        "pending_action": null,
        "awaiting_approval": false,
    }))
}

fn supervisor_node(supervisor: Arc<Supervisor>) -> NodeExecutor {
    Arc::new(move |state: Value| {
        let supervisor = supervisor.clone();
        Box::pin(async move {
            let state = AgentState::from_value(&state)
                .map_err(|e| GraphError::Execution(e.to_string()))?;
            let route = supervisor.route(&state).await;
            Ok(json!({
                "next": route.next,
                "final_response": route.final_response,
                "current_worker": route.current_worker,
                "iteration_count": null,
                "worker_iteration_count": 0,
                "task_complete": false,
            }))
        })
    })
}

fn worker_node(worker: Arc<Worker>) -> NodeExecutor {
    Arc::new(move |state: Value| {
        let worker = worker.clone();
        Box::pin(async move {
            let state = AgentState::from_value(&state)
                .map_err(|e| GraphError::Execution(e.to_string()))?;
            let step = worker.process(&state).await;

            // The worker keeps the floor while paused or mid-task.
            let current_worker = if step.awaiting_approval || !step.task_complete {
                Some(worker.name().to_string())
            } else {
                None
            };

            Ok(json!({
                "messages": step.messages,
                "pending_action": step.pending_action,
                "awaiting_approval": step.awaiting_approval,
                "current_worker": current_worker,
                "task_complete": step.task_complete,
                "task_summary": step.task_summary,
                "worker_iteration_count": null,
            }))
        })
    })
}

/// Translate raw executor events into semantic agent events.
fn translate_event(event: ExecutionEvent) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    match event {
        ExecutionEvent::NodeStart { node } => {
            if nodes::WORKERS.contains(&node.as_str()) {
                events.push(AgentEvent::WorkerStarted { worker: node });
            }
        }
        ExecutionEvent::NodeUpdate { node, update } => {
            if node == nodes::SUPERVISOR {
                if let Some(next) = update["next"].as_str() {
                    if next != END {
                        events.push(AgentEvent::Routing {
                            next: next.to_string(),
                        });
                    }
                }
            }
            if let Ok(messages) =
                serde_json::from_value::<Vec<Message>>(update["messages"].clone())
            {
                for message in messages {
                    if let Some(calls) = &message.tool_calls {
                        if !calls.is_empty() {
                            events.push(AgentEvent::ToolCall {
                                tools: calls
                                    .iter()
                                    .map(|call| ToolCallInfo {
                                        name: call.name.clone(),
                                        args: call.arguments.clone(),
                                    })
                                    .collect(),
                            });
                        }
                    }
                    if message.role == MessageRole::Tool {
                        events.push(AgentEvent::ToolResult {
                            result: message.content,
                        });
                    }
                }
            }
        }
        // The pause itself is surfaced from the committed state after the
        // run returns, so the action payload is the persisted one.
        ExecutionEvent::Interrupted { .. } => {}
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_supervisor_update_emits_routing() {
        let events = translate_event(ExecutionEvent::NodeUpdate {
            node: nodes::SUPERVISOR.to_string(),
            update: json!({"next": "code_worker"}),
        });
        assert_eq!(
            events,
            vec![AgentEvent::Routing {
                next: "code_worker".to_string()
            }]
        );
    }

    #[test]
    fn translate_end_routing_is_silent() {
        let events = translate_event(ExecutionEvent::NodeUpdate {
            node: nodes::SUPERVISOR.to_string(),
            update: json!({"next": END}),
        });
        assert!(events.is_empty());
    }

    #[test]
    fn translate_worker_update_emits_tool_events() {
        let update = json!({
            "messages": [
                {
                    "id": "a1",
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"id": "c1", "name": "list_directory", "arguments": {"path": "/tmp"}}
                    ]
                },
                {"id": "t1", "role": "tool", "content": "[]", "tool_call_id": "c1"}
            ]
        });
        let events = translate_event(ExecutionEvent::NodeUpdate {
            node: nodes::FILESYSTEM_WORKER.to_string(),
            update,
        });

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], AgentEvent::ToolCall { tools } if tools[0].name == "list_directory"));
        assert!(matches!(&events[1], AgentEvent::ToolResult { result } if result == "[]"));
    }

    #[test]
    fn translate_worker_start_emits_worker_started() {
        let events = translate_event(ExecutionEvent::NodeStart {
            node: nodes::SYSTEM_WORKER.to_string(),
        });
        assert_eq!(
            events,
            vec![AgentEvent::WorkerStarted {
                worker: nodes::SYSTEM_WORKER.to_string()
            }]
        );

        let events = translate_event(ExecutionEvent::NodeStart {
            node: nodes::SUPERVISOR.to_string(),
        });
        assert!(events.is_empty());
    }
}
