//! Compiled graph execution.
//!
//! # Overview
//!
//! [`CompiledGraph`] runs one node at a time. Each step:
//!
//! 1. if the next node is an interrupt target (and the run is not resuming),
//!    checkpoint with that node recorded as pending and stop;
//! 2. execute the node, merge its partial update through the state schema;
//! 3. evaluate the node's outgoing edge against the merged state;
//! 4. checkpoint the merged state together with the node to run next, and
//!    persist the raw update as pending writes for that checkpoint.
//!
//! Because the node-to-run-next is part of every checkpoint, a thread can be
//! re-entered after a crash or an approval pause: the next `stream` call
//! picks up at the recorded node, executing it even when it is an interrupt
//! target (that is what resuming means).
//!
//! A hard recursion limit (default 50 steps per `stream` call) guards
//! against mis-configured edges; domain-level iteration ceilings are the
//! responsibility of the nodes themselves.

use crate::error::{GraphError, Result};
use crate::events::ExecutionEvent;
use crate::graph::{Edge, Graph, NodeId, END};
use crate::state::StateSchema;
use deskagent_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default hard ceiling on steps within one `stream` call.
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

/// A thread's current state as seen through its latest checkpoint.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Merged channel values
    pub values: Value,

    /// Nodes the executor will run next; empty when the thread is at rest
    pub next: Vec<NodeId>,
}

impl StateSnapshot {
    /// Whether the thread is paused before the given node.
    pub fn is_paused_at(&self, node: &str) -> bool {
        self.next.iter().any(|n| n == node)
    }
}

/// An executable graph bound to a state schema.
pub struct CompiledGraph {
    graph: Graph,
    schema: StateSchema,
    checkpointer: Option<Arc<dyn CheckpointSaver>>,
    interrupt_before: HashSet<NodeId>,
    recursion_limit: usize,
}

impl CompiledGraph {
    pub(crate) fn new(graph: Graph, schema: StateSchema) -> Self {
        Self {
            graph,
            schema,
            checkpointer: None,
            interrupt_before: HashSet::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Attach a checkpoint saver; without one, runs are ephemeral.
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpointer = Some(saver);
        self
    }

    /// Pause and checkpoint before any of these nodes executes.
    pub fn with_interrupt_before(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.interrupt_before = nodes.into_iter().collect();
        self
    }

    /// Override the hard step ceiling.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Read a thread's latest snapshot.
    pub async fn get_state(&self, config: &CheckpointConfig) -> Result<Option<StateSnapshot>> {
        let Some(saver) = &self.checkpointer else {
            return Ok(None);
        };
        let Some(tuple) = saver.get_tuple(config).await? else {
            return Ok(None);
        };
        Ok(Some(StateSnapshot {
            values: Value::Object(tuple.checkpoint.channel_values.into_iter().collect()),
            next: tuple.checkpoint.next_nodes,
        }))
    }

    /// Apply an external update to a thread's state and checkpoint it.
    ///
    /// The pending-node position is preserved, so updating a paused thread
    /// (an approval decision) leaves it paused until the next `stream` call
    /// resumes it.
    pub async fn update_state(&self, config: &CheckpointConfig, update: Value) -> Result<()> {
        let saver = self.checkpointer.as_ref().ok_or_else(|| {
            GraphError::Execution("update_state requires a checkpointer".to_string())
        })?;

        let (values, next_nodes, step, cursor) = match saver.get_tuple(config).await? {
            Some(tuple) => (
                Value::Object(tuple.checkpoint.channel_values.into_iter().collect()),
                tuple.checkpoint.next_nodes,
                tuple.metadata.step.unwrap_or(0) + 1,
                tuple.config,
            ),
            None => (self.schema.initial(), Vec::new(), 0, config.clone()),
        };

        let values = self.schema.apply(&values, &update)?;
        let checkpoint = Checkpoint::new(to_channel_values(&values), next_nodes);
        let metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Update)
            .with_step(step);
        saver.put(&cursor, checkpoint, metadata).await?;
        Ok(())
    }

    /// Run the graph for one thread until END or an interrupt.
    ///
    /// * `input` — partial state update applied before the first step; pass
    ///   `None` to resume a paused or crashed thread as-is
    /// * `config` — identifies the thread
    /// * `tx` — receives [`ExecutionEvent`]s as the run progresses
    ///
    /// Returns the merged state at the point the run stopped.
    #[tracing::instrument(skip(self, input, tx), fields(thread_id = config.thread_id.as_deref().unwrap_or("-")))]
    pub async fn stream(
        &self,
        input: Option<Value>,
        config: &CheckpointConfig,
        tx: mpsc::Sender<ExecutionEvent>,
    ) -> Result<Value> {
        let loaded = match &self.checkpointer {
            Some(saver) => saver.get_tuple(config).await?,
            None => None,
        };

        let (mut values, pending, mut step, mut cursor) = match loaded {
            Some(tuple) => (
                Value::Object(tuple.checkpoint.channel_values.into_iter().collect()),
                tuple.checkpoint.next_nodes,
                tuple.metadata.step.unwrap_or(0) + 1,
                tuple.config,
            ),
            None => (self.schema.initial(), Vec::new(), 0, config.clone()),
        };

        if let Some(update) = input {
            values = self.schema.apply(&values, &update)?;
            if let Some(saver) = &self.checkpointer {
                let checkpoint = Checkpoint::new(
                    to_channel_values(&values),
                    pending.clone(),
                );
                let metadata = CheckpointMetadata::new()
                    .with_source(CheckpointSource::Input)
                    .with_step(step);
                cursor = saver.put(&cursor, checkpoint, metadata).await?;
                step += 1;
            }
        }

        // A non-empty pending list means we re-enter where the previous run
        // stopped; the first node then runs even if it is an interrupt target.
        let mut resuming = !pending.is_empty();
        let mut current = match pending.into_iter().next() {
            Some(node) => node,
            None => self
                .graph
                .entry
                .clone()
                .ok_or_else(|| GraphError::InvalidGraph("no entry point set".to_string()))?,
        };

        let mut steps_taken = 0usize;
        loop {
            if steps_taken >= self.recursion_limit {
                return Err(GraphError::RecursionLimit(self.recursion_limit));
            }

            if !resuming && self.interrupt_before.contains(&current) {
                if let Some(saver) = &self.checkpointer {
                    let checkpoint =
                        Checkpoint::new(to_channel_values(&values), vec![current.clone()]);
                    let metadata = CheckpointMetadata::new()
                        .with_source(CheckpointSource::Loop)
                        .with_step(step);
                    saver.put(&cursor, checkpoint, metadata).await?;
                }
                tracing::debug!(node = %current, "Run interrupted before node");
                let _ = tx.send(ExecutionEvent::Interrupted { node: current }).await;
                return Ok(values);
            }
            resuming = false;

            let node = self
                .graph
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::UnknownNode(current.clone()))?;

            let _ = tx
                .send(ExecutionEvent::NodeStart {
                    node: current.clone(),
                })
                .await;
            tracing::debug!(node = %current, step, "Executing node");

            let update = (node.executor)(values.clone()).await?;
            values = self.schema.apply(&values, &update)?;

            let next = self.next_node(&current, &values)?;
            let next_nodes = if next == END {
                Vec::new()
            } else {
                vec![next.clone()]
            };

            if let Some(saver) = &self.checkpointer {
                let checkpoint = Checkpoint::new(to_channel_values(&values), next_nodes);
                let metadata = CheckpointMetadata::new()
                    .with_source(CheckpointSource::Loop)
                    .with_step(step);
                cursor = saver.put(&cursor, checkpoint, metadata).await?;

                if let Some(entries) = update.as_object() {
                    if !entries.is_empty() {
                        let writes: Vec<(String, Value)> = entries
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect();
                        saver
                            .put_writes(&cursor, writes, format!("{current}:{step}"))
                            .await?;
                    }
                }
            }

            let _ = tx
                .send(ExecutionEvent::NodeUpdate {
                    node: current.clone(),
                    update,
                })
                .await;

            step += 1;
            steps_taken += 1;

            if next == END {
                tracing::debug!("Run reached END");
                return Ok(values);
            }
            current = next;
        }
    }

    fn next_node(&self, current: &NodeId, values: &Value) -> Result<NodeId> {
        match self.graph.edges.get(current) {
            Some(Edge::Direct(to)) => Ok(to.clone()),
            Some(Edge::Conditional { router, branches }) => {
                let key = router(values);
                Ok(branches.get(&key).cloned().unwrap_or(key))
            }
            None => Err(GraphError::Execution(format!(
                "node '{current}' has no outgoing edge"
            ))),
        }
    }
}

fn to_channel_values(values: &Value) -> HashMap<String, Value> {
    match values {
        Value::Object(map) => map.clone().into_iter().collect(),
        _ => HashMap::new(),
    }
}
