//! Graph structure: named nodes and the edges between them.
//!
//! Nodes are async executors taking the full state and returning a partial
//! update. Edges are either direct or conditional; a conditional edge owns a
//! router function evaluated against the post-update state, plus a branch
//! map used for validation. The reserved [`START`] and [`END`] sentinels
//! mark entry and termination.

use crate::error::{GraphError, Result};
use crate::state::StateSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Node identifier, unique within a graph.
pub type NodeId = String;

/// Reserved entry sentinel.
pub const START: &str = "__start__";

/// Reserved termination sentinel.
pub const END: &str = "__end__";

/// Future returned by a node executor.
pub type NodeFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Async node body: full state in, partial update out.
pub type NodeExecutor = Arc<dyn Fn(Value) -> NodeFuture + Send + Sync>;

/// Router of a conditional edge: post-update state in, branch key out.
pub type EdgeRouter = Arc<dyn Fn(&Value) -> NodeId + Send + Sync>;

/// A node definition.
#[derive(Clone)]
pub struct NodeSpec {
    /// Node name (matches its id in the graph)
    pub name: NodeId,

    /// Async executor invoked when the node runs
    pub executor: NodeExecutor,
}

impl NodeSpec {
    pub fn new(name: impl Into<NodeId>, executor: NodeExecutor) -> Self {
        Self {
            name: name.into(),
            executor,
        }
    }
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("executor", &"<function>")
            .finish()
    }
}

/// An outgoing edge.
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition to a node (or [`END`])
    Direct(NodeId),

    /// Dynamic transition decided by a router over the current state
    Conditional {
        /// Returns a branch key; resolved through `branches`, falling back
        /// to the key itself when unmapped
        router: EdgeRouter,

        /// Possible targets, for validation
        branches: HashMap<String, NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(target) => f.debug_tuple("Direct").field(target).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// A graph under construction.
#[derive(Debug, Default)]
pub struct Graph {
    /// Nodes by id
    pub nodes: HashMap<NodeId, NodeSpec>,

    /// Outgoing edge per source node (at most one)
    pub edges: HashMap<NodeId, Edge>,

    /// Node executed first on a fresh run
    pub entry: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Replaces any existing node with the same id.
    pub fn add_node(&mut self, id: impl Into<NodeId>, executor: NodeExecutor) -> &mut Self {
        let id = id.into();
        self.nodes.insert(id.clone(), NodeSpec::new(id, executor));
        self
    }

    /// Add a direct edge. `from` may be [`START`] to set the entry point.
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        let from = from.into();
        let to = to.into();
        if from == START {
            self.entry = Some(to);
        } else {
            self.edges.insert(from, Edge::Direct(to));
        }
        self
    }

    /// Add a conditional edge with a router and its possible branches.
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<NodeId>,
        router: EdgeRouter,
        branches: HashMap<String, NodeId>,
    ) -> &mut Self {
        self.edges
            .insert(from.into(), Edge::Conditional { router, branches });
        self
    }

    /// Check structural soundness: entry set and existing, every edge
    /// endpoint resolvable, every non-terminal node has an outgoing edge.
    pub fn validate(&self) -> Result<()> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| GraphError::InvalidGraph("no entry point set".to_string()))?;
        if !self.nodes.contains_key(entry) {
            return Err(GraphError::InvalidGraph(format!(
                "entry point '{entry}' does not exist"
            )));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::InvalidGraph(format!(
                    "edge source '{from}' does not exist"
                )));
            }
            match edge {
                Edge::Direct(to) => {
                    if to != END && !self.nodes.contains_key(to) {
                        return Err(GraphError::InvalidGraph(format!(
                            "edge target '{to}' does not exist"
                        )));
                    }
                }
                Edge::Conditional { branches, .. } => {
                    for to in branches.values() {
                        if to != END && !self.nodes.contains_key(to) {
                            return Err(GraphError::InvalidGraph(format!(
                                "branch target '{to}' does not exist"
                            )));
                        }
                    }
                }
            }
        }

        for id in self.nodes.keys() {
            if !self.edges.contains_key(id) {
                return Err(GraphError::InvalidGraph(format!(
                    "node '{id}' has no outgoing edge"
                )));
            }
        }

        Ok(())
    }

    /// Validate and compile into an executable graph.
    pub fn compile(self, schema: StateSchema) -> Result<crate::executor::CompiledGraph> {
        self.validate()?;
        Ok(crate::executor::CompiledGraph::new(self, schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> NodeExecutor {
        Arc::new(|_state| Box::pin(async { Ok(json!({})) }))
    }

    #[test]
    fn start_edge_sets_entry() {
        let mut graph = Graph::new();
        graph.add_node("a", noop());
        graph.add_edge(START, "a");
        graph.add_edge("a", END);

        assert_eq!(graph.entry.as_deref(), Some("a"));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn validate_rejects_dangling_targets() {
        let mut graph = Graph::new();
        graph.add_node("a", noop());
        graph.add_edge(START, "a");
        graph.add_edge("a", "missing");

        assert!(graph.validate().is_err());
    }

    #[test]
    fn validate_rejects_nodes_without_out_edges() {
        let mut graph = Graph::new();
        graph.add_node("a", noop());
        graph.add_edge(START, "a");

        assert!(graph.validate().is_err());
    }

    #[test]
    fn validate_checks_conditional_branches() {
        let mut graph = Graph::new();
        graph.add_node("a", noop());
        graph.add_edge(START, "a");
        graph.add_conditional_edge(
            "a",
            Arc::new(|_| "gone".to_string()),
            HashMap::from([("gone".to_string(), "gone".to_string())]),
        );

        assert!(graph.validate().is_err());
    }
}
