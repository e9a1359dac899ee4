//! Events emitted by the executor while a run progresses.

use crate::graph::NodeId;
use serde_json::Value;

/// Raw execution event stream.
///
/// One `NodeStart`/`NodeUpdate` pair per executed node, in order. A run that
/// pauses at an interrupt target emits `Interrupted` as its final event.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A node is about to execute
    NodeStart { node: NodeId },

    /// A node finished; `update` is its partial state update (pre-merge)
    NodeUpdate { node: NodeId, update: Value },

    /// The run paused before an interrupt target and checkpointed
    Interrupted { node: NodeId },
}
