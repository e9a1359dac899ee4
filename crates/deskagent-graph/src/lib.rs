//! Interruptible state-graph runtime.
//!
//! A [`Graph`] is a set of named nodes connected by direct and conditional
//! edges. Compiling it against a [`StateSchema`] yields a [`CompiledGraph`]
//! that executes one node at a time, merges each node's partial update into
//! the thread state through per-channel reducers, checkpoints after every
//! step, and can pause before designated nodes so a human decision can be
//! applied to state before the run resumes.
//!
//! State travels as a JSON object; reducers give individual channels their
//! merge semantics (overwrite, counter increment, message-history append).

pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod messages;
pub mod state;

pub use error::{GraphError, Result};
pub use events::ExecutionEvent;
pub use executor::{CompiledGraph, StateSnapshot};
pub use graph::{Edge, EdgeRouter, Graph, NodeExecutor, NodeFuture, NodeId, NodeSpec, END, START};
pub use messages::{merge_messages, Message, MessageRole, ToolCall};
pub use state::{
    CounterReducer, KeepLastReducer, MessageHistoryReducer, OverwriteReducer, Reducer, StateSchema,
};
