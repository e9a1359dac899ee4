//! Supervisor/worker agent engine with human-in-the-loop tool approval.
//!
//! # Overview
//!
//! This crate assembles the deskagent core: a supervisor routes each step
//! of a conversation to one of four capability-scoped workers (filesystem,
//! system/shell, researcher, code); workers execute safe tool calls inline
//! and pause the run for sensitive ones so a human can approve or deny the
//! action; every intermediate state is checkpointed so threads survive
//! restarts and resume exactly where they paused.
//!
//! ```rust,ignore
//! use deskagent_engine::{EngineConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::bootstrap(EngineConfig::from_env()).await?;
//! orchestrator
//!     .ask("thread-1", "List my Downloads folder", |event| {
//!         println!("{event:?}");
//!     })
//!     .await?;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod orchestrator;
pub mod state;
pub mod supervisor;
pub mod tools;
pub mod worker;
pub mod workers;

pub use agent::AgentGraph;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use events::{AgentEvent, ToolCallInfo};
pub use history::{ChatSession, HistoryStore, InMemoryHistoryStore, StoredMessage};
pub use orchestrator::Orchestrator;
pub use state::{AgentState, PendingAction};
pub use supervisor::Supervisor;
pub use tools::{path::PathPolicy, Sensitivity, Tool, ToolRegistry};
pub use worker::{Worker, WorkerStep};
