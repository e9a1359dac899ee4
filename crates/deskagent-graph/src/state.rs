//! Channel-based state with per-channel reducers.
//!
//! # Overview
//!
//! Thread state is a JSON object whose keys are **channels**. Nodes return
//! partial updates; a [`StateSchema`] merges each updated channel into the
//! previous state through that channel's [`Reducer`]:
//!
//! - [`OverwriteReducer`] — replace the value (the default)
//! - [`CounterReducer`] — a `null` update increments, a number replaces
//! - [`KeepLastReducer`] — a `null` update keeps the previous value
//! - [`MessageHistoryReducer`] — append with id-based replacement, used for
//!   the conversation transcript
//!
//! A key absent from an update leaves its channel untouched; an explicit
//! JSON `null` is passed to the reducer, which is how counters increment
//! without the node knowing the current count.

use crate::messages::{merge_messages, Message};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while merging state updates.
#[derive(Debug, Error)]
pub enum StateError {
    /// State or update was not a JSON object
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A reducer received an incompatible value
    #[error("Reducer error on channel '{channel}': {message}")]
    ReducerError { channel: String, message: String },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Merge semantics for a single channel.
pub trait Reducer: Send + Sync {
    /// Combine the current value (JSON `null` when unset) with an update.
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String>;

    /// Human-readable reducer name, for diagnostics.
    fn name(&self) -> &str;
}

/// Replace the current value with the update.
#[derive(Debug, Clone, Default)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> std::result::Result<Value, String> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Non-negative counter: `null` increments, a number replaces.
#[derive(Debug, Clone, Default)]
pub struct CounterReducer;

impl Reducer for CounterReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        match update {
            Value::Null => {
                let current = current.as_i64().unwrap_or(0);
                Ok(Value::from(current + 1))
            }
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(update.clone()),
            other => Err(format!("expected null or integer, got {other}")),
        }
    }

    fn name(&self) -> &str {
        "counter"
    }
}

/// Keep the previous value on `null`, otherwise replace.
#[derive(Debug, Clone, Default)]
pub struct KeepLastReducer;

impl Reducer for KeepLastReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        match update {
            Value::Null => Ok(current.clone()),
            other => Ok(other.clone()),
        }
    }

    fn name(&self) -> &str {
        "keep_last"
    }
}

/// Append messages with id-based replacement (see [`merge_messages`]).
#[derive(Debug, Clone, Default)]
pub struct MessageHistoryReducer;

impl Reducer for MessageHistoryReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        let current: Vec<Message> = match current {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| format!("invalid message history: {e}"))?,
        };
        let updates: Vec<Message> = match update {
            Value::Null => Vec::new(),
            Value::Array(_) => serde_json::from_value(update.clone())
                .map_err(|e| format!("invalid message update: {e}"))?,
            single => vec![serde_json::from_value(single.clone())
                .map_err(|e| format!("invalid message update: {e}"))?],
        };

        let merged = merge_messages(current, updates);
        serde_json::to_value(merged).map_err(|e| e.to_string())
    }

    fn name(&self) -> &str {
        "message_history"
    }
}

/// Maps channel names to reducers, with a default for unlisted channels.
pub struct StateSchema {
    channels: HashMap<String, Box<dyn Reducer>>,
    default_reducer: Box<dyn Reducer>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            default_reducer: Box::new(OverwriteReducer),
        }
    }

    /// Register a reducer for a channel.
    pub fn with_channel(mut self, name: impl Into<String>, reducer: Box<dyn Reducer>) -> Self {
        self.channels.insert(name.into(), reducer);
        self
    }

    /// Replace the default reducer applied to unlisted channels.
    pub fn with_default_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.default_reducer = reducer;
        self
    }

    /// Empty initial state.
    pub fn initial(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Merge a partial update into the state, channel by channel.
    ///
    /// `Value::Null` as the whole update is a no-op (a node that changes
    /// nothing). Both state and a non-null update must be JSON objects.
    pub fn apply(&self, state: &Value, update: &Value) -> Result<Value> {
        if update.is_null() {
            return Ok(state.clone());
        }

        let mut merged = match state {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(StateError::InvalidState(format!(
                    "state must be an object, got {other}"
                )))
            }
        };
        let update = update.as_object().ok_or_else(|| {
            StateError::InvalidState("update must be an object".to_string())
        })?;

        for (channel, value) in update {
            let reducer = self
                .channels
                .get(channel)
                .unwrap_or(&self.default_reducer);
            let current = merged.get(channel).cloned().unwrap_or(Value::Null);
            let next = reducer.reduce(&current, value).map_err(|message| {
                StateError::ReducerError {
                    channel: channel.clone(),
                    message,
                }
            })?;
            merged.insert(channel.clone(), next);
        }

        Ok(Value::Object(merged))
    }
}

impl Default for StateSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> StateSchema {
        StateSchema::new()
            .with_channel("messages", Box::new(MessageHistoryReducer))
            .with_channel("iteration_count", Box::new(CounterReducer))
            .with_channel("task_summary", Box::new(KeepLastReducer))
    }

    #[test]
    fn overwrite_is_the_default() {
        let state = schema()
            .apply(&json!({"next": "supervisor"}), &json!({"next": "code_worker"}))
            .unwrap();
        assert_eq!(state["next"], "code_worker");
    }

    #[test]
    fn absent_key_leaves_channel_untouched() {
        let state = schema()
            .apply(&json!({"next": "supervisor"}), &json!({"error": "boom"}))
            .unwrap();
        assert_eq!(state["next"], "supervisor");
        assert_eq!(state["error"], "boom");
    }

    #[test]
    fn counter_increments_on_null_and_replaces_on_value() {
        let schema = schema();
        let state = schema
            .apply(&json!({}), &json!({"iteration_count": null}))
            .unwrap();
        assert_eq!(state["iteration_count"], 1);

        let state = schema
            .apply(&state, &json!({"iteration_count": null}))
            .unwrap();
        assert_eq!(state["iteration_count"], 2);

        let state = schema
            .apply(&state, &json!({"iteration_count": 0}))
            .unwrap();
        assert_eq!(state["iteration_count"], 0);
    }

    #[test]
    fn counter_rejects_non_integers() {
        let err = schema()
            .apply(&json!({}), &json!({"iteration_count": "three"}))
            .unwrap_err();
        assert!(matches!(err, StateError::ReducerError { .. }));
    }

    #[test]
    fn keep_last_preserves_on_null() {
        let schema = schema();
        let state = schema
            .apply(&json!({}), &json!({"task_summary": "[worker] did things"}))
            .unwrap();
        let state = schema.apply(&state, &json!({"task_summary": null})).unwrap();
        assert_eq!(state["task_summary"], "[worker] did things");

        let state = schema
            .apply(&state, &json!({"task_summary": "[worker] new"}))
            .unwrap();
        assert_eq!(state["task_summary"], "[worker] new");
    }

    #[test]
    fn message_history_appends_and_replaces() {
        let schema = schema();
        let state = schema
            .apply(
                &json!({}),
                &json!({"messages": [{"id": "m1", "role": "user", "content": "hi"}]}),
            )
            .unwrap();
        let state = schema
            .apply(
                &state,
                &json!({"messages": [
                    {"id": "m2", "role": "assistant", "content": "hello"},
                    {"id": "m1", "role": "user", "content": "hi (edited)"}
                ]}),
            )
            .unwrap();

        let messages = state["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "hi (edited)");
        assert_eq!(messages[1]["content"], "hello");
    }

    #[test]
    fn null_update_is_a_no_op() {
        let before = json!({"next": "supervisor"});
        let after = schema().apply(&before, &Value::Null).unwrap();
        assert_eq!(before, after);
    }
}
