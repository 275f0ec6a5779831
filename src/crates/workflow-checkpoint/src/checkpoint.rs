//! Checkpoint data model: a serializable snapshot of one workflow run.
//!
//! A [`Checkpoint`] captures everything a [`crate::traits::CheckpointStore`] needs in order for
//! a caller to resume a run exactly where it left off: the undelivered outbox, the queued events
//! not yet drained by the stream consumer, shared state, and per-executor private state. It is
//! deliberately payload-agnostic — this crate never deserializes a `Message` or `WorkflowEvent`
//! into a concrete Rust type, since it has no dependency on `workflow-core` and the two crates
//! could in principle be used separately. Typed (de)serialization of messages/events into and
//! out of `serde_json::Value` is the caller's (workflow-core's) responsibility.
//!
//! # Schema versioning
//!
//! `version` is bumped whenever a field is added or changed in an incompatible way. Forward
//! compatibility for *adding* optional fields is handled by `#[serde(default)]` so that
//! checkpoints written by an older binary still deserialize under a newer one; fields present in
//! storage but unknown to the current struct are simply ignored by `serde_json`, which already
//! tolerates unknown object keys by default.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version written by this crate.
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// A single queued outbound message, as captured at the moment of the snapshot.
///
/// Mirrors `workflow_core::message::Message` field-for-field, but keeps the payload as an opaque
/// JSON value so this crate has no dependency on the core crate's message type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointedMessage {
    pub data: serde_json::Value,
    pub source_id: String,
    #[serde(default)]
    pub target_id: Option<String>,
}

/// A complete, point-in-time snapshot of one workflow run.
///
/// See the module documentation for why message/event payloads are stored as opaque JSON rather
/// than as the core crate's typed `Message`/`WorkflowEvent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Unique id of this checkpoint (not the workflow run).
    pub checkpoint_id: String,
    /// Id of the workflow run this checkpoint belongs to.
    pub workflow_id: String,
    /// When the checkpoint was taken.
    pub timestamp: DateTime<Utc>,
    /// Undelivered outbox contents, keyed by source executor id, snapshotted *before* the drain
    /// that would otherwise have consumed them (see spec design notes on checkpoint correctness).
    pub messages: HashMap<String, Vec<CheckpointedMessage>>,
    /// Events queued but not yet drained by the event-stream consumer, as opaque JSON.
    pub events: Vec<serde_json::Value>,
    /// Shared-state key/value snapshot.
    pub shared_state: HashMap<String, serde_json::Value>,
    /// Opaque per-executor state, populated by executors that implement
    /// `serialize_state`/`restore_state` hooks.
    pub executor_states: HashMap<String, serde_json::Value>,
    /// Superstep index at the time of the snapshot.
    pub iteration_count: u64,
    /// The run's configured iteration cap, carried along so a restored run enforces the same
    /// limit even if the process that resumes it used a different default.
    pub max_iterations: u64,
    /// Free-form metadata (e.g. who triggered the checkpoint, a human label).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Schema version; see [`CHECKPOINT_SCHEMA_VERSION`].
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    CHECKPOINT_SCHEMA_VERSION
}

impl Checkpoint {
    /// Build a new checkpoint with a freshly generated id and the current timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workflow_id: impl Into<String>,
        messages: HashMap<String, Vec<CheckpointedMessage>>,
        events: Vec<serde_json::Value>,
        shared_state: HashMap<String, serde_json::Value>,
        executor_states: HashMap<String, serde_json::Value>,
        iteration_count: u64,
        max_iterations: u64,
    ) -> Self {
        Self {
            checkpoint_id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            timestamp: Utc::now(),
            messages,
            events,
            shared_state,
            executor_states,
            iteration_count,
            max_iterations,
            metadata: HashMap::new(),
            version: CHECKPOINT_SCHEMA_VERSION,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checkpoint_gets_a_fresh_id_and_default_version() {
        let cp = Checkpoint::new(
            "wf-1",
            HashMap::new(),
            Vec::new(),
            HashMap::new(),
            HashMap::new(),
            0,
            100,
        );
        assert_eq!(cp.version, CHECKPOINT_SCHEMA_VERSION);
        assert!(!cp.checkpoint_id.is_empty());
        assert_eq!(cp.workflow_id, "wf-1");
    }

    #[test]
    fn round_trips_through_json_with_unknown_fields_tolerated() {
        let cp = Checkpoint::new(
            "wf-2",
            HashMap::new(),
            Vec::new(),
            HashMap::new(),
            HashMap::new(),
            3,
            50,
        )
        .with_metadata("label", serde_json::json!("manual"));

        let mut value = serde_json::to_value(&cp).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("future_field".to_string(), serde_json::json!(true));

        let restored: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(restored, cp);
    }

    #[test]
    fn missing_required_field_fails_to_deserialize() {
        let mut value = serde_json::to_value(Checkpoint::new(
            "wf-3",
            HashMap::new(),
            Vec::new(),
            HashMap::new(),
            HashMap::new(),
            0,
            10,
        ))
        .unwrap();
        value.as_object_mut().unwrap().remove("workflow_id");

        let result: Result<Checkpoint, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }
}
