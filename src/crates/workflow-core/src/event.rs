//! Events emitted to a run's event stream.
//!
//! `WorkflowEvent` is the canonical, typed audit trail callers program against — it is a superset
//! of, not a replacement for, the `tracing` diagnostics emitted alongside it (see
//! `crate::scheduler`). It derives `Serialize`/`Deserialize` with an internal `kind` tag so the
//! event queue round-trips losslessly through a checkpoint: earlier revisions of this kind of
//! runtime serialized events as untyped `{type, data}` placeholders that could not be
//! reconstructed on restore, which this type deliberately avoids.

use serde::{Deserialize, Serialize};

/// The terminal or in-flight status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Started,
    InProgress,
    WaitingForInput,
    Completed,
    Failed,
    Cancelled,
}

/// Structured detail for a failed executor or a failed workflow, carrying enough context to
/// populate `WorkflowFailed`/`ExecutorFailed` without re-parsing a message string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Short machine-readable kind, e.g. "ConvergenceError" or the handler error's type name.
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<String>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ErrorDetails {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            backtrace: None,
            executor_id: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_executor_id(mut self, executor_id: impl Into<String>) -> Self {
        self.executor_id = Some(executor_id.into());
        self
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }
}

/// A single event in a run's stream.
///
/// Payload fields that would otherwise hold an arbitrary handler-defined type are stored as
/// `serde_json::Value`, since `WorkflowEvent` must serialize for both the public event stream and
/// checkpointing; a handler's payload is converted to JSON at the point it is wrapped into an
/// event (see `crate::scheduler::Scheduler::emit_event`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkflowEvent {
    WorkflowStarted {
        run_id: String,
        start_executor_id: String,
    },
    WorkflowStatusChanged {
        status: WorkflowStatus,
    },
    WorkflowCompleted {
        payload: Option<serde_json::Value>,
        #[serde(default)]
        is_error: bool,
    },
    WorkflowFailed {
        error: ErrorDetails,
    },
    WorkflowWarning {
        text: String,
    },
    ExecutorInvoked {
        executor_id: String,
        input: serde_json::Value,
    },
    ExecutorCompleted {
        executor_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
    },
    ExecutorFailed {
        executor_id: String,
        error: ErrorDetails,
    },
    RequestInfoEvent {
        request_id: String,
        source_executor_id: String,
        request_type: String,
        payload: serde_json::Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_with_tag() {
        let event = WorkflowEvent::ExecutorInvoked {
            executor_id: "a".into(),
            input: serde_json::json!("hi"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "ExecutorInvoked");
        let restored: WorkflowEvent = serde_json::from_value(value).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn error_details_builder_sets_optional_fields() {
        let details = ErrorDetails::new("ConvergenceError", "did not converge")
            .with_executor_id("a")
            .with_backtrace("...");
        assert_eq!(details.executor_id.as_deref(), Some("a"));
        assert!(details.backtrace.is_some());
    }
}
