//! Error types for graph validation, dispatch, and execution.
//!
//! # Error hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation(ValidationError)   - raised synchronously from WorkflowBuilder::build()
//! ├── Dispatch                      - no handler accepted a delivered message
//! ├── Convergence                   - superstep loop exceeded max_iterations
//! ├── Protocol(ProtocolError)       - unknown request_id on resume, or AlreadyRunning
//! ├── Checkpoint                    - wraps workflow_checkpoint::CheckpointError
//! └── Serialization                 - wraps serde_json::Error
//! ```
//!
//! `HandlerError` (a handler's own error) is deliberately not a variant here: per the
//! propagation policy a handler's error never escapes `Executor::execute` synchronously. It is
//! captured there and re-expressed as an `ExecutorFailed` event instead — see
//! [`crate::executor::Executor::execute`].

use thiserror::Error;

/// Convenience result type using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

/// Validation failures raised by [`crate::workflow::WorkflowBuilder::build`].
///
/// Each variant corresponds to one row of the validator's check table; see
/// [`crate::validator`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate edge ({source} -> {target}) in the same edge group")]
    EdgeDuplication { source: String, target: String },

    #[error("start executor '{0}' is not present in the graph")]
    MissingStartExecutor(String),

    #[error("executor '{0}' is not reachable from the start executor")]
    Unreachable(String),

    #[error("executor '{0}' has no incident edges")]
    Isolated(String),

    #[error("executor '{executor}' handler for input '{input_type}' has no output annotation")]
    HandlerOutputAnnotation { executor: String, input_type: String },

    #[error("no output type of '{source}' is compatible with any input type of '{target}'")]
    TypeCompatibility { source: String, target: String },

    #[error(
        "executors '{first}' and '{second}' both intercept request type '{request_type}'{scope}"
    )]
    InterceptorConflict {
        first: String,
        second: String,
        request_type: String,
        scope: String,
    },
}

/// Errors raised by protocol-level misuse: resuming an unknown request, or starting a second
/// concurrent run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("no pending request with id '{0}'")]
    UnknownRequestId(String),

    #[error("workflow is already running")]
    AlreadyRunning,
}

/// Crate-wide error type for graph construction, validation, and execution.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Raised synchronously by `build()`; no run starts.
    #[error("graph validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No handler on the target executor accepted a delivered message. Surfaced as a
    /// `WorkflowWarning` event, not a terminal failure — the message is dropped.
    #[error("executor '{executor_id}' has no handler accepting payload of type '{type_name}'")]
    Dispatch { executor_id: String, type_name: String },

    /// The superstep loop exceeded `max_iterations` without quiescing.
    #[error("workflow did not converge within {max_iterations} supersteps")]
    Convergence { max_iterations: u64 },

    /// Protocol misuse: unknown resume id, or a second concurrent run.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Wraps a checkpoint store failure.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] workflow_checkpoint::CheckpointError),

    /// Wraps a JSON (de)serialization failure outside of the checkpoint store (e.g. converting a
    /// handler's opaque payload to/from `serde_json::Value` at a checkpoint boundary).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub fn dispatch(executor_id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::Dispatch {
            executor_id: executor_id.into(),
            type_name: type_name.into(),
        }
    }

    pub fn convergence(max_iterations: u64) -> Self {
        Self::Convergence { max_iterations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_error_message_names_executor_and_type() {
        let err = GraphError::dispatch("exec-1", "String");
        assert_eq!(
            err.to_string(),
            "executor 'exec-1' has no handler accepting payload of type 'String'"
        );
    }

    #[test]
    fn validation_error_converts_via_from() {
        let err: GraphError = ValidationError::MissingStartExecutor("start".into()).into();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn checkpoint_error_converts_via_from() {
        let inner = workflow_checkpoint::CheckpointError::NotFound("cp-1".into());
        let err: GraphError = inner.into();
        assert!(matches!(err, GraphError::Checkpoint(_)));
    }
}
