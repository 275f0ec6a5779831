//! The routing envelope that carries a payload between executors.
//!
//! A [`Message`] is opaque cargo plus routing metadata: who sent it, and — optionally — exactly
//! who it must go to. Handlers never see the envelope directly; they see the downcast payload.
//! The envelope exists for the scheduler and edge runners, which route by `source_id`/`target_id`
//! without caring what's inside.
//!
//! Payloads are held behind [`Payload`] rather than bare `dyn Any`: dispatch needs runtime
//! downcasting (`Executor::can_handle`/`execute`), but a checkpoint also needs to serialize
//! whatever sits in the outbox at snapshot time (per the spec's "all payloads must be
//! serializable by the configured codec" contract), and `dyn Any` alone can't give us that. Any
//! `T: Send + Sync + Serialize + 'static` gets a blanket [`Payload`] impl for free.

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;

/// A type-erased message payload that can both be downcast (for dispatch) and serialized to JSON
/// (for checkpointing).
pub trait Payload: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T> Payload for T
where
    T: Any + Send + Sync + Serialize,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// The aggregated payload a [`crate::edge_runner::FanInEdgeRunner`] delivers once every source has
/// contributed: each source's buffered payloads in declared-source order, each source's own
/// arrival order preserved within that.
///
/// This has its own `Payload` impl rather than relying on the blanket one, since `Arc<dyn
/// Payload>` itself does not implement `Serialize` — serialization here goes through each
/// element's own `to_json`.
pub type AggregatedPayload = Vec<Arc<dyn Payload>>;

impl Payload for AggregatedPayload {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        let values = self
            .iter()
            .map(|p| p.to_json())
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(serde_json::Value::Array(values))
    }
}

/// A payload plus routing metadata, as it sits in a [`crate::runner_context::RunnerContext`]
/// outbox.
#[derive(Clone)]
pub struct Message {
    pub data: Arc<dyn Payload>,
    /// Id of the executor that sent this message.
    pub source_id: String,
    /// If set, forces delivery to exactly this neighbor, bypassing any fan-out selection
    /// function. A [`crate::edge_runner::EdgeRunner`] that can't reach this target drops the
    /// message rather than rerouting it.
    pub target_id: Option<String>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("source_id", &self.source_id)
            .field("target_id", &self.target_id)
            .finish_non_exhaustive()
    }
}

impl Message {
    /// Wrap `data` as a message from `source_id`, with no forced target.
    pub fn new<T: Payload>(data: T, source_id: impl Into<String>) -> Self {
        Self {
            data: Arc::new(data),
            source_id: source_id.into(),
            target_id: None,
        }
    }

    /// Wrap `data`, forcing delivery to `target_id`.
    pub fn targeted<T: Payload>(
        data: T,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            data: Arc::new(data),
            source_id: source_id.into(),
            target_id: Some(target_id.into()),
        }
    }

    /// Wrap an already type-erased payload (used internally by fan-in aggregation).
    pub fn from_erased(
        data: Arc<dyn Payload>,
        source_id: impl Into<String>,
        target_id: Option<String>,
    ) -> Self {
        Self {
            data,
            source_id: source_id.into(),
            target_id,
        }
    }

    /// Attempt to downcast the payload to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_to_the_wrapped_type() {
        let msg = Message::new(42i32, "source");
        assert_eq!(msg.downcast_ref::<i32>(), Some(&42));
        assert_eq!(msg.downcast_ref::<String>(), None);
    }

    #[test]
    fn targeted_message_carries_forced_target() {
        let msg = Message::targeted("hi".to_string(), "a", "b");
        assert_eq!(msg.target_id.as_deref(), Some("b"));
    }

    #[test]
    fn payload_serializes_to_json() {
        let msg = Message::new("hi".to_string(), "a");
        assert_eq!(msg.data.to_json().unwrap(), serde_json::json!("hi"));
    }

    #[test]
    fn aggregated_payload_serializes_as_array() {
        let agg: AggregatedPayload = vec![
            Arc::new("x".to_string()) as Arc<dyn Payload>,
            Arc::new("y".to_string()) as Arc<dyn Payload>,
        ];
        assert_eq!(agg.to_json().unwrap(), serde_json::json!(["x", "y"]));
    }
}
