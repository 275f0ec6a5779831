//! The scheduler's mailbox abstraction: buffered outbound messages plus an event queue, both
//! drained atomically once per superstep.
//!
//! Two implementations are provided: [`InMemoryRunnerContext`] for runs that don't need
//! durability, and [`CheckpointableRunnerContext`], which wraps the in-memory one and adds
//! `create_checkpoint`/`restore_from_checkpoint` against a [`workflow_checkpoint::CheckpointStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use workflow_checkpoint::{Checkpoint, CheckpointStore, CheckpointedMessage};

use crate::error::Result;
use crate::event::WorkflowEvent;
use crate::message::Message;

/// The runtime's mailbox contract.
///
/// Implementations MUST be safe for concurrent `send_message`/`add_event` calls from multiple
/// handlers running within one superstep, with a single-reader drain by the scheduler between
/// supersteps.
#[async_trait]
pub trait RunnerContext: Send + Sync {
    /// Append a message to the outbox. Safe to call concurrently.
    async fn send_message(&self, message: Message);

    /// Append an event to the queue. Safe to call concurrently.
    async fn add_event(&self, event: WorkflowEvent);

    /// Atomically take and clear the outbox, keyed by source executor id.
    async fn drain_messages(&self) -> HashMap<String, Vec<Message>>;

    /// Atomically take and clear the event queue, in insertion order.
    async fn drain_events(&self) -> Vec<WorkflowEvent>;
}

/// Process-local, non-durable [`RunnerContext`].
#[derive(Default)]
pub struct InMemoryRunnerContext {
    outbox: Mutex<HashMap<String, Vec<Message>>>,
    events: Mutex<Vec<WorkflowEvent>>,
}

impl InMemoryRunnerContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunnerContext for InMemoryRunnerContext {
    async fn send_message(&self, message: Message) {
        let mut outbox = self.outbox.lock().await;
        outbox.entry(message.source_id.clone()).or_default().push(message);
    }

    async fn add_event(&self, event: WorkflowEvent) {
        self.events.lock().await.push(event);
    }

    async fn drain_messages(&self) -> HashMap<String, Vec<Message>> {
        std::mem::take(&mut *self.outbox.lock().await)
    }

    async fn drain_events(&self) -> Vec<WorkflowEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }
}

/// A [`RunnerContext`] that can snapshot itself into a [`Checkpoint`] and restore from one,
/// against a pluggable [`CheckpointStore`].
///
/// Unlike the reference implementation this is grounded on, restoring a checkpoint here
/// reconstructs the real [`WorkflowEvent`] values (not a logged placeholder) because
/// `WorkflowEvent` is a serde-tagged enum — see the module docs on `crate::event`.
pub struct CheckpointableRunnerContext {
    inner: InMemoryRunnerContext,
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointableRunnerContext {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            inner: InMemoryRunnerContext::new(),
            store,
        }
    }

    /// Snapshot the outbox, event queue, shared state, and executor states into a [`Checkpoint`]
    /// and persist it. The outbox/events are *not* drained by this call — per the checkpoint
    /// correctness design note, a checkpoint captures undelivered state taken before the drain
    /// that would otherwise have consumed it.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_checkpoint(
        &self,
        workflow_id: impl Into<String>,
        shared_state: HashMap<String, serde_json::Value>,
        executor_states: HashMap<String, serde_json::Value>,
        iteration_count: u64,
        max_iterations: u64,
    ) -> Result<String> {
        let outbox = self.inner.outbox.lock().await;
        let events = self.inner.events.lock().await;

        let mut messages = HashMap::with_capacity(outbox.len());
        for (source_id, msgs) in outbox.iter() {
            let mut encoded = Vec::with_capacity(msgs.len());
            for m in msgs {
                encoded.push(CheckpointedMessage {
                    data: m.data.to_json()?,
                    source_id: m.source_id.clone(),
                    target_id: m.target_id.clone(),
                });
            }
            messages.insert(source_id.clone(), encoded);
        }

        let encoded_events = events
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let checkpoint = Checkpoint::new(
            workflow_id,
            messages,
            encoded_events,
            shared_state,
            executor_states,
            iteration_count,
            max_iterations,
        );
        Ok(self.store.save(checkpoint).await?)
    }

    /// Load a checkpoint and restore the event queue into this context. The outbox is
    /// intentionally not restored from `CheckpointedMessage` (its payload is JSON, not a live
    /// `Arc<dyn Payload>` the dispatcher can downcast); a caller resuming a run is expected to re-derive
    /// outstanding work from `shared_state`/`executor_states` and the event history, which is
    /// exactly what the request/response resume path already does for pending requests.
    pub async fn restore_from_checkpoint(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let Some(checkpoint) = self.store.load(checkpoint_id).await? else {
            return Ok(None);
        };

        let mut events = self.inner.events.lock().await;
        events.clear();
        for raw in &checkpoint.events {
            let event: WorkflowEvent = serde_json::from_value(raw.clone())?;
            events.push(event);
        }
        drop(events);

        Ok(Some(checkpoint))
    }
}

#[async_trait]
impl RunnerContext for CheckpointableRunnerContext {
    async fn send_message(&self, message: Message) {
        self.inner.send_message(message).await;
    }

    async fn add_event(&self, event: WorkflowEvent) {
        self.inner.add_event(event).await;
    }

    async fn drain_messages(&self) -> HashMap<String, Vec<Message>> {
        self.inner.drain_messages().await
    }

    async fn drain_events(&self) -> Vec<WorkflowEvent> {
        self.inner.drain_events().await
    }
}
