//! Per-group delivery policy.
//!
//! Each [`crate::edge::EdgeGroup`] gets one [`EdgeRunner`], built by [`create_edge_runner`]. The
//! runner owns whatever state its group needs beyond the edges themselves — currently only
//! [`FanInEdgeRunner`], which buffers arrivals per source until every source has contributed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::edge::EdgeGroup;
use crate::executor::{Executor, ExecutorContext};
use crate::message::{AggregatedPayload, Message, Payload};
use crate::runner_context::RunnerContext;
use crate::shared_state::SharedState;

/// Delivery policy for one edge group: given an inbound message, decide whether/where to deliver
/// it and, if so, invoke the target executor(s).
///
/// Each implementation builds its own per-target [`ExecutorContext`] (`executor_id` set to the
/// *target's* id, not the sending executor's) rather than receiving one from the caller. A
/// shared context would misattribute every message a target sends onward during its own handler
/// invocation back to whichever executor happened to deliver to it, and a fan-out group delivers
/// to several distinct targets from one call, so no single context could be correct for all of
/// them anyway.
#[async_trait]
pub trait EdgeRunner: Send + Sync {
    /// Attempt to deliver `message`. Returns whether it was accepted by this group (buffered
    /// counts as accepted for fan-in — see the module docs on `FanInEdgeRunner`).
    async fn deliver(
        &self,
        message: Message,
        executors: &HashMap<String, Executor>,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> bool;

    /// Serialize any buffered-but-undelivered state (fan-in buffers) for a checkpoint. Groups
    /// with no such state return `None`.
    async fn serialize_state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Restore buffered state from a checkpoint. A no-op for groups with no such state.
    async fn restore_state(&self, _state: serde_json::Value) {}
}

/// *Single-edge runner.* If the message has an explicit `target_id` that mismatches the edge's
/// target, it is not delivered by this runner. Otherwise, if the target can handle the payload
/// and the predicate (if any) passes, the target is invoked.
pub struct SingleEdgeRunner {
    group: crate::edge::SingleEdgeGroup,
}

impl SingleEdgeRunner {
    pub fn new(group: crate::edge::SingleEdgeGroup) -> Self {
        Self { group }
    }
}

#[async_trait]
impl EdgeRunner for SingleEdgeRunner {
    async fn deliver(
        &self,
        message: Message,
        executors: &HashMap<String, Executor>,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> bool {
        let edge = &self.group.edge;
        if let Some(forced) = &message.target_id {
            if forced != &edge.target_id {
                return false;
            }
        }
        if !edge.should_route(message.data.as_ref()) {
            return false;
        }
        let Some(target) = executors.get(&edge.target_id) else {
            return false;
        };
        if !target.can_handle(message.data.as_any()) {
            return false;
        }
        let ctx = ExecutorContext {
            executor_id: &edge.target_id,
            runner_context,
            shared_state,
        };
        target.execute(message.data.clone(), &ctx).await;
        true
    }
}

/// *FanOut runner.* Applies the selection function (or broadcasts, if none) to the group's
/// declared targets, then delivers concurrently to every selected target whose type guard passes.
pub struct FanOutEdgeRunner {
    group: crate::edge::FanOutEdgeGroup,
}

impl FanOutEdgeRunner {
    pub fn new(group: crate::edge::FanOutEdgeGroup) -> Self {
        Self { group }
    }

    /// Resolve the selected subset and validate it against the group's declared targets.
    fn select_targets(&self, message: &Message) -> Vec<String> {
        let selected = match &self.group.selection {
            Some(select) => select(message.data.as_ref(), &self.group.target_ids),
            None => self.group.target_ids.clone(),
        };
        // Selection must be a subset of declared targets; anything else is a fatal configuration
        // error the spec assigns to validation, but a runtime selection function can still
        // misbehave, so this runner filters defensively rather than panicking mid-superstep.
        selected
            .into_iter()
            .filter(|id| self.group.target_ids.contains(id))
            .collect()
    }
}

#[async_trait]
impl EdgeRunner for FanOutEdgeRunner {
    async fn deliver(
        &self,
        message: Message,
        executors: &HashMap<String, Executor>,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> bool {
        let mut selected = self.select_targets(&message);
        if let Some(forced) = &message.target_id {
            selected.retain(|id| id == forced);
        }

        let contexts: Vec<(&Executor, ExecutorContext<'_>)> = selected
            .into_iter()
            .filter_map(|target_id| {
                let target = executors.get(&target_id)?;
                if !target.can_handle(message.data.as_any()) {
                    return None;
                }
                Some((
                    target,
                    ExecutorContext {
                        executor_id: target.id(),
                        runner_context,
                        shared_state,
                    },
                ))
            })
            .collect();

        let deliveries = contexts.iter().map(|(target, ctx)| target.execute(message.data.clone(), ctx));
        let results = futures::future::join_all(deliveries).await;
        !results.is_empty()
    }
}

/// *FanIn runner.* Appends the message to the per-source buffer. Once every declared source has
/// contributed at least one message, atomically drains the buffer — in declared-source order,
/// each source's own arrival order preserved — and delivers the aggregated list as one payload to
/// the sole target, then resets.
pub struct FanInEdgeRunner {
    group: crate::edge::FanInEdgeGroup,
    buffer: Mutex<HashMap<String, Vec<Arc<dyn Payload>>>>,
}

impl FanInEdgeRunner {
    pub fn new(group: crate::edge::FanInEdgeGroup) -> Self {
        Self {
            group,
            buffer: Mutex::new(HashMap::new()),
        }
    }

    fn is_ready(&self, buffer: &HashMap<String, Vec<Arc<dyn Payload>>>) -> bool {
        self.group.source_ids.iter().all(|id| buffer.contains_key(id))
    }
}

#[async_trait]
impl EdgeRunner for FanInEdgeRunner {
    async fn deliver(
        &self,
        message: Message,
        executors: &HashMap<String, Executor>,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> bool {
        if !self.group.source_ids.contains(&message.source_id) {
            return false;
        }

        let mut buffer = self.buffer.lock().await;
        buffer.entry(message.source_id.clone()).or_default().push(message.data);

        if !self.is_ready(&buffer) {
            return true;
        }

        let aggregated: AggregatedPayload = self
            .group
            .source_ids
            .iter()
            .flat_map(|id| buffer.remove(id).unwrap_or_default())
            .collect();
        drop(buffer);

        let Some(target) = executors.get(&self.group.target_id) else {
            return false;
        };
        let payload: Arc<dyn Payload> = Arc::new(aggregated);
        if !target.can_handle(payload.as_any()) {
            return false;
        }
        let ctx = ExecutorContext {
            executor_id: &self.group.target_id,
            runner_context,
            shared_state,
        };
        target.execute(payload, &ctx).await;
        true
    }

    async fn serialize_state(&self) -> Option<serde_json::Value> {
        let buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return None;
        }
        let mut encoded = serde_json::Map::new();
        for (source_id, payloads) in buffer.iter() {
            let values = payloads
                .iter()
                .filter_map(|p| p.to_json().ok())
                .collect::<Vec<_>>();
            encoded.insert(source_id.clone(), serde_json::Value::Array(values));
        }
        Some(serde_json::Value::Object(encoded))
    }
}

/// *SwitchCase runner.* A fan-out runner whose selection function iterates declared cases in
/// order; the first matching predicate wins, falling back to the default. A predicate that
/// panics would take the whole superstep down, so predicates are expected to be pure and
/// non-panicking — this runner does not catch unwinds.
pub struct SwitchCaseEdgeRunner {
    inner: FanOutEdgeRunner,
}

impl SwitchCaseEdgeRunner {
    pub fn new(group: crate::edge::SwitchCaseEdgeGroup) -> Self {
        let target_ids = group.target_ids();
        let cases = group.cases.clone();
        let default = group.default.clone();
        let selection: crate::edge::SelectionFn = Arc::new(move |payload, _targets| {
            for case in &cases {
                if (case.predicate)(payload) {
                    return vec![case.target.clone()];
                }
            }
            vec![default.clone()]
        });

        let fan_out = crate::edge::FanOutEdgeGroup {
            source_id: group.source_id,
            target_ids,
            selection: Some(selection),
        };
        Self {
            inner: FanOutEdgeRunner::new(fan_out),
        }
    }
}

#[async_trait]
impl EdgeRunner for SwitchCaseEdgeRunner {
    async fn deliver(
        &self,
        message: Message,
        executors: &HashMap<String, Executor>,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> bool {
        self.inner.deliver(message, executors, runner_context, shared_state).await
    }
}

/// Build the right [`EdgeRunner`] for an [`EdgeGroup`].
pub fn create_edge_runner(group: EdgeGroup) -> Box<dyn EdgeRunner> {
    match group {
        EdgeGroup::Single(g) => Box::new(SingleEdgeRunner::new(g)),
        EdgeGroup::FanOut(g) => Box::new(FanOutEdgeRunner::new(g)),
        EdgeGroup::FanIn(g) => Box::new(FanInEdgeRunner::new(g)),
        EdgeGroup::SwitchCase(g) => Box::new(SwitchCaseEdgeRunner::new(g)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{HandlerInputKind, HandlerOutputKind, HandlerFuture};
    use crate::runner_context::InMemoryRunnerContext;

    fn forwarding_handler<'a>(payload: Arc<dyn Payload>, ctx: &'a ExecutorContext<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            ctx.send_message(payload.to_json().unwrap_or_default().to_string()).await;
            Ok(())
        })
    }

    fn make_executor(id: &str) -> Executor {
        let mut exec = Executor::new(id);
        exec.register_handler(HandlerInputKind::Any, HandlerOutputKind::None, forwarding_handler);
        exec
    }

    #[tokio::test]
    async fn fan_in_waits_for_all_sources_then_delivers_aggregate() {
        let group = crate::edge::FanInEdgeGroup::new(vec!["a".into(), "b".into()], "t").unwrap();
        let runner = FanInEdgeRunner::new(group);

        let mut executors = HashMap::new();
        executors.insert("t".to_string(), make_executor("t"));

        let runner_ctx = InMemoryRunnerContext::new();
        let shared = SharedState::new();

        let msg_a = Message::new("x".to_string(), "a");
        let accepted = runner.deliver(msg_a, &executors, &runner_ctx, &shared).await;
        assert!(accepted);
        assert!(runner_ctx.drain_events().await.is_empty());

        let msg_b = Message::new("y".to_string(), "b");
        let accepted = runner.deliver(msg_b, &executors, &runner_ctx, &shared).await;
        assert!(accepted);

        let events = runner_ctx.drain_events().await;
        assert!(!events.is_empty());
    }

    #[tokio::test]
    async fn single_edge_rejects_mismatched_forced_target() {
        let group = crate::edge::SingleEdgeGroup { edge: crate::edge::Edge::new("a", "b") };
        let runner = SingleEdgeRunner::new(group);

        let mut executors = HashMap::new();
        executors.insert("b".to_string(), make_executor("b"));

        let runner_ctx = InMemoryRunnerContext::new();
        let shared = SharedState::new();

        let msg = Message::targeted("x".to_string(), "a", "not-b");
        assert!(!runner.deliver(msg, &executors, &runner_ctx, &shared).await);
    }

    #[tokio::test]
    async fn fan_out_broadcasts_to_all_targets_with_no_selector() {
        let group = crate::edge::FanOutEdgeGroup::new("a", vec!["b".into(), "c".into()]).unwrap();
        let runner = FanOutEdgeRunner::new(group);

        let mut executors = HashMap::new();
        executors.insert("b".to_string(), make_executor("b"));
        executors.insert("c".to_string(), make_executor("c"));

        let runner_ctx = InMemoryRunnerContext::new();
        let shared = SharedState::new();

        let msg = Message::new(42i32, "a");
        assert!(runner.deliver(msg, &executors, &runner_ctx, &shared).await);

        let events = runner_ctx.drain_events().await;
        let invoked_count = events
            .iter()
            .filter(|e| matches!(e, crate::event::WorkflowEvent::ExecutorInvoked { .. }))
            .count();
        assert_eq!(invoked_count, 2);
    }
}
