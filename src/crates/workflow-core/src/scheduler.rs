//! The superstep loop: drain, route, deliver, barrier, repeat until quiescent.
//!
//! Each superstep drains the entire outbox as one snapshot, delivers every message concurrently
//! through the edge runner(s) registered for its source, then drains the event queue. The run is
//! quiescent once a superstep both receives no outbox entries and leaves no fan-in group holding
//! a partial buffer — partial fan-in state is "waiting", not "done".

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::edge::EdgeGroup;
use crate::edge_runner::{create_edge_runner, EdgeRunner};
use crate::error::{GraphError, Result};
use crate::event::WorkflowEvent;
use crate::executor::{Executor, ExecutorContext};
use crate::message::Message;
use crate::runner_context::RunnerContext;
use crate::shared_state::SharedState;

/// Whether a just-completed superstep left the run quiescent.
enum SuperstepOutcome {
    Converged,
    Continue,
}

/// Owns the validated graph and drives the superstep loop over it.
///
/// Construction is infallible by design — a `Scheduler` is only ever built from an already
/// validated `(executors, groups)` pair, via [`crate::workflow::WorkflowBuilder::build`].
pub struct Scheduler {
    executors: HashMap<String, Executor>,
    /// Every edge runner, indexed by each source id it reads from. A source can feed more than
    /// one group (e.g. a fan-out and an unrelated single edge both rooted at the same executor),
    /// so the same `Arc<dyn EdgeRunner>` may appear under multiple keys.
    runners_by_source: HashMap<String, Vec<Arc<dyn EdgeRunner>>>,
    /// The full, deduplicated runner set, used for the quiescence check across all fan-in
    /// buffers regardless of which source is currently being routed.
    all_runners: Vec<Arc<dyn EdgeRunner>>,
    max_iterations: u64,
}

impl Scheduler {
    pub fn new(executors: HashMap<String, Executor>, groups: Vec<EdgeGroup>, max_iterations: u64) -> Self {
        let mut runners_by_source: HashMap<String, Vec<Arc<dyn EdgeRunner>>> = HashMap::new();
        let mut all_runners = Vec::with_capacity(groups.len());
        for group in groups {
            let source_ids = group.source_ids();
            let runner: Arc<dyn EdgeRunner> = Arc::from(create_edge_runner(group));
            for source_id in source_ids {
                runners_by_source.entry(source_id).or_default().push(runner.clone());
            }
            all_runners.push(runner);
        }
        Self {
            executors,
            runners_by_source,
            all_runners,
            max_iterations,
        }
    }

    pub fn executors(&self) -> &HashMap<String, Executor> {
        &self.executors
    }

    /// Invoke the start executor directly with `initial` — there is no inbound edge to the start
    /// of the graph, so superstep zero is a direct call rather than a routed delivery — then run
    /// the outbox-draining loop until quiescence or `max_iterations`. The whole run is wrapped in
    /// one `info_span!("workflow_run", run_id)`, per the logging surface's contract.
    pub async fn run(
        &self,
        run_id: &str,
        start_executor_id: &str,
        initial: Arc<dyn crate::message::Payload>,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> Result<()> {
        let span = tracing::info_span!("workflow_run", run_id = %run_id);
        async move {
            let Some(start) = self.executors.get(start_executor_id) else {
                return Err(GraphError::dispatch(start_executor_id, "<initial payload>"));
            };
            let ctx = ExecutorContext {
                executor_id: start_executor_id,
                runner_context,
                shared_state,
            };
            start.execute(initial, &ctx).await;
            self.run_supersteps(runner_context, shared_state).await
        }
        .instrument(span)
        .await
    }

    /// Drive the loop without seeding a new message — used when resuming a run whose outbox
    /// already holds re-injected request/response replies.
    pub async fn run_supersteps(
        &self,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> Result<()> {
        let mut iteration: u64 = 0;
        loop {
            let span = tracing::debug_span!("superstep", index = iteration);
            let outcome = self
                .run_one_superstep(runner_context, shared_state)
                .instrument(span)
                .await?;
            match outcome {
                SuperstepOutcome::Converged => return Ok(()),
                SuperstepOutcome::Continue => {}
            }
            iteration += 1;
            if iteration > self.max_iterations {
                runner_context
                    .add_event(WorkflowEvent::WorkflowFailed {
                        error: crate::event::ErrorDetails::new(
                            "ConvergenceError",
                            format!("workflow did not converge within {} supersteps", self.max_iterations),
                        ),
                    })
                    .await;
                return Err(GraphError::convergence(self.max_iterations));
            }
        }
    }

    async fn run_one_superstep(
        &self,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) -> Result<SuperstepOutcome> {
        let outbox = runner_context.drain_messages().await;
        let pending_fan_in = self.has_pending_fan_in().await;

        if outbox.is_empty() && !pending_fan_in {
            tracing::debug!("converged: outbox empty, no pending fan-in buffers");
            return Ok(SuperstepOutcome::Converged);
        }

        tracing::debug!(sources = outbox.len(), "superstep starting");

        // Deliveries to distinct (source, target) pairs run concurrently, but deliveries that
        // share both a source and a target are chained one after another within their own boxed
        // future. A handler's own await points would otherwise let a later message in the same
        // batch race ahead of an earlier one to the same target.
        let mut deliveries: Vec<futures::future::BoxFuture<'_, ()>> = Vec::new();
        for (source_id, messages) in outbox {
            match self.runners_by_source.get(&source_id) {
                Some(runners) => {
                    for runner in runners {
                        let runner = runner.clone();
                        let messages = messages.clone();
                        let source_id = source_id.clone();
                        deliveries.push(Box::pin(async move {
                            for message in messages {
                                self.deliver_one(runner.as_ref(), message, source_id.clone(), runner_context, shared_state).await;
                            }
                        }));
                    }
                }
                // A source with no declared outgoing edge group is normally a dead end, but a
                // message carrying an explicit `target_id` (currently only the request/response
                // resume path, whose synthetic source is never a real graph node) is still
                // deliverable by direct dispatch, the same way superstep zero calls the start
                // executor directly rather than through a routed edge.
                None => {
                    let mut by_target: HashMap<String, Vec<Message>> = HashMap::new();
                    for message in messages {
                        match message.target_id.clone().filter(|id| self.executors.contains_key(id)) {
                            Some(target_id) => by_target.entry(target_id).or_default().push(message),
                            None => tracing::warn!(source_id = %source_id, "no outgoing edge group for source, message dropped"),
                        }
                    }
                    for (target_id, target_messages) in by_target {
                        let Some(target) = self.executors.get(&target_id) else { continue };
                        deliveries.push(Box::pin(async move {
                            for message in target_messages {
                                self.deliver_direct(target_id.clone(), target, message, runner_context, shared_state).await;
                            }
                        }));
                    }
                }
            }
        }
        futures::future::join_all(deliveries).await;
        Ok(SuperstepOutcome::Continue)
    }

    async fn deliver_one(
        &self,
        runner: &dyn EdgeRunner,
        message: Message,
        source_id: String,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) {
        let accepted = runner.deliver(message, &self.executors, runner_context, shared_state).await;
        if !accepted {
            tracing::trace!(source_id = %source_id, "message not accepted by edge group (predicate/target mismatch)");
        }
    }

    async fn deliver_direct(
        &self,
        target_id: String,
        target: &Executor,
        message: Message,
        runner_context: &dyn RunnerContext,
        shared_state: &SharedState,
    ) {
        let ctx = ExecutorContext {
            executor_id: &target_id,
            runner_context,
            shared_state,
        };
        target.execute(message.data, &ctx).await;
    }

    /// Whether any fan-in group is still waiting on at least one more source.
    async fn has_pending_fan_in(&self) -> bool {
        for runner in &self.all_runners {
            if runner.serialize_state().await.is_some() {
                return true;
            }
        }
        false
    }

    /// Snapshot every runner's buffered state, keyed by the group's first source id, for a
    /// checkpoint's `executor_states` map. Groups with nothing buffered are omitted.
    pub async fn snapshot_edge_runner_state(&self) -> HashMap<String, serde_json::Value> {
        let mut states = HashMap::new();
        for (source_id, runners) in &self.runners_by_source {
            for runner in runners {
                if let Some(state) = runner.serialize_state().await {
                    states.insert(format!("__edge_runner::{source_id}"), state);
                }
            }
        }
        states
    }
}
