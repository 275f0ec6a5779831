//! The public facade: [`WorkflowBuilder`] assembles a graph and validates it once; the resulting
//! [`Workflow`] owns a [`Scheduler`] and drives runs, checkpoints, and resumes against it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Instrument;
use workflow_checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};

use crate::edge::{Case, Edge, EdgeGroup, FanInEdgeGroup, FanOutEdgeGroup, Predicate, SelectionFn, SingleEdgeGroup, SwitchCaseEdgeGroup};
use crate::env::EnvSettings;
use crate::error::{GraphError, ProtocolError, Result, ValidationError};
use crate::event::{WorkflowEvent, WorkflowStatus};
use crate::executor::{Executor, HandlerInputKind, HandlerOutputKind};
use crate::message::Payload;
use crate::request_response::{Interceptor, PendingRequests, RequestInfo, RequestInfoExecutor, REQUEST_INFO_EXECUTOR_ID};
use crate::runner_context::{CheckpointableRunnerContext, InMemoryRunnerContext, RunnerContext};
use crate::scheduler::Scheduler;
use crate::shared_state::SharedState;
use crate::validator::{self, ValidationReport};

/// Assembles executors and edge groups, then validates and freezes them into a [`Workflow`].
///
/// Setter methods mutate in place and return `&mut Self` for chaining; `build()` consumes the
/// builder, since it's the one method meant to run exactly once.
pub struct WorkflowBuilder {
    executors: HashMap<String, Executor>,
    groups: Vec<EdgeGroup>,
    start_executor_id: Option<String>,
    max_iterations: u64,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    interceptors: Vec<Interceptor>,
    env: EnvSettings,
    pending_requests: Arc<PendingRequests>,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            groups: Vec::new(),
            start_executor_id: None,
            max_iterations: 100,
            checkpoint_store: None,
            interceptors: Vec::new(),
            env: EnvSettings::from_env(),
            pending_requests: Arc::new(PendingRequests::new()),
        }
    }

    /// Override the environment-derived settings instead of reading the process environment.
    /// Tests should prefer this over mutating `std::env` globally.
    pub fn with_env(&mut self, env: EnvSettings) -> &mut Self {
        self.env = env;
        self
    }

    pub fn add_executor(&mut self, executor: Executor) -> &mut Self {
        self.executors.insert(executor.id().to_string(), executor);
        self
    }

    pub fn set_start_executor(&mut self, id: impl Into<String>) -> &mut Self {
        self.start_executor_id = Some(id.into());
        self
    }

    pub fn add_edge(&mut self, source: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.groups.push(EdgeGroup::Single(SingleEdgeGroup { edge: Edge::new(source, target) }));
        self
    }

    pub fn add_edge_with_predicate(&mut self, source: impl Into<String>, target: impl Into<String>, predicate: Predicate) -> &mut Self {
        self.groups.push(EdgeGroup::Single(SingleEdgeGroup {
            edge: Edge::new(source, target).with_predicate(predicate),
        }));
        self
    }

    /// Sugar for a sequence of single edges `execs[0] -> execs[1] -> ... -> execs[n-1]`.
    pub fn add_chain(&mut self, execs: &[impl AsRef<str>]) -> &mut Self {
        for pair in execs.windows(2) {
            self.add_edge(pair[0].as_ref().to_string(), pair[1].as_ref().to_string());
        }
        self
    }

    pub fn add_fan_out(&mut self, source: impl Into<String>, targets: Vec<String>) -> std::result::Result<&mut Self, String> {
        let group = FanOutEdgeGroup::new(source, targets)?;
        self.groups.push(EdgeGroup::FanOut(group));
        Ok(self)
    }

    pub fn add_fan_out_with_selection(
        &mut self,
        source: impl Into<String>,
        targets: Vec<String>,
        selection: SelectionFn,
    ) -> std::result::Result<&mut Self, String> {
        let group = FanOutEdgeGroup::new(source, targets)?.with_selection(selection);
        self.groups.push(EdgeGroup::FanOut(group));
        Ok(self)
    }

    pub fn add_fan_in(&mut self, sources: Vec<String>, target: impl Into<String>) -> std::result::Result<&mut Self, String> {
        let group = FanInEdgeGroup::new(sources, target)?;
        self.groups.push(EdgeGroup::FanIn(group));
        Ok(self)
    }

    pub fn add_switch_case(&mut self, source: impl Into<String>, cases: Vec<Case>, default: impl Into<String>) -> &mut Self {
        self.groups.push(EdgeGroup::SwitchCase(SwitchCaseEdgeGroup::new(source, cases, default)));
        self
    }

    /// Attach a checkpoint store; the builder wraps it in a [`CheckpointableRunnerContext`] so the
    /// built [`Workflow`] can snapshot and restore. Without this, [`Workflow::checkpoint`] and
    /// [`Workflow::resume_from_checkpoint`] return a `Checkpoint` error naming the missing
    /// capability.
    pub fn with_checkpoint_store(&mut self, store: Arc<dyn CheckpointStore>) -> &mut Self {
        self.checkpoint_store = Some(store);
        self
    }

    pub fn set_max_iterations(&mut self, n: u64) -> &mut Self {
        self.max_iterations = n;
        self
    }

    pub fn add_interceptor(&mut self, interceptor: Interceptor) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Validate the graph and freeze it into a runnable [`Workflow`]. Consumes the builder.
    ///
    /// If any declared edge targets [`REQUEST_INFO_EXECUTOR_ID`], inserts the well-known
    /// [`RequestInfoExecutor`] wired to this builder's own pending-request table before
    /// validating, so a caller routes to it by id rather than constructing one. A graph that
    /// never references that id gets no such executor, so reachability/isolation checks stay
    /// accurate for graphs that don't use request/response at all.
    pub fn build(mut self) -> Result<Workflow> {
        let start_executor_id = self
            .start_executor_id
            .clone()
            .ok_or_else(|| GraphError::Validation(ValidationError::MissingStartExecutor(String::new())))?;

        let uses_request_info = self
            .groups
            .iter()
            .any(|g| g.target_ids().iter().any(|t| t == REQUEST_INFO_EXECUTOR_ID));
        if uses_request_info && !self.executors.contains_key(REQUEST_INFO_EXECUTOR_ID) {
            let mut request_info_executor = Executor::new(REQUEST_INFO_EXECUTOR_ID);
            request_info_executor.register_handler(
                HandlerInputKind::exact::<RequestInfo>(),
                HandlerOutputKind::None,
                RequestInfoExecutor::new(self.pending_requests.clone()),
            );
            self.executors.insert(REQUEST_INFO_EXECUTOR_ID.to_string(), request_info_executor);
        }

        let interceptor_tuples: Vec<(String, String, Option<String>)> =
            self.interceptors.iter().map(Interceptor::as_validator_tuple).collect();

        let report: ValidationReport = validator::validate(&self.executors, &self.groups, &start_executor_id, &interceptor_tuples)?;

        let (runner_context, checkpointable): (Arc<dyn RunnerContext>, Option<Arc<CheckpointableRunnerContext>>) =
            match self.checkpoint_store {
                Some(store) => {
                    let ctx = Arc::new(CheckpointableRunnerContext::new(store));
                    (ctx.clone() as Arc<dyn RunnerContext>, Some(ctx))
                }
                None => (Arc::new(InMemoryRunnerContext::new()), None),
            };

        let scheduler = Scheduler::new(self.executors, self.groups, self.max_iterations);
        let pending_requests = self.pending_requests;

        for warning_event in validator::warnings_as_events(&report) {
            // Warnings surface once at build time, not once per run — a caller inspecting a
            // freshly-built `Workflow` should already see what the validator found.
            if let WorkflowEvent::WorkflowWarning { text } = &warning_event {
                tracing::warn!(%text, "graph validation warning");
            }
        }

        Ok(Workflow {
            scheduler: Arc::new(scheduler),
            shared_state: Arc::new(SharedState::new()),
            runner_context,
            checkpointable,
            pending_requests,
            start_executor_id,
            running: Arc::new(AtomicBool::new(false)),
            build_warnings: report.warnings,
            max_iterations: self.max_iterations,
            env: self.env,
        })
    }
}

/// The terminal outcome of a completed run, returned by [`Workflow::run_to_completion`].
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub events: Vec<WorkflowEvent>,
}

/// A validated, runnable workflow graph.
///
/// Once [`Workflow::run`] (or [`Workflow::run_to_completion`]) has started, the workflow is owned
/// by the scheduler for the duration of that run; a second concurrent call returns
/// `ProtocolError::AlreadyRunning` rather than interleaving with it.
pub struct Workflow {
    scheduler: Arc<Scheduler>,
    shared_state: Arc<SharedState>,
    runner_context: Arc<dyn RunnerContext>,
    checkpointable: Option<Arc<CheckpointableRunnerContext>>,
    pending_requests: Arc<PendingRequests>,
    start_executor_id: String,
    running: Arc<AtomicBool>,
    build_warnings: Vec<validator::ValidationWarning>,
    max_iterations: u64,
    env: EnvSettings,
}

impl Workflow {
    /// Executor ids in the graph.
    pub fn executor_ids(&self) -> Vec<String> {
        self.scheduler.executors().keys().cloned().collect()
    }

    pub fn start_executor_id(&self) -> &str {
        &self.start_executor_id
    }

    pub fn build_warnings(&self) -> &[validator::ValidationWarning] {
        &self.build_warnings
    }

    pub fn env(&self) -> &EnvSettings {
        &self.env
    }

    /// Run to completion, materializing every event emitted along the way. This is the
    /// convenience wrapper around [`Self::run`] for callers that don't need a live stream.
    pub async fn run_to_completion(&self, initial: Arc<dyn Payload>) -> Result<WorkflowResult> {
        self.run(initial).await
    }

    /// Drive one run from the start executor to quiescence (or `WAITING_FOR_INPUT`, or failure).
    pub async fn run(&self, initial: Arc<dyn Payload>) -> Result<WorkflowResult> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GraphError::Protocol(ProtocolError::AlreadyRunning));
        }
        let outcome = self.run_inner(initial).await;
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_inner(&self, initial: Arc<dyn Payload>) -> Result<WorkflowResult> {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        self.runner_context
            .add_event(WorkflowEvent::WorkflowStarted {
                run_id: run_id.clone(),
                start_executor_id: self.start_executor_id.clone(),
            })
            .await;
        self.runner_context
            .add_event(WorkflowEvent::WorkflowStatusChanged { status: WorkflowStatus::Started })
            .await;

        let result = self
            .scheduler
            .run(&run_id, &self.start_executor_id, initial, self.runner_context.as_ref(), &self.shared_state)
            .await;

        let status = match &result {
            Ok(()) if !self.pending_requests.is_empty().await => WorkflowStatus::WaitingForInput,
            Ok(()) => WorkflowStatus::Completed,
            Err(_) => WorkflowStatus::Failed,
        };

        match &result {
            Ok(()) => {
                self.runner_context
                    .add_event(WorkflowEvent::WorkflowStatusChanged { status })
                    .await;
                if status == WorkflowStatus::Completed {
                    self.runner_context
                        .add_event(WorkflowEvent::WorkflowCompleted { payload: None, is_error: false })
                        .await;
                }
            }
            Err(err) => {
                self.runner_context
                    .add_event(WorkflowEvent::WorkflowFailed {
                        error: crate::event::ErrorDetails::new(error_kind(err), err.to_string()),
                    })
                    .await;
                self.runner_context
                    .add_event(WorkflowEvent::WorkflowStatusChanged { status: WorkflowStatus::Failed })
                    .await;
            }
        }

        result?;
        Ok(WorkflowResult {
            status,
            events: self.runner_context.drain_events().await,
        })
    }

    /// Snapshot and persist a checkpoint of the current run. Requires the builder to have been
    /// configured with [`WorkflowBuilder::with_checkpoint_store`]; otherwise returns a
    /// `Checkpoint` error naming the missing capability.
    pub async fn checkpoint(&self, workflow_id: impl Into<String>, iteration_count: u64) -> Result<String> {
        let Some(checkpointable) = &self.checkpointable else {
            return Err(GraphError::Checkpoint(workflow_checkpoint::CheckpointError::invalid(
                "workflow was not built with a checkpoint store (see WorkflowBuilder::with_checkpoint_store)",
            )));
        };
        let shared_state = self.shared_state.snapshot().await;
        let mut executor_states = self.scheduler.snapshot_edge_runner_state().await;
        for (request_id, pending) in self.pending_requests.snapshot().await {
            executor_states.insert(
                format!("__pending_request::{request_id}"),
                serde_json::to_value(pending).unwrap_or(serde_json::Value::Null),
            );
        }
        checkpointable
            .create_checkpoint(workflow_id, shared_state, executor_states, iteration_count, self.max_iterations)
            .await
    }

    /// Restore shared state, the event queue, and any pending requests from a checkpoint, then
    /// re-enter the superstep loop — used to continue a run whose outbox still held undelivered
    /// work at snapshot time.
    pub async fn resume_from_checkpoint(&self, checkpoint_id: &str) -> Result<WorkflowResult> {
        let Some(checkpointable) = &self.checkpointable else {
            return Err(GraphError::Checkpoint(workflow_checkpoint::CheckpointError::invalid(
                "workflow was not built with a checkpoint store (see WorkflowBuilder::with_checkpoint_store)",
            )));
        };
        let Some(checkpoint) = checkpointable.restore_from_checkpoint(checkpoint_id).await? else {
            return Err(GraphError::Checkpoint(workflow_checkpoint::CheckpointError::NotFound(checkpoint_id.to_string())));
        };
        self.restore_from(&checkpoint).await
    }

    /// Re-inject pending request responses and continue the run. `responses` maps
    /// `request_id -> response payload`.
    pub async fn resume(&self, responses: HashMap<String, Arc<dyn Payload>>) -> Result<WorkflowResult> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GraphError::Protocol(ProtocolError::AlreadyRunning));
        }
        let outcome = self.resume_inner(responses).await;
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    async fn resume_inner(&self, responses: HashMap<String, Arc<dyn Payload>>) -> Result<WorkflowResult> {
        let messages = self.pending_requests.resume(responses).await?;
        for message in messages {
            self.runner_context.send_message(message).await;
        }
        let run_id = format!("resume-{}", uuid::Uuid::new_v4());
        let span = tracing::info_span!("workflow_run", run_id = %run_id);
        let result = self
            .scheduler
            .run_supersteps(self.runner_context.as_ref(), &self.shared_state)
            .instrument(span)
            .await;

        let status = match &result {
            Ok(()) if !self.pending_requests.is_empty().await => WorkflowStatus::WaitingForInput,
            Ok(()) => WorkflowStatus::Completed,
            Err(_) => WorkflowStatus::Failed,
        };
        self.runner_context
            .add_event(WorkflowEvent::WorkflowStatusChanged { status })
            .await;

        result?;
        Ok(WorkflowResult {
            status,
            events: self.runner_context.drain_events().await,
        })
    }

    async fn restore_from(&self, checkpoint: &Checkpoint) -> Result<WorkflowResult> {
        self.shared_state.restore(checkpoint.shared_state.clone()).await;

        let mut restored_pending: HashMap<String, crate::request_response::PendingRequest> = HashMap::new();
        for (key, value) in &checkpoint.executor_states {
            if let Some(request_id) = key.strip_prefix("__pending_request::") {
                if let Ok(pending) = serde_json::from_value(value.clone()) {
                    restored_pending.insert(request_id.to_string(), pending);
                }
            }
        }
        self.pending_requests.restore(restored_pending).await;

        let result = self.scheduler.run_supersteps(self.runner_context.as_ref(), &self.shared_state).await;
        let status = match &result {
            Ok(()) if !self.pending_requests.is_empty().await => WorkflowStatus::WaitingForInput,
            Ok(()) => WorkflowStatus::Completed,
            Err(_) => WorkflowStatus::Failed,
        };
        result?;
        Ok(WorkflowResult {
            status,
            events: self.runner_context.drain_events().await,
        })
    }
}

fn error_kind(err: &GraphError) -> &'static str {
    match err {
        GraphError::Validation(_) => "ValidationError",
        GraphError::Dispatch { .. } => "DispatchError",
        GraphError::Convergence { .. } => "ConvergenceError",
        GraphError::Protocol(_) => "ProtocolError",
        GraphError::Checkpoint(_) => "CheckpointError",
        GraphError::Serialization(_) => "SerializationError",
    }
}

/// Build a file-backed checkpoint store rooted at `WORKFLOW_CHECKPOINT_DIR`, or the explicit
/// `dir` argument if given. Per §10.3, neither set is a build-time error rather than a silent
/// default location.
pub async fn file_checkpoint_store(env: &EnvSettings, dir: Option<PathBuf>) -> Result<Arc<dyn CheckpointStore>> {
    let root = dir.or_else(|| env.checkpoint_dir.clone()).ok_or_else(|| {
        GraphError::Checkpoint(workflow_checkpoint::CheckpointError::invalid(
            "no checkpoint directory given and WORKFLOW_CHECKPOINT_DIR is unset",
        ))
    })?;
    Ok(Arc::new(FileCheckpointStore::new(root).await?))
}

pub fn in_memory_checkpoint_store() -> Arc<dyn CheckpointStore> {
    Arc::new(InMemoryCheckpointStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Handler, HandlerFuture, HandlerInputKind, HandlerOutputKind};

    struct Echo;

    impl Handler for Echo {
        fn call<'a>(&'a self, _payload: Arc<dyn Payload>, _ctx: &'a crate::executor::ExecutorContext<'a>) -> HandlerFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    fn echo_executor(id: &str) -> Executor {
        let mut executor = Executor::new(id);
        executor.register_handler(HandlerInputKind::Any, HandlerOutputKind::None, Echo);
        executor
    }

    #[test]
    fn build_without_start_executor_fails() {
        let mut builder = WorkflowBuilder::new();
        builder.add_executor(echo_executor("a"));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::MissingStartExecutor(_))));
    }

    #[tokio::test]
    async fn single_executor_workflow_runs_to_completion() {
        let mut builder = WorkflowBuilder::new();
        builder.add_executor(echo_executor("only"));
        builder.set_start_executor("only");
        let workflow = builder.build().unwrap();

        let result = workflow.run_to_completion(Arc::new(1i32)).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Completed);
        assert!(result.events.iter().any(|e| matches!(e, WorkflowEvent::WorkflowStarted { .. })));
        assert!(result.events.iter().any(|e| matches!(e, WorkflowEvent::WorkflowCompleted { .. })));
    }

    #[tokio::test]
    async fn concurrent_run_on_same_workflow_is_rejected() {
        let mut builder = WorkflowBuilder::new();
        builder.add_executor(echo_executor("only"));
        builder.set_start_executor("only");
        let workflow = Arc::new(builder.build().unwrap());

        workflow.running.store(true, Ordering::SeqCst);
        let err = workflow.run(Arc::new(1i32)).await.unwrap_err();
        assert!(matches!(err, GraphError::Protocol(ProtocolError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn chain_sugar_adds_sequential_edges() {
        let mut builder = WorkflowBuilder::new();
        builder.add_executor(echo_executor("a"));
        builder.add_executor(echo_executor("b"));
        builder.add_executor(echo_executor("c"));
        builder.set_start_executor("a");
        builder.add_chain(&["a", "b", "c"]);
        let workflow = builder.build().unwrap();
        assert_eq!(workflow.executor_ids().len(), 3);
    }
}
