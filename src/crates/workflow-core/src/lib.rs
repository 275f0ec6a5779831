//! # workflow-core — superstep-synchronous, message-passing agent orchestration
//!
//! A graph-structured runtime in the Pregel tradition: executors are nodes, edges route typed
//! messages between them, and a scheduler drives the whole graph through synchronized supersteps
//! until the outbox is empty and every fan-in buffer has settled.
//!
//! ## Core concepts
//!
//! ### 1. `Workflow` / `WorkflowBuilder` — the primary API
//!
//! [`WorkflowBuilder`] assembles [`Executor`]s and [`EdgeGroup`]s, validates the graph exactly
//! once at [`WorkflowBuilder::build`], and hands back a runnable [`Workflow`]. A `Workflow` runs
//! to quiescence, to `WAITING_FOR_INPUT` (see request/response below), or to failure.
//!
//! ### 2. Superstep scheduling
//!
//! Each superstep drains the entire outbox as one snapshot and delivers every message
//! concurrently through the edge runner(s) registered for its source — see [`scheduler`]. The
//! run is quiescent once a superstep both receives no outbox entries and leaves no fan-in group
//! holding a partial buffer.
//!
//! ### 3. Typed dispatch
//!
//! An [`Executor`] holds an ordered table of handlers, each keyed by a [`HandlerInputKind`]
//! (`Exact` > `Union` > `Any`, most specific wins). Handler bodies are plain async functions from
//! a downcast [`Payload`] to `Result<(), Box<dyn Error>>` — see [`executor`].
//!
//! ### 4. Request/response suspension
//!
//! A handler that needs external input sends a [`request_response::RequestInfo`] payload to the
//! well-known [`request_response::RequestInfoExecutor`], which parks it rather than forwarding it.
//! Once only pending requests remain outstanding, the run reports `WAITING_FOR_INPUT`;
//! [`Workflow::resume`] re-injects responses and continues the superstep loop.
//!
//! ### 5. Checkpointing
//!
//! [`WorkflowBuilder::with_checkpoint_store`] wires a `workflow_checkpoint::CheckpointStore`
//! (in-memory or file-backed) into the run. [`Workflow::checkpoint`] snapshots shared state, edge
//! runner buffers, and pending requests; [`Workflow::resume_from_checkpoint`] restores them and
//! re-enters the superstep loop.
//!
//! ## Module organization
//!
//! - [`message`] — the [`Payload`] trait and [`Message`] envelope
//! - [`event`] — the [`WorkflowEvent`] audit trail
//! - [`shared_state`] — the run-scoped key/value store
//! - [`runner_context`] — the scheduler's mailbox abstraction
//! - [`executor`] — handler dispatch
//! - [`edge`] / [`edge_runner`] — routing topology and delivery
//! - [`validator`] — build-time graph validation
//! - [`scheduler`] — the superstep loop
//! - [`request_response`] — suspend/resume on external input
//! - [`env`] — environment-derived builder settings
//! - [`workflow`] — the public facade

pub mod edge;
pub mod edge_runner;
pub mod env;
pub mod error;
pub mod event;
pub mod executor;
pub mod message;
pub mod request_response;
pub mod runner_context;
pub mod scheduler;
pub mod shared_state;
pub mod validator;
pub mod workflow;

pub use edge::{Case, Edge, EdgeGroup, FanInEdgeGroup, FanOutEdgeGroup, Predicate, SelectionFn, SingleEdgeGroup, SwitchCaseEdgeGroup};
pub use env::EnvSettings;
pub use error::{GraphError, ProtocolError, Result, ValidationError};
pub use event::{ErrorDetails, WorkflowEvent, WorkflowStatus};
pub use executor::{Executor, ExecutorContext, Handler, HandlerFuture, HandlerInputKind, HandlerOutputKind};
pub use message::{AggregatedPayload, Message, Payload};
pub use request_response::{
    Interceptor, InterceptorScope, PendingRequest, PendingRequests, RequestInfo, RequestInfoExecutor, REQUEST_INFO_EXECUTOR_ID,
};
pub use runner_context::{CheckpointableRunnerContext, InMemoryRunnerContext, RunnerContext};
pub use scheduler::Scheduler;
pub use shared_state::SharedState;
pub use validator::{ValidationReport, ValidationWarning};
pub use workflow::{file_checkpoint_store, in_memory_checkpoint_store, Workflow, WorkflowBuilder, WorkflowResult};
