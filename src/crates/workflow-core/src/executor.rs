//! A node in the workflow graph: a typed handler table plus dispatch.
//!
//! An [`Executor`] registers one or more handlers, each keyed by a [`HandlerInputKind`]. At
//! dispatch time `can_handle`/`execute` pick the most specific match — see the module docs for
//! the ordering rule.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::event::{ErrorDetails, WorkflowEvent};
use crate::message::Payload;
use crate::runner_context::RunnerContext;
use crate::shared_state::SharedState;

/// A handler's declared input, in the representation this crate commits to in place of a
/// dynamically-typed host language's runtime reflection (nominal subtyping, generic origin
/// matching). See the crate-level notes on dispatch for the full rationale.
///
/// Ordering for handler selection is `Exact` > `Union` > `Any`; this is a total order, and ties
/// within a tier resolve to first-registered-wins.
#[derive(Clone)]
pub enum HandlerInputKind {
    /// Accepts exactly one concrete Rust type.
    Exact(TypeId, &'static str),
    /// Accepts any of a closed set of concrete Rust types.
    Union(Vec<(TypeId, &'static str)>),
    /// Accepts any payload.
    Any,
}

impl HandlerInputKind {
    pub fn exact<T: 'static>() -> Self {
        Self::Exact(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    pub fn union(types: Vec<(TypeId, &'static str)>) -> Self {
        Self::Union(types)
    }

    /// Specificity tier used to order candidate handlers: lower sorts first (more specific).
    fn tier(&self) -> u8 {
        match self {
            HandlerInputKind::Exact(..) => 0,
            HandlerInputKind::Union(_) => 1,
            HandlerInputKind::Any => 2,
        }
    }

    fn accepts(&self, type_id: TypeId) -> bool {
        match self {
            HandlerInputKind::Exact(id, _) => *id == type_id,
            HandlerInputKind::Union(types) => types.iter().any(|(id, _)| *id == type_id),
            HandlerInputKind::Any => true,
        }
    }

    /// Human-readable type name(s), used in `GraphError::Dispatch` / validator diagnostics.
    pub fn describe(&self) -> String {
        match self {
            HandlerInputKind::Exact(_, name) => (*name).to_string(),
            HandlerInputKind::Union(types) => types
                .iter()
                .map(|(_, name)| *name)
                .collect::<Vec<_>>()
                .join(" | "),
            HandlerInputKind::Any => "any".to_string(),
        }
    }
}

/// A handler's declared output: the spec's "tagged declaration" (`none`, a single type, a union,
/// or `any`). Unlike `HandlerInputKind`, nothing downcasts against this — it exists so the
/// validator can check edge type compatibility (§4.6) and so `register_handler` can surface the
/// "every handler must carry a concrete output declaration" invariant.
#[derive(Clone)]
pub enum HandlerOutputKind {
    None,
    Exact(TypeId, &'static str),
    Union(Vec<(TypeId, &'static str)>),
    Any,
}

impl HandlerOutputKind {
    pub fn exact<T: 'static>() -> Self {
        Self::Exact(TypeId::of::<T>(), std::any::type_name::<T>())
    }
}

/// Per-invocation context a handler body receives: send outbound messages, touch shared state,
/// emit events.
pub struct ExecutorContext<'a> {
    pub executor_id: &'a str,
    pub runner_context: &'a dyn RunnerContext,
    pub shared_state: &'a SharedState,
}

impl<'a> ExecutorContext<'a> {
    pub async fn send_message<T: Payload>(&self, data: T) {
        self.runner_context
            .send_message(crate::message::Message::new(data, self.executor_id.to_string()))
            .await;
    }

    pub async fn send_message_to<T: Payload>(&self, data: T, target_id: impl Into<String>) {
        self.runner_context
            .send_message(crate::message::Message::targeted(
                data,
                self.executor_id.to_string(),
                target_id,
            ))
            .await;
    }

    pub async fn add_event(&self, event: WorkflowEvent) {
        self.runner_context.add_event(event).await;
    }
}

/// A boxed, handler-error-returning future borrowing from the call it was produced by.
pub type HandlerFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send + 'a>>;

/// A handler's body: an async function from a downcast payload and context to nothing. Errors are
/// reported as `Box<dyn Error>` so arbitrary user error types can be used; `Executor::execute`
/// captures them and turns them into `ExecutorFailed`.
///
/// This is written as a plain (non-`async_trait`) trait returning a boxed future directly, so a
/// bare `fn`/closure of matching shape implements it without macro-generated indirection.
pub trait Handler: Send + Sync {
    fn call<'a>(&'a self, payload: Arc<dyn Payload>, ctx: &'a ExecutorContext<'a>) -> HandlerFuture<'a>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(Arc<dyn Payload>, &'a ExecutorContext<'a>) -> HandlerFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, payload: Arc<dyn Payload>, ctx: &'a ExecutorContext<'a>) -> HandlerFuture<'a> {
        (self)(payload, ctx)
    }
}

struct RegisteredHandler {
    input: HandlerInputKind,
    output: HandlerOutputKind,
    handler: Box<dyn Handler>,
}

/// A node in the workflow graph.
///
/// Identity is `id`. Holds an ordered list of handlers; ordering determines the
/// first-registered-wins tiebreak among handlers tied on specificity.
pub struct Executor {
    id: String,
    handlers: Vec<RegisteredHandler>,
}

impl Executor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handlers: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register a handler. Duplicate input types on the same executor are permitted; the
    /// validator surfaces that as a `HandlerAmbiguity` warning rather than rejecting it outright.
    pub fn register_handler(
        &mut self,
        input: HandlerInputKind,
        output: HandlerOutputKind,
        handler: impl Handler + 'static,
    ) {
        self.handlers.push(RegisteredHandler {
            input,
            output,
            handler: Box::new(handler),
        });
    }

    pub fn handler_inputs(&self) -> impl Iterator<Item = &HandlerInputKind> {
        self.handlers.iter().map(|h| &h.input)
    }

    pub fn handler_outputs(&self) -> impl Iterator<Item = &HandlerOutputKind> {
        self.handlers.iter().map(|h| &h.output)
    }

    /// Whether any registered handler accepts `payload`'s runtime type.
    pub fn can_handle(&self, payload: &dyn Any) -> bool {
        self.select_handler(payload).is_some()
    }

    fn select_handler(&self, payload: &dyn Any) -> Option<&RegisteredHandler> {
        let type_id = payload.type_id();
        self.handlers
            .iter()
            .filter(|h| h.input.accepts(type_id))
            .min_by_key(|h| h.input.tier())
    }

    /// The scheduler's entry point: emits `ExecutorInvoked`, selects the most specific matching
    /// handler, awaits it, and emits `ExecutorCompleted` or `ExecutorFailed`.
    ///
    /// A handler's own error never escapes this call as a `GraphError` — it is captured here and
    /// turned into an `ExecutorFailed` event, per the propagation policy.
    #[tracing::instrument(skip(self, payload, ctx), fields(executor_id = %self.id))]
    pub async fn execute(&self, payload: Arc<dyn Payload>, ctx: &ExecutorContext<'_>) {
        let input_json = payload.to_json().unwrap_or(serde_json::Value::Null);
        ctx.add_event(WorkflowEvent::ExecutorInvoked {
            executor_id: self.id.clone(),
            input: input_json,
        })
        .await;

        let Some(handler) = self.select_handler(payload.as_any()) else {
            // No handler accepted this payload. The caller (scheduler) is responsible for
            // surfacing `GraphError::Dispatch` as a `WorkflowWarning`; this function only emits
            // the per-invocation lifecycle events.
            return;
        };

        match handler.handler.call(payload, ctx).await {
            Ok(()) => {
                ctx.add_event(WorkflowEvent::ExecutorCompleted {
                    executor_id: self.id.clone(),
                    output: None,
                })
                .await;
            }
            Err(err) => {
                let mut details = ErrorDetails::new("HandlerError", err.to_string())
                    .with_executor_id(self.id.clone());
                if std::env::var("RUST_BACKTRACE").map(|v| v != "0").unwrap_or(false) {
                    details = details.with_backtrace(format!("{:?}", std::backtrace::Backtrace::capture()));
                }
                ctx.add_event(WorkflowEvent::ExecutorFailed {
                    executor_id: self.id.clone(),
                    error: details,
                })
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner_context::InMemoryRunnerContext;

    fn handler_fn<'a>(_payload: Arc<dyn Payload>, _ctx: &'a ExecutorContext<'a>) -> HandlerFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn exact_beats_union_beats_any() {
        let mut exec = Executor::new("e");
        exec.register_handler(HandlerInputKind::Any, HandlerOutputKind::None, handler_fn);
        exec.register_handler(HandlerInputKind::exact::<i32>(), HandlerOutputKind::None, handler_fn);

        let payload: Arc<dyn Payload> = Arc::new(5i32);
        let selected = exec.select_handler(payload.as_any()).unwrap();
        assert_eq!(selected.input.tier(), 0);
    }

    #[tokio::test]
    async fn execute_emits_invoked_then_completed_on_success() {
        let mut exec = Executor::new("e");
        exec.register_handler(HandlerInputKind::exact::<i32>(), HandlerOutputKind::None, handler_fn);

        let runner_ctx = InMemoryRunnerContext::new();
        let shared = SharedState::new();
        let ctx = ExecutorContext {
            executor_id: "e",
            runner_context: &runner_ctx,
            shared_state: &shared,
        };

        exec.execute(Arc::new(5i32), &ctx).await;

        let events = runner_ctx.drain_events().await;
        assert!(matches!(events[0], WorkflowEvent::ExecutorInvoked { .. }));
        assert!(matches!(events[1], WorkflowEvent::ExecutorCompleted { .. }));
    }

    #[test]
    fn can_handle_false_for_unregistered_type() {
        let mut exec = Executor::new("e");
        exec.register_handler(HandlerInputKind::exact::<i32>(), HandlerOutputKind::None, handler_fn);
        let payload = "not an i32".to_string();
        assert!(!exec.can_handle(&payload));
    }
}
