//! Request/response suspension: pause a run on outstanding human/tool input, resume it later.
//!
//! A [`RequestInfo`] payload routed to a [`RequestInfoExecutor`] is recorded in a pending table
//! rather than dispatched onward. Once a superstep leaves only pending requests outstanding, the
//! caller sees `WAITING_FOR_INPUT` and the run halts — [`PendingRequests::resume`] re-injects each
//! response as an inbound message addressed back to whichever executor originally asked.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// The id every [`RequestInfoExecutor`] is registered under. `WorkflowBuilder::build` inserts one
/// automatically, wired to the `Workflow`'s own pending-request table, so callers route to it by
/// declaring an edge into this id rather than constructing a `RequestInfoExecutor` themselves.
pub const REQUEST_INFO_EXECUTOR_ID: &str = "RequestInfo";

/// The distinguished payload that asks the scheduler to suspend and wait for external input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub request_id: String,
    pub source_executor_id: String,
    pub request_type: String,
    pub payload: serde_json::Value,
}

impl RequestInfo {
    pub fn new(
        request_id: impl Into<String>,
        source_executor_id: impl Into<String>,
        request_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            source_executor_id: source_executor_id.into(),
            request_type: request_type.into(),
            payload,
        }
    }
}

/// One outstanding request, as recorded when it was first seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub source_executor_id: String,
    pub request_type: String,
    pub payload: serde_json::Value,
}

/// The scheduler's table of requests awaiting a response, keyed by `request_id`.
///
/// A [`RequestInfoExecutor`]'s handler records into this table instead of forwarding the message
/// downstream — the request terminates its route here until `resume` re-injects a reply.
#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, request: RequestInfo) {
        self.inner.lock().await.insert(
            request.request_id.clone(),
            PendingRequest {
                source_executor_id: request.source_executor_id,
                request_type: request.request_type,
                payload: request.payload,
            },
        );
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn snapshot(&self) -> HashMap<String, PendingRequest> {
        self.inner.lock().await.clone()
    }

    pub async fn restore(&self, state: HashMap<String, PendingRequest>) {
        *self.inner.lock().await = state;
    }

    /// Resolve each `request_id -> response` pair: remove it from the table and return a
    /// [`Message`] addressed back to the executor that originally issued the request. Responses
    /// are type-erased rather than one shared `T`, since distinct pending requests commonly expect
    /// distinct response shapes. Any `request_id` not present in the table is a caller error
    /// (`UnknownRequestId`), and no messages are produced for the call at all — a resume is
    /// all-or-nothing so a typo in one id can't silently resume the rest while leaving the table
    /// in a half-drained state.
    pub async fn resume(
        &self,
        responses: HashMap<String, Arc<dyn crate::message::Payload>>,
    ) -> Result<Vec<Message>> {
        let mut table = self.inner.lock().await;
        for request_id in responses.keys() {
            if !table.contains_key(request_id) {
                return Err(ProtocolError::UnknownRequestId(request_id.clone()).into());
            }
        }

        let mut messages = Vec::with_capacity(responses.len());
        for (request_id, response) in responses {
            let pending = table.remove(&request_id).expect("checked present above");
            messages.push(Message::from_erased(response, "__request_response__", Some(pending.source_executor_id)));
        }
        Ok(messages)
    }
}

/// Scope an interceptor claims: global, or a specific named sub-workflow.
pub type InterceptorScope = Option<String>;

/// A declared interceptor: an executor downstream of a [`RequestInfoExecutor`] that wants to
/// observe/transform responses for a given request type before they reach their original source.
/// Exists as a registration record for the validator's `InterceptorConflict` check — the
/// scheduler's delivery path does not yet branch on it beyond what ordinary edges already express.
#[derive(Debug, Clone)]
pub struct Interceptor {
    pub executor_id: String,
    pub request_type: String,
    pub scope: InterceptorScope,
}

impl Interceptor {
    pub fn new(executor_id: impl Into<String>, request_type: impl Into<String>, scope: InterceptorScope) -> Self {
        Self {
            executor_id: executor_id.into(),
            request_type: request_type.into(),
            scope,
        }
    }

    pub fn as_validator_tuple(&self) -> (String, String, Option<String>) {
        (self.executor_id.clone(), self.request_type.clone(), self.scope.clone())
    }
}

/// A handler body for the well-known executor that every `RequestInfo` payload is routed to. It
/// never forwards the payload itself — it records it in `pending` and lets the scheduler's
/// quiescence check decide whether the run should suspend.
pub struct RequestInfoExecutor {
    pending: Arc<PendingRequests>,
}

impl RequestInfoExecutor {
    pub fn new(pending: Arc<PendingRequests>) -> Self {
        Self { pending }
    }
}

impl crate::executor::Handler for RequestInfoExecutor {
    fn call<'a>(
        &'a self,
        payload: Arc<dyn crate::message::Payload>,
        ctx: &'a crate::executor::ExecutorContext<'a>,
    ) -> crate::executor::HandlerFuture<'a> {
        Box::pin(async move {
            let Some(request) = payload.as_any().downcast_ref::<RequestInfo>() else {
                return Err("RequestInfoExecutor received a payload that was not a RequestInfo".into());
            };
            self.pending.record(request.clone()).await;
            ctx.add_event(crate::event::WorkflowEvent::RequestInfoEvent {
                request_id: request.request_id.clone(),
                source_executor_id: request.source_executor_id.clone(),
                request_type: request.request_type.clone(),
                payload: request.payload.clone(),
            })
            .await;
            Ok(())
        })
    }
}
