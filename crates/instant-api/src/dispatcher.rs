//! Per-call dispatch
//!
//! resolve → bind → coerce → invoke → coerce result. Every failure along
//! the way becomes a [`Failure`], is classified, and comes back as an error
//! envelope; nothing raw ever escapes [`Dispatcher::dispatch`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use instant_json_rpc::{
    CallRecord, JsonRpcError, JsonRpcMessage, ParsedRequest, RequestId, RequestParams,
};

use crate::coerce::{Validator, coerce_out};
use crate::error::{BindError, ErrorClassification, ErrorKind, Failure, MethodError, classify};
use crate::registry::{BoundArgs, MethodDescriptor, Registry};

/// Envelope plus the HTTP status it should be sent with
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub message: JsonRpcMessage,
    pub http_status: StatusCode,
    /// `None` on success
    pub kind: Option<ErrorKind>,
}

impl DispatchOutcome {
    fn success(id: RequestId, result: Value) -> Self {
        Self {
            message: JsonRpcMessage::success(id, result),
            http_status: StatusCode::OK,
            kind: None,
        }
    }

    fn failure(id: RequestId, classification: ErrorClassification) -> Self {
        Self {
            http_status: classification.http_status,
            kind: Some(classification.kind),
            message: JsonRpcMessage::Error(classification.into_envelope(id)),
        }
    }

    /// Outcome for a body or batch element the parser refused
    pub fn rejected(error: JsonRpcError) -> Self {
        let id = error.id.clone();
        Self::failure(id, classify(&Failure::Rejected(error)))
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_some()
    }
}

/// What a whole request body produced
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchReply {
    Single(DispatchOutcome),
    /// Responses for the non-notification calls, in request order
    Batch(Vec<JsonRpcMessage>),
    /// Only notifications were received
    Empty,
}

/// Dispatches calls against a frozen [`Registry`].
///
/// Holds no mutable state; clone freely and share between tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Run one call. Notifications execute fully but yield `None`.
    pub async fn dispatch(&self, call: CallRecord) -> Option<DispatchOutcome> {
        let notification = call.is_notification();
        let id = call.response_id();
        let method = call.method.clone();

        debug!("Dispatching '{}' (id: {})", method, id);

        let outcome = match self.execute(call).await {
            Ok(result) => DispatchOutcome::success(id, result),
            Err(failure) => {
                log_failure(&failure);
                DispatchOutcome::failure(id, classify(&failure))
            }
        };

        if notification {
            debug!("Notification '{}' completed, no response", method);
            None
        } else {
            Some(outcome)
        }
    }

    /// Run everything in a parsed body. Batch elements run concurrently and
    /// their responses keep request order.
    pub async fn dispatch_request(&self, request: ParsedRequest) -> DispatchReply {
        match request {
            ParsedRequest::Single(Ok(call)) => match self.dispatch(call).await {
                Some(outcome) => DispatchReply::Single(outcome),
                None => DispatchReply::Empty,
            },
            ParsedRequest::Single(Err(rejected)) => {
                DispatchReply::Single(DispatchOutcome::rejected(rejected))
            }
            ParsedRequest::Batch(calls) => {
                debug!("Dispatching batch of {} calls", calls.len());
                let pending = calls.into_iter().map(|call| async move {
                    match call {
                        Ok(call) => self.dispatch(call).await.map(|o| o.message),
                        Err(rejected) => Some(DispatchOutcome::rejected(rejected).message),
                    }
                });
                let messages: Vec<JsonRpcMessage> =
                    join_all(pending).await.into_iter().flatten().collect();
                if messages.is_empty() {
                    DispatchReply::Empty
                } else {
                    DispatchReply::Batch(messages)
                }
            }
        }
    }

    async fn execute(&self, call: CallRecord) -> Result<Value, Failure> {
        let CallRecord { method, params, .. } = call;

        let Some(handle) = self.registry.get(&method) else {
            return Err(Failure::MethodNotFound);
        };
        let descriptor = handle.descriptor();

        let supplied = bind(descriptor, params).map_err(Failure::Bind)?;

        let mut validator = Validator::new();
        let mut values = Map::new();
        for param in &descriptor.params {
            match supplied.get(&param.name) {
                Some(raw) => {
                    let coerced = validator.field(&param.name, raw, &param.ty);
                    values.insert(param.name.clone(), coerced);
                }
                None => {
                    if let Some(default) = &param.default {
                        values.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        validator.finish().map_err(Failure::Validation)?;

        let args = BoundArgs::new(method.clone(), values);
        let invoked = AssertUnwindSafe(async { handle.invoke(args).await })
            .catch_unwind()
            .await;

        match invoked {
            Err(_) => Err(Failure::Panic { method }),
            Ok(Err(error)) => Err(Failure::Method { method, error }),
            Ok(Ok(result)) => coerce_out(result, &descriptor.returns)
                .map_err(|error| Failure::Outbound { method, error }),
        }
    }
}

/// Map positional or named arguments onto the declared parameters.
///
/// Only supplied values are returned; defaults are applied afterwards so
/// they bypass validation.
pub fn bind(
    descriptor: &MethodDescriptor,
    params: Option<RequestParams>,
) -> Result<Map<String, Value>, BindError> {
    let supplied = match params {
        None => Map::new(),
        Some(RequestParams::Object(named)) => named,
        Some(RequestParams::Array(positional)) => {
            if positional.len() > descriptor.params.len() {
                return Err(BindError::TooManyPositional);
            }
            descriptor
                .params
                .iter()
                .map(|p| p.name.clone())
                .zip(positional)
                .collect()
        }
    };

    if let Some(missing) = descriptor
        .params
        .iter()
        .find(|p| !p.has_default() && !supplied.contains_key(&p.name))
    {
        return Err(BindError::Missing(missing.name.clone()));
    }

    if let Some(unknown) = supplied.keys().find(|k| descriptor.param(k).is_none()) {
        return Err(BindError::UnexpectedKeyword(unknown.clone()));
    }

    Ok(supplied)
}

fn log_failure(failure: &Failure) {
    match failure {
        Failure::Method { method, error } => match error {
            MethodError::Unhandled(e) => {
                error!("Unhandled error in method {}: {:#}", method, e);
            }
            other => debug!("Method '{}' raised: {}", method, other),
        },
        Failure::Outbound { method, error } => {
            error!("Unhandled error in method {}: {}", method, error);
        }
        Failure::Panic { method } => {
            error!("Unhandled error in method {}: method panicked", method);
        }
        Failure::MethodNotFound => warn!("Method not found"),
        Failure::Bind(e) => debug!("Argument binding failed: {}", e),
        Failure::Validation(e) => debug!("Validation failed: {}", e),
        Failure::Rejected(e) => warn!("Rejected request: {}", e),
    }
}
