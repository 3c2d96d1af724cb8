//! Request parsing: raw body bytes into call records.
//!
//! Syntax failures reject the whole body with a single `Parse error`.
//! Structural failures of an individual call become an `Invalid Request`
//! for that call only, so one bad batch element never hides its siblings.

use serde_json::{Map, Value};

use crate::error::JsonRpcError;
use crate::request::{CallRecord, RequestParams};
use crate::types::RequestId;
use crate::JSONRPC_VERSION;

/// Outcome of parsing a single call
pub type CallResult = Result<CallRecord, JsonRpcError>;

/// A decoded request body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRequest {
    /// One call object
    Single(CallResult),
    /// A non-empty array of call objects, in the order received
    Batch(Vec<CallResult>),
}

impl ParsedRequest {
    pub fn is_batch(&self) -> bool {
        matches!(self, ParsedRequest::Batch(_))
    }

    /// Number of logical calls in the body
    pub fn len(&self) -> usize {
        match self {
            ParsedRequest::Single(_) => 1,
            ParsedRequest::Batch(calls) => calls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a body received on the generic endpoint, where each call names its
/// own method.
pub fn parse_calls(body: &[u8]) -> Result<ParsedRequest, JsonRpcError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| JsonRpcError::parse_error())?;

    match value {
        Value::Array(items) if items.is_empty() => {
            Err(JsonRpcError::invalid_request(RequestId::Null))
        }
        Value::Array(items) => Ok(ParsedRequest::Batch(
            items.into_iter().map(parse_call).collect(),
        )),
        other => Ok(ParsedRequest::Single(parse_call(other))),
    }
}

/// Parse a body received on a method-specific path.
///
/// The body is either the bare params (object or array, or nothing at all),
/// answered with `id: null`, or a complete envelope whose `method` member is
/// replaced by the one taken from the path.
pub fn parse_method_call(method: &str, body: &[u8]) -> Result<CallRecord, JsonRpcError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CallRecord::new(RequestId::Null, method, None));
    }

    let value: Value = serde_json::from_slice(body).map_err(|_| JsonRpcError::parse_error())?;

    match value {
        Value::Object(mut obj) if obj.contains_key("jsonrpc") => {
            obj.insert("method".to_string(), Value::String(method.to_string()));
            parse_call(Value::Object(obj))
        }
        Value::Object(obj) => Ok(CallRecord::new(
            RequestId::Null,
            method,
            Some(RequestParams::Object(obj)),
        )),
        Value::Array(items) => Ok(CallRecord::new(
            RequestId::Null,
            method,
            Some(RequestParams::Array(items)),
        )),
        _ => Err(JsonRpcError::invalid_request(RequestId::Null)),
    }
}

fn parse_call(value: Value) -> CallResult {
    let Value::Object(mut obj) = value else {
        return Err(JsonRpcError::invalid_request(RequestId::Null));
    };

    let id = read_id(&obj)?;
    let error_id = id.clone().unwrap_or(RequestId::Null);

    match obj.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        _ => return Err(JsonRpcError::invalid_request(error_id)),
    }

    let method = match obj.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(JsonRpcError::invalid_request(error_id)),
    };

    let params = match obj.remove("params") {
        None => None,
        Some(raw) => match RequestParams::from_value(raw) {
            Some(params) => Some(params),
            None => return Err(JsonRpcError::invalid_request(error_id)),
        },
    };

    Ok(CallRecord { id, method, params })
}

/// `Ok(None)` for notifications (id absent or `null`); an id of a type
/// JSON-RPC does not allow is an invalid request.
fn read_id(obj: &Map<String, Value>) -> Result<Option<RequestId>, JsonRpcError> {
    match obj.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => RequestId::from_value(raw)
            .map(Some)
            .ok_or_else(|| JsonRpcError::invalid_request(RequestId::Null)),
    }
}
