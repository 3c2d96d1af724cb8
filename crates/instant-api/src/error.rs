//! Error taxonomy and classification
//!
//! Everything that can go wrong between parsing and writing a response is a
//! [`Failure`]. [`classify`] maps each one onto exactly one
//! [`ErrorClassification`]: wire code, message, optional data and the HTTP
//! status the transport should use.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use instant_json_rpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, RequestId, error_codes,
};

use crate::coerce::{OutboundError, ValidationErrors};

/// Result type returned by exposed methods
pub type MethodResult<T> = Result<T, MethodError>;

/// The fixed set of failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    MissingArgument,
    ValidationError,
    Unhandled,
    /// Raised by a method with its own code, message, data and status
    Domain,
    /// Raised by a method in JSON-RPC shape, without a status
    Protocol,
}

/// A failure resolved to everything needed on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
    pub http_status: StatusCode,
}

impl ErrorClassification {
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject {
            code: self.code,
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }

    pub fn into_envelope(self, id: RequestId) -> JsonRpcError {
        JsonRpcError::new(
            id,
            JsonRpcErrorObject {
                code: self.code,
                message: self.message,
                data: self.data,
            },
        )
    }
}

/// Domain error raised by a method, surfaced verbatim including its HTTP
/// status.
///
/// ```rust,ignore
/// return Err(InstantError::new(12345, "This is a test error")
///     .with_data(json!({"foo": 123}))
///     .with_http_status(StatusCode::UNAUTHORIZED)
///     .into());
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct InstantError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
    pub http_status: StatusCode,
}

impl InstantError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            http_status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_http_status(mut self, status: StatusCode) -> Self {
        self.http_status = status;
        self
    }
}

/// Error already expressed as a JSON-RPC error object; answered with 500
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DispatchException {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl DispatchException {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<JsonRpcErrorObject> for DispatchException {
    fn from(object: JsonRpcErrorObject) -> Self {
        Self {
            code: object.code,
            message: object.message,
            data: object.data,
        }
    }
}

/// Error returned from an exposed method
#[derive(Debug, Error)]
pub enum MethodError {
    #[error(transparent)]
    Instant(#[from] InstantError),
    #[error(transparent)]
    Protocol(#[from] DispatchException),
    /// Anything else; details are logged, never sent
    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl MethodError {
    pub fn unhandled<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MethodError::Unhandled(anyhow::Error::new(error))
    }

    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        MethodError::Unhandled(anyhow::Error::msg(message))
    }
}

impl From<serde_json::Error> for MethodError {
    fn from(error: serde_json::Error) -> Self {
        MethodError::unhandled(error)
    }
}

/// Argument binding failures, worded like a call-site signature mismatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("missing a required argument: '{0}'")]
    Missing(String),
    #[error("too many positional arguments")]
    TooManyPositional,
    #[error("got an unexpected keyword argument '{0}'")]
    UnexpectedKeyword(String),
}

/// Anything that can stop a call from producing a result
#[derive(Debug)]
pub enum Failure {
    /// Rejected by the parser before dispatch
    Rejected(JsonRpcError),
    MethodNotFound,
    Bind(BindError),
    Validation(ValidationErrors),
    Method { method: String, error: MethodError },
    Outbound { method: String, error: OutboundError },
    Panic { method: String },
}

fn unhandled(method: &str) -> ErrorClassification {
    ErrorClassification {
        kind: ErrorKind::Unhandled,
        code: error_codes::INTERNAL_ERROR,
        message: format!("Unhandled error in method {}", method),
        data: None,
        http_status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a failure onto its wire representation
pub fn classify(failure: &Failure) -> ErrorClassification {
    match failure {
        Failure::Rejected(rejected) => {
            let kind = if rejected.code() == error_codes::PARSE_ERROR {
                ErrorKind::ParseError
            } else {
                ErrorKind::InvalidRequest
            };
            ErrorClassification {
                kind,
                code: rejected.error.code,
                message: rejected.error.message.clone(),
                data: rejected.error.data.clone(),
                // Root endpoint answers these with 200; see the transport
                http_status: StatusCode::BAD_REQUEST,
            }
        }
        Failure::MethodNotFound => ErrorClassification {
            kind: ErrorKind::MethodNotFound,
            code: error_codes::METHOD_NOT_FOUND,
            message: JsonRpcErrorCode::MethodNotFound.message().to_string(),
            data: None,
            http_status: StatusCode::INTERNAL_SERVER_ERROR,
        },
        Failure::Bind(error) => ErrorClassification {
            kind: ErrorKind::MissingArgument,
            code: error_codes::INVALID_PARAMS,
            message: format!("TypeError: {}", error),
            data: Some(Value::Null),
            http_status: StatusCode::BAD_REQUEST,
        },
        Failure::Validation(errors) => ErrorClassification {
            kind: ErrorKind::ValidationError,
            code: error_codes::INVALID_PARAMS,
            message: format!("ValidationError: {}", errors.summary()),
            data: Some(errors.to_data()),
            http_status: StatusCode::BAD_REQUEST,
        },
        Failure::Method { method, error } => match error {
            MethodError::Instant(e) => ErrorClassification {
                kind: ErrorKind::Domain,
                code: e.code,
                message: e.message.clone(),
                data: e.data.clone(),
                http_status: e.http_status,
            },
            MethodError::Protocol(e) => ErrorClassification {
                kind: ErrorKind::Protocol,
                code: e.code,
                message: e.message.clone(),
                data: e.data.clone(),
                http_status: StatusCode::INTERNAL_SERVER_ERROR,
            },
            MethodError::Unhandled(_) => unhandled(method),
        },
        Failure::Outbound { method, .. } | Failure::Panic { method } => unhandled(method),
    }
}
