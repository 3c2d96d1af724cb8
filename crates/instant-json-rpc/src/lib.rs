//! # JSON-RPC 2.0 Wire Layer
//!
//! Transport-agnostic JSON-RPC 2.0 types and request parsing used by the
//! instant-api dispatcher. This crate knows nothing about registered methods,
//! HTTP, or argument types; it only turns raw request bytes into call records
//! and defines the envelopes written back to clients.
//!
//! ## Features
//! - Single calls, notifications, and batches
//! - Whole-request parse errors that never partially succeed
//! - Per-element `Invalid Request` errors inside batches
//! - Method-path calls where the method name comes from the route

pub mod dispatch;
pub mod error;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use dispatch::{CallResult, ParsedRequest, parse_calls, parse_method_call};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use request::{CallRecord, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
