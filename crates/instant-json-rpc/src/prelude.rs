//! # JSON-RPC Prelude
//!
//! ```rust
//! use instant_json_rpc::prelude::*;
//! ```

pub use crate::dispatch::{CallResult, ParsedRequest, parse_calls, parse_method_call};
pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::request::{CallRecord, RequestParams};
pub use crate::response::{JsonRpcMessage, JsonRpcResponse};
pub use crate::types::{JsonRpcVersion, RequestId};

pub use crate::error_codes::*;
