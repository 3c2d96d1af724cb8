//! Error types for client operations

use serde_json::Value;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Network/connection errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a JSON-RPC error envelope
    #[error("Server error (code {code}, HTTP {http_status}): {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
        http_status: u16,
    },

    /// Params must serialize to a JSON object, array or null
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The server answered with something that is not a JSON-RPC reply
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// JSON-RPC error code, when the server sent one
    pub fn code(&self) -> Option<i64> {
        match self {
            ClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Rpc { http_status, .. } => Some(*http_status),
            _ => None,
        }
    }
}
