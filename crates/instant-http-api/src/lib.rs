//! # Instant API over HTTP
//!
//! Serves an Instant API [`Registry`](instant_api::Registry) over HTTP/1.1:
//!
//! - `POST /api/` - generic JSON-RPC endpoint, single calls and batches
//! - `POST /api/<method>` - one path per method, body holds only the params
//! - `GET /apispec_1.json` - Swagger document for every registered method
//!
//! An [`Authenticator`] is consulted before anything is parsed; a refusal is
//! answered with `403 Forbidden` and never reaches the dispatcher.

pub mod auth;
pub mod cors;
pub mod handler;
pub mod prelude;
pub mod server;

// Re-export main types
pub use auth::{AllowAll, Authenticator};
pub use cors::CorsLayer;
pub use handler::ApiHandler;
pub use server::{InstantApiServer, InstantApiServerBuilder, ServerConfig};

/// Request head handed to an [`Authenticator`]
pub use http::request::Parts;

/// Result type for HTTP API operations
pub type Result<T> = std::result::Result<T, HttpApiError>;

/// HTTP API specific errors
#[derive(Debug, thiserror::Error)]
pub enum HttpApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] instant_api::RegistryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
