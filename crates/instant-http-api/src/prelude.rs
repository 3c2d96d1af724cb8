//! # HTTP API Prelude
//!
//! ```rust
//! use instant_http_api::prelude::*;
//! ```

pub use crate::server::{InstantApiServer, InstantApiServerBuilder, ServerConfig};
pub use crate::handler::ApiHandler;
pub use crate::auth::{AllowAll, Authenticator};
pub use crate::Parts;
pub use crate::cors::CorsLayer;

pub use instant_api::prelude::*;

// Error types
pub use crate::{HttpApiError, Result};
