//! # Instant API Client
//!
//! A small JSON-RPC 2.0 client for services exposed with `instant-http-api`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use instant_api_client::InstantClient;
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = InstantClient::new("http://127.0.0.1:8000/api/");
//!
//!     let moved: Value = client
//!         .call("translate", json!({"p": {"x": 1, "y": 2}, "dx": 3, "dy": 4}))
//!         .await?;
//!     println!("{}", moved);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;

pub use client::InstantClient;
pub use error::{ClientError, ClientResult};
