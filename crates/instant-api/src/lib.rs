//! # Instant API
//!
//! Expose the methods of a plain Rust value as a JSON-RPC 2.0 service.
//!
//! Each exposed method is registered once, together with an explicit
//! description of its parameters and return type. At call time the
//! dispatcher binds positional or named arguments onto that description,
//! validates and coerces them, invokes the method, and turns the outcome
//! (or any failure) into a JSON-RPC envelope plus an HTTP status.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use instant_api::{Record, Registry, Dispatcher, MethodResult};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Record, Serialize, Deserialize)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! struct Methods;
//!
//! #[instant_api::methods(tags = ["Point methods"])]
//! impl Methods {
//!     /// Move a point by the given offsets.
//!     pub fn translate(&self, p: Point, dx: i64, dy: i64) -> MethodResult<Point> {
//!         Ok(Point { x: p.x + dx, y: p.y + dy })
//!     }
//! }
//!
//! let registry = Registry::builder().service(Methods).build()?;
//! let dispatcher = Dispatcher::new(registry);
//! ```
//!
//! ## Code Organization
//!
//! - [`schema`]: type descriptors and the [`Describe`] trait
//! - [`coerce`]: inbound validation/coercion and outbound marshalling
//! - [`registry`]: method descriptors and typed invocable handles
//! - [`dispatcher`]: the per-call state machine
//! - [`error`]: the error taxonomy and its classification
//! - [`apispec`]: read-only documentation export

// Lets the derive macros name `::instant_api` from inside this crate's own tests.
extern crate self as instant_api;

pub mod apispec;
pub mod coerce;
pub mod dispatcher;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod schema;

pub use apispec::{ApiSpecConfig, export_apispec};
pub use coerce::{OutboundError, ValidationErrors, coerce_in, coerce_out};
pub use dispatcher::{DispatchOutcome, DispatchReply, Dispatcher};
pub use error::{
    BindError, DispatchException, ErrorClassification, ErrorKind, Failure, InstantError,
    MethodError, MethodResult, classify,
};
pub use registry::{
    BoundArgs, MethodBuilder, MethodDescriptor, ParameterSpec, Registry, RegistryBuilder,
    RegistryError, RpcMethod, RpcService,
};
pub use schema::{Describe, FieldSpec, RecordDescriptor, TypeDescriptor};

pub use instant_api_derive::{Record, methods};

// Re-export foundational types
pub use http::StatusCode;
pub use instant_json_rpc as json_rpc;

#[doc(hidden)]
pub mod __private {
    pub use futures::future::BoxFuture;
    pub use serde_json;
}
