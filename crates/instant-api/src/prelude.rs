//! Prelude module for common imports
//!
//! ```rust
//! use instant_api::prelude::*;
//! ```

pub use instant_json_rpc::prelude::*;

pub use crate::{
    ApiSpecConfig, DispatchOutcome, DispatchReply, Dispatcher, export_apispec,
};

pub use crate::{
    DispatchException, ErrorKind, InstantError, MethodError, MethodResult,
};

pub use crate::{
    BoundArgs, MethodBuilder, Registry, RegistryError, RpcMethod, RpcService,
};

pub use crate::{Describe, Record, RecordDescriptor, TypeDescriptor, methods};
