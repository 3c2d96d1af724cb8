//! # Instant API Derive Macros
//!
//! - `#[derive(Record)]` - describe a struct as a composite record type
//! - `#[methods]` - expose the public methods of an `impl` block
//!
//! Both expand to code naming `::instant_api`, so use them through the
//! re-exports in that crate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use instant_api::{Record, MethodResult};
//!
//! #[derive(Record, serde::Serialize, serde::Deserialize)]
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
//!     pub fn translate(&self, p: Point, dx: i64, #[param(default = 0)] dy: i64) -> Point {
//!         Point { x: p.x + dx, y: p.y + dy }
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, Meta, Token, parse_macro_input, punctuated::Punctuated};

mod methods_attr;
mod record_derive;
mod utils;

/// Derive `instant_api::Describe` for a struct with named fields.
///
/// # Attributes
///
/// - `#[record(name = "...")]` on the struct - record name in documents
/// - `#[record(default)]` on the struct or a field - fields may be omitted
/// - `#[serde(rename = "...")]`, `#[serde(rename_all = "...")]`,
///   `#[serde(default)]` and `#[serde(skip)]` are honoured
///
/// `Option<T>` fields may always be omitted. A field whose type names the
/// record itself is a compile error; records cannot be recursive.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record_derive::derive_record_impl(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Expose every `pub fn` / `pub async fn` taking `&self` in an inherent
/// `impl` block, and implement `instant_api::RpcService` for the type.
///
/// # Arguments
///
/// - `tags = ["..."]` - documentation tags applied to every method
///
/// # Method and parameter attributes
///
/// - `#[rpc(name = "...")]` - expose under another name
/// - `#[rpc(skip)]` - keep a public method off the wire
/// - `#[param(default = <expr>)]` - value used when the caller omits it
///
/// Methods returning `Result<T, E>` declare `T` as their return type and
/// need `E: Into<instant_api::MethodError>`; any other return type is
/// always a success.
#[proc_macro_attribute]
pub fn methods(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input = parse_macro_input!(input as ItemImpl);
    methods_attr::methods_impl(args, input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
