//! Authentication gate
//!
//! Consulted with the request head before the body is read. Returning
//! `false` answers `403 Forbidden` and skips dispatch entirely.

use async_trait::async_trait;
use http::request::Parts;

#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn is_authenticated(&self, parts: &Parts) -> bool;
}

/// Lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn is_authenticated(&self, _parts: &Parts) -> bool {
        true
    }
}

#[async_trait]
impl<F> Authenticator for F
where
    F: Fn(&Parts) -> bool + Send + Sync + 'static,
{
    async fn is_authenticated(&self, parts: &Parts) -> bool {
        (self)(parts)
    }
}
