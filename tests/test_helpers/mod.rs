//! Shared fixtures for the integration tests
//!
//! A `Point` service exposed through `#[instant_api::methods]`, plus helpers
//! that drive an [`ApiHandler`] in-process without binding a socket.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use instant_api::{DispatchException, InstantError, MethodResult, Record, Registry};
use instant_http_api::{ApiHandler, InstantApiServer, InstantApiServerBuilder, Parts};

/// A point on the plane.
#[derive(Debug, Clone, Copy, PartialEq, Record, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// The plain computation behind `translate`
pub fn translate_point(p: Point, dx: i64, dy: i64) -> Point {
    Point {
        x: p.x + dx,
        y: p.y + dy,
    }
}

pub struct Methods {
    calls: Arc<AtomicUsize>,
}

#[instant_api::methods(tags = ["Point methods"])]
impl Methods {
    /// Move a point by the given offsets.
    ///
    /// A few `dy` values fail on purpose.
    pub fn translate(&self, p: Point, dx: i64, dy: i64) -> MethodResult<Point> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match dy {
            -8 => Err(anyhow::anyhow!("dy == -8: Unhandled ValueError").into()),
            -9 => Err(InstantError::new(12345, "This is an instant message")
                .with_data(json!({"foo": 123}))
                .with_http_status(StatusCode::UNAUTHORIZED)
                .into()),
            -10 => Err(DispatchException::new(45678, "This is a JSON RPC message")
                .with_data(json!({"foo": 456}))
                .into()),
            _ => Ok(translate_point(p, dx, dy)),
        }
    }
}

/// Handler over the `Point` service plus its invocation counter
pub struct TestApi {
    pub handler: ApiHandler,
    pub calls: Arc<AtomicUsize>,
}

impl TestApi {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// POST raw bytes, returning the status and raw body
    pub async fn post_raw(&self, path: &str, body: &str) -> (StatusCode, Bytes) {
        let request = Request::post(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap();
        let response = self.handler.handle(request).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    /// POST a JSON value and decode the JSON reply
    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let (status, bytes) = self.post_raw(path, &body.to_string()).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::get(path).body(Full::new(Bytes::new())).unwrap();
        let response = self.handler.handle(request).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }
}

/// Server builder with the `Point` service registered
pub fn point_server_builder() -> (InstantApiServerBuilder, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let builder = InstantApiServer::builder().service(Methods {
        calls: Arc::clone(&calls),
    });
    (builder, calls)
}

/// Bare registry with the `Point` service, for driving a `Dispatcher`
/// without HTTP
pub fn point_registry() -> (Registry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = Registry::builder()
        .service(Methods {
            calls: Arc::clone(&calls),
        })
        .build()
        .unwrap();
    (registry, calls)
}

pub fn point_api() -> TestApi {
    let (builder, calls) = point_server_builder();
    let server = builder.build().unwrap();
    TestApi {
        handler: server.handler().clone(),
        calls,
    }
}

pub fn point_api_with_auth(allow: fn(&Parts) -> bool) -> TestApi {
    let (builder, calls) = point_server_builder();
    let server = builder.authenticator(allow).build().unwrap();
    TestApi {
        handler: server.handler().clone(),
        calls,
    }
}
