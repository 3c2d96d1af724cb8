//! # Point Server
//!
//! Exposes a few geometry methods over JSON-RPC.
//!
//! ## Usage
//! ```bash
//! cargo run --package point-server -- --port 8000
//! ```
//!
//! ## Try it
//! ```bash
//! curl -s localhost:8000/api/translate -d '{"p": {"x": 1, "y": 2}, "dx": 3, "dy": 4}'
//! curl -s localhost:8000/api/ -d '{"jsonrpc": "2.0", "method": "translate", "params": [{"x": 1, "y": 2}, 3, 4], "id": 1}'
//! curl -s localhost:8000/apispec_1.json
//! ```
//!
//! `translate` fails on purpose for a few `dy` values:
//! - `-8` unhandled error (500, details only in the server log)
//! - `-9` domain error with its own code and HTTP 401
//! - `-10` protocol error with its own code (500)

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use instant_api::{DispatchException, InstantError, MethodResult, Record, StatusCode};
use instant_http_api::{InstantApiServer, Parts};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Require `Authorization: Bearer <token>` on every request
    #[arg(long)]
    token: Option<String>,
}

/// A point on the integer grid.
#[derive(Debug, Clone, Copy, PartialEq, Record, Serialize, Deserialize)]
struct Point {
    x: i64,
    y: i64,
}

struct Methods;

#[instant_api::methods(tags = ["Point methods"])]
impl Methods {
    /// Move a point by the given offsets.
    ///
    /// Some `dy` values raise errors, to show how each kind is reported.
    pub fn translate(&self, p: Point, dx: i64, dy: i64) -> MethodResult<Point> {
        match dy {
            -8 => Err(anyhow::anyhow!("dy == -8: unhandled error").into()),
            -9 => Err(InstantError::new(12345, "This is an instant message")
                .with_data(json!({"foo": 123}))
                .with_http_status(StatusCode::UNAUTHORIZED)
                .into()),
            -10 => Err(DispatchException::new(45678, "This is a JSON RPC message")
                .with_data(json!({"foo": 456}))
                .into()),
            _ => Ok(Point {
                x: p.x + dx,
                y: p.y + dy,
            }),
        }
    }

    /// Mean of the given points, rounded toward zero.
    pub fn centroid(&self, points: Vec<Point>) -> Option<Point> {
        let n = points.len() as i64;
        if n == 0 {
            return None;
        }
        let (sx, sy) = points
            .iter()
            .fold((0, 0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point { x: sx / n, y: sy / n })
    }

    /// Manhattan distance between two points.
    pub fn distance(&self, a: Point, #[param(default = Point { x: 0, y: 0 })] b: Point) -> i64 {
        (a.x - b.x).abs() + (a.y - b.y).abs()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = InstantApiServer::builder()
        .service(Methods)
        .bind_address(SocketAddr::from(([127, 0, 0, 1], args.port)))
        .title("Point API")
        .version(env!("CARGO_PKG_VERSION"))
        .description("Translate and measure points on the integer grid");

    if let Some(token) = args.token {
        info!("Bearer token required on every request");
        let expected = format!("Bearer {}", token);
        builder = builder.authenticator(move |parts: &Parts| {
            parts
                .headers
                .get("Authorization")
                .is_some_and(|value| value.as_bytes() == expected.as_bytes())
        });
    }

    let server = builder.build()?;
    server.run().await?;
    Ok(())
}
