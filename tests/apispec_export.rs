//! The documentation endpoint for the Point service

use http::StatusCode;
use serde_json::json;

mod test_helpers;
use test_helpers::{point_api, point_server_builder};

#[tokio::test]
async fn test_apispec() {
    let api = point_api();
    let (status, spec) = api.get("/apispec_1.json").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        spec,
        json!({
            "swagger": "2.0",
            "info": {"title": "Instant API", "version": "0.0.1"},
            "tags": [{"name": "Point methods"}],
            "paths": {
                "/api/translate": {
                    "post": {
                        "summary": "Move a point by the given offsets.",
                        "description": "Move a point by the given offsets.\n\nA few `dy` values fail on purpose.",
                        "tags": ["Point methods"],
                        "operationId": "translate",
                        "consumes": ["application/json"],
                        "produces": ["application/json"],
                        "parameters": [{
                            "in": "body",
                            "name": "body",
                            "required": true,
                            "schema": {"$ref": "#/definitions/translate_params"}
                        }],
                        "responses": {
                            "200": {
                                "description": "Result of a successful call",
                                "schema": {"$ref": "#/definitions/Point"}
                            }
                        }
                    }
                }
            },
            "definitions": {
                "Point": {
                    "type": "object",
                    "description": "A point on the plane.",
                    "properties": {
                        "x": {"type": "integer"},
                        "y": {"type": "integer"}
                    },
                    "required": ["x", "y"]
                },
                "translate_params": {
                    "type": "object",
                    "properties": {
                        "p": {"$ref": "#/definitions/Point"},
                        "dx": {"type": "integer"},
                        "dy": {"type": "integer"}
                    },
                    "required": ["p", "dx", "dy"]
                }
            }
        })
    );
}

#[tokio::test]
async fn test_apispec_follows_configuration() {
    let (builder, _) = point_server_builder();
    let server = builder
        .api_path("/rpc/")
        .apispec_path("/docs.json")
        .title("Points")
        .version("2.1.0")
        .description("Grid geometry")
        .build()
        .unwrap();
    let handler = server.handler();

    let spec = handler.apispec();
    assert_eq!(
        spec["info"],
        json!({"title": "Points", "version": "2.1.0", "description": "Grid geometry"})
    );
    assert!(spec["paths"]["/rpc/translate"]["post"].is_object());
    assert!(spec["paths"].get("/api/translate").is_none());

    let request = http::Request::get("/docs.json")
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .unwrap();
    assert_eq!(handler.handle(request).await.status(), StatusCode::OK);

    let request = http::Request::post("/docs.json")
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .unwrap();
    assert_eq!(
        handler.handle(request).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
}
