//! HTTP request handler for JSON-RPC calls

use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use instant_api::{
    ApiSpecConfig, DispatchOutcome, DispatchReply, Dispatcher, ErrorKind, export_apispec,
};
use instant_json_rpc::{parse_calls, parse_method_call};

use crate::auth::{AllowAll, Authenticator};
use crate::{CorsLayer, ServerConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

enum Route<'a> {
    Root,
    Method(&'a str),
    ApiSpec,
    NotFound,
}

/// Routes HTTP requests onto a [`Dispatcher`].
///
/// Generic over the request body so it can be driven directly in tests as
/// well as by the hyper server.
#[derive(Clone)]
pub struct ApiHandler {
    config: Arc<ServerConfig>,
    dispatcher: Dispatcher,
    authenticator: Arc<dyn Authenticator>,
    apispec: Arc<Value>,
}

impl ApiHandler {
    /// Create a handler that lets every request through
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let spec_config = ApiSpecConfig {
            title: config.title.clone(),
            version: config.version.clone(),
            description: config.description.clone(),
            path_prefix: config.api_path.clone(),
        };
        let apispec = export_apispec(dispatcher.registry(), &spec_config);

        Self {
            config: Arc::new(config),
            dispatcher,
            authenticator: Arc::new(AllowAll),
            apispec: Arc::new(apispec),
        }
    }

    pub fn with_authenticator(self, authenticator: impl Authenticator) -> Self {
        self.with_shared_authenticator(Arc::new(authenticator))
    }

    pub fn with_shared_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The exported documentation served at `apispec_path`
    pub fn apispec(&self) -> &Value {
        &self.apispec
    }

    /// Handle one HTTP request
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let mut response = self.route(req).await;
        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }

    async fn route<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_string();
        debug!("Handling {} {}", parts.method, path);

        if parts.method == Method::OPTIONS {
            return preflight();
        }

        if !self.authenticator.is_authenticated(&parts).await {
            warn!("Rejected unauthenticated request: {} {}", parts.method, path);
            return text_response(StatusCode::FORBIDDEN, "Forbidden");
        }

        match self.resolve(&path) {
            Route::NotFound => text_response(StatusCode::NOT_FOUND, "Not Found"),
            Route::ApiSpec if parts.method == Method::GET => {
                json_response(StatusCode::OK, self.apispec.as_ref())
            }
            Route::ApiSpec => method_not_allowed("GET, OPTIONS"),
            Route::Root | Route::Method(_) if parts.method != Method::POST => {
                method_not_allowed("POST, OPTIONS")
            }
            Route::Root => match self.read_body(body).await {
                Ok(bytes) => self.handle_root(&bytes).await,
                Err(response) => response,
            },
            Route::Method(name) => match self.read_body(body).await {
                Ok(bytes) => self.handle_method(name, &bytes).await,
                Err(response) => response,
            },
        }
    }

    fn resolve<'a>(&self, path: &'a str) -> Route<'a> {
        if path == self.config.apispec_path {
            return Route::ApiSpec;
        }

        let base = self.config.api_path.trim_end_matches('/');
        if path == base {
            return Route::Root;
        }
        match path.strip_prefix(base).and_then(|rest| rest.strip_prefix('/')) {
            Some("") => Route::Root,
            Some(name) if self.dispatcher.registry().contains(name) => Route::Method(name),
            _ => Route::NotFound,
        }
    }

    async fn read_body<B>(&self, body: B) -> Result<Bytes, Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!("Request body too large (limit {} bytes)", self.config.max_body_size);
                Err(text_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                ))
            }
            Err(err) => {
                error!("Failed to read request body: {}", err);
                Err(text_response(
                    StatusCode::BAD_REQUEST,
                    "Failed to read request body",
                ))
            }
        }
    }

    /// Generic endpoint. Rejected bodies are still answered with 200 here.
    async fn handle_root(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let reply = match parse_calls(body) {
            Ok(parsed) => self.dispatcher.dispatch_request(parsed).await,
            Err(rejected) => {
                warn!("Rejected request body: {}", rejected);
                DispatchReply::Single(DispatchOutcome::rejected(rejected))
            }
        };

        match reply {
            DispatchReply::Single(outcome) => {
                let status = match outcome.kind {
                    Some(ErrorKind::ParseError | ErrorKind::InvalidRequest) => StatusCode::OK,
                    _ => outcome.http_status,
                };
                json_response(status, &outcome.message)
            }
            DispatchReply::Batch(messages) => json_response(StatusCode::OK, &messages),
            DispatchReply::Empty => no_content(),
        }
    }

    /// Method path. Status always follows the classification.
    async fn handle_method(&self, method: &str, body: &[u8]) -> Response<Full<Bytes>> {
        let call = match parse_method_call(method, body) {
            Ok(call) => call,
            Err(rejected) => {
                warn!("Rejected request body for '{}': {}", method, rejected);
                let outcome = DispatchOutcome::rejected(rejected);
                return json_response(outcome.http_status, &outcome.message);
            }
        };

        match self.dispatcher.dispatch(call).await {
            Some(outcome) => json_response(outcome.http_status, &outcome.message),
            None => no_content(),
        }
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(err) => {
            error!("Failed to serialize response: {}", err);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn no_content() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Handle OPTIONS preflight requests
fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    response.headers_mut().insert(
        ALLOW,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use instant_api::{MethodBuilder, MethodError, Registry};
    use serde_json::json;

    fn create_test_handler() -> ApiHandler {
        let add = MethodBuilder::new("add")
            .param::<i64>("a")
            .param::<i64>("b")
            .handler(|mut args| async move {
                let a: i64 = args.take("a")?;
                let b: i64 = args.take("b")?;
                Ok::<_, MethodError>(a + b)
            });
        let registry = Registry::builder().method(add).build().unwrap();
        ApiHandler::new(ServerConfig::default(), Dispatcher::new(registry))
    }

    fn post(path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::post(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_and_method_path_agree() {
        let handler = create_test_handler();

        let root = handler
            .handle(post(
                "/api/",
                r#"{"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}, "id": null}"#,
            ))
            .await;
        // id null at the root is a notification
        assert_eq!(root.status(), StatusCode::NO_CONTENT);

        let root = handler
            .handle(post(
                "/api/",
                r#"{"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}, "id": 3}"#,
            ))
            .await;
        assert_eq!(root.status(), StatusCode::OK);
        assert_eq!(
            body_json(root).await,
            json!({"id": 3, "jsonrpc": "2.0", "result": 3})
        );

        let direct = handler.handle(post("/api/add", r#"{"a": 1, "b": 2}"#)).await;
        assert_eq!(direct.status(), StatusCode::OK);
        assert_eq!(
            direct.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            body_json(direct).await,
            json!({"id": null, "jsonrpc": "2.0", "result": 3})
        );
    }

    #[tokio::test]
    async fn test_parse_error_status_depends_on_path() {
        let handler = create_test_handler();
        let expected = json!({
            "error": {"code": -32700, "message": "Parse error"},
            "id": null,
            "jsonrpc": "2.0"
        });

        let root = handler.handle(post("/api/", "foo")).await;
        assert_eq!(root.status(), StatusCode::OK);
        assert_eq!(body_json(root).await, expected);

        let direct = handler.handle(post("/api/add", "foo")).await;
        assert_eq!(direct.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(direct).await, expected);
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let handler = create_test_handler();

        let unknown = handler.handle(post("/api/missing", "{}")).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let elsewhere = handler.handle(post("/other", "{}")).await;
        assert_eq!(elsewhere.status(), StatusCode::NOT_FOUND);

        let get = Request::get("/api/add")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handler.handle(get).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_options_request() {
        let handler = create_test_handler();
        let request = Request::options("/api/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_body_limit() {
        let config = ServerConfig {
            max_body_size: 16,
            ..ServerConfig::default()
        };
        let registry = Registry::builder().build().unwrap();
        let handler = ApiHandler::new(config, Dispatcher::new(registry));
        let response = handler
            .handle(post("/api/", &format!("[{}]", "1,".repeat(64) + "1")))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_forbidden_skips_dispatch() {
        let handler = create_test_handler().with_authenticator(|_: &http::request::Parts| false);
        let response = handler.handle(post("/api/add", r#"{"a": 1, "b": 2}"#)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Forbidden");
    }

    #[tokio::test]
    async fn test_apispec_endpoint() {
        let handler = create_test_handler();
        let request = Request::get("/apispec_1.json")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let spec = body_json(response).await;
        assert!(spec["paths"]["/api/add"]["post"].is_object());
        assert_eq!(&spec, handler.apispec());
    }
}
