//! HTTP server for Instant API services

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use instant_api::{Dispatcher, Registry, RegistryBuilder, RpcMethod, RpcService};

use crate::auth::Authenticator;
use crate::{ApiHandler, HttpApiError, Result};

/// Configuration for the HTTP API server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Generic JSON-RPC endpoint; method paths hang off it
    pub api_path: String,
    /// Where the Swagger document is served
    pub apispec_path: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            api_path: "/api/".to_string(),
            apispec_path: "/apispec_1.json".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            title: "Instant API".to_string(),
            version: "0.0.1".to_string(),
            description: None,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        for (name, path) in [("api_path", &self.api_path), ("apispec_path", &self.apispec_path)] {
            if !path.starts_with('/') {
                return Err(HttpApiError::InvalidConfig(format!(
                    "{} must start with '/', got '{}'",
                    name, path
                )));
            }
        }
        if self.api_path.trim_end_matches('/') == self.apispec_path.trim_end_matches('/') {
            return Err(HttpApiError::InvalidConfig(
                "api_path and apispec_path must differ".to_string(),
            ));
        }
        if self.max_body_size == 0 {
            return Err(HttpApiError::InvalidConfig(
                "max_body_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`InstantApiServer`]
pub struct InstantApiServerBuilder {
    config: ServerConfig,
    registry: RegistryBuilder,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl InstantApiServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: Registry::builder(),
            authenticator: None,
        }
    }

    /// Replace the methods collected so far with a prepared builder
    pub fn registry(mut self, registry: RegistryBuilder) -> Self {
        self.registry = registry;
        self
    }

    /// Expose every method of a service
    pub fn service<S: RpcService>(mut self, service: S) -> Self {
        self.registry = self.registry.service(service);
        self
    }

    pub fn service_with_tags<S, I, T>(mut self, service: S, tags: I) -> Self
    where
        S: RpcService,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.registry = self.registry.service_with_tags(service, tags);
        self
    }

    /// Expose a single method
    pub fn method(mut self, method: RpcMethod) -> Self {
        self.registry = self.registry.method(method);
        self
    }

    /// Gate every request behind an authenticator
    pub fn authenticator(mut self, authenticator: impl Authenticator) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the generic endpoint path
    pub fn api_path(mut self, path: impl Into<String>) -> Self {
        self.config.api_path = path.into();
        self
    }

    pub fn apispec_path(mut self, path: impl Into<String>) -> Self {
        self.config.apispec_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    /// Build the server, failing on registration or configuration errors
    pub fn build(self) -> Result<InstantApiServer> {
        self.config.validate()?;
        let registry = self.registry.build()?;
        info!(
            "Registered {} method(s): {}",
            registry.len(),
            registry.method_names().join(", ")
        );

        let mut handler = ApiHandler::new(self.config, Dispatcher::new(registry));
        if let Some(authenticator) = self.authenticator {
            handler = handler.with_shared_authenticator(authenticator);
        }
        Ok(InstantApiServer { handler })
    }
}

impl Default for InstantApiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP/1.1 server exposing a registry as JSON-RPC
#[derive(Clone)]
pub struct InstantApiServer {
    handler: ApiHandler,
}

impl InstantApiServer {
    pub fn builder() -> InstantApiServerBuilder {
        InstantApiServerBuilder::new()
    }

    /// The request handler, usable without a socket
    pub fn handler(&self) -> &ApiHandler {
        &self.handler
    }

    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config().bind_address).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending::<()>())
            .await
    }

    /// Serve until `shutdown` resolves. In-flight connections are left to
    /// finish on their own tasks.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("Instant API server listening on {}", local_addr);
        info!("JSON-RPC endpoint available at: {}", self.config().api_path);
        info!("API spec available at: {}", self.config().apispec_path);

        tokio::pin!(shutdown);
        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Shutting down server on {}", local_addr);
                    return Ok(());
                }
            };
            debug!("New connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}
