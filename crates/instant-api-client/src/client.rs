//! JSON-RPC over HTTP client

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use instant_json_rpc::{JSONRPC_VERSION, JsonRpcMessage, RequestId};

use crate::error::{ClientError, ClientResult};

#[derive(Serialize)]
struct Envelope<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
}

/// Client for an Instant API server.
///
/// `endpoint` is the generic JSON-RPC endpoint, e.g.
/// `http://127.0.0.1:8000/api/`; method paths are resolved against it.
#[derive(Debug)]
pub struct InstantClient {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
    next_id: AtomicI64,
}

impl InstantClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Use a preconfigured reqwest client (timeouts, proxies)
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            client,
            endpoint,
            bearer_token: None,
            next_id: AtomicI64::new(1),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Call `method` through the generic endpoint and decode its result
    pub async fn call<P, R>(&self, method: &str, params: P) -> ClientResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id();
        let envelope = Envelope {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: params_value(params)?,
            id: Some(id.clone()),
        };
        debug!(method, id = ?id, "Sending JSON-RPC call");

        let (status, body) = self.post(&self.endpoint, &envelope).await?;
        let message = decode_message(status, &body)?;
        if message.id() != &id {
            return Err(ClientError::InvalidResponse(format!(
                "response id {:?} does not match request id {:?}",
                message.id(),
                id
            )));
        }
        into_result(message, status)
    }

    /// Call `method` through its own path, sending only the params
    pub async fn call_path<P, R>(&self, method: &str, params: P) -> ClientResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = params_value(params)?.unwrap_or_else(|| Value::Object(Default::default()));
        let url = format!("{}{}", self.endpoint, method);
        debug!(method, "Sending direct call to {}", url);

        let (status, body) = self.post(&url, &params).await?;
        let message = decode_message(status, &body)?;
        into_result(message, status)
    }

    /// Send a notification; the server runs it and answers with no body
    pub async fn notify<P: Serialize>(&self, method: &str, params: P) -> ClientResult<()> {
        let envelope = Envelope {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: params_value(params)?,
            id: None,
        };
        debug!(method, "Sending JSON-RPC notification");

        let (status, body) = self.post(&self.endpoint, &envelope).await?;
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        match decode_message(status, &body)? {
            JsonRpcMessage::Error(error) => Err(rpc_error(error, status)),
            JsonRpcMessage::Response(_) => Err(ClientError::InvalidResponse(
                "server answered a notification".to_string(),
            )),
        }
    }

    /// Send several calls in one request.
    ///
    /// The outer error covers the request as a whole; each call then has its
    /// own result, in the order given.
    pub async fn batch<M: AsRef<str>>(
        &self,
        calls: Vec<(M, Value)>,
    ) -> ClientResult<Vec<ClientResult<Value>>> {
        let mut ids = Vec::with_capacity(calls.len());
        let mut envelopes = Vec::with_capacity(calls.len());
        for (method, params) in &calls {
            let id = self.next_id();
            envelopes.push(Envelope {
                jsonrpc: JSONRPC_VERSION,
                method: method.as_ref(),
                params: params_value(params)?,
                id: Some(id.clone()),
            });
            ids.push(id);
        }
        debug!("Sending JSON-RPC batch of {} call(s)", envelopes.len());

        let (status, body) = self.post(&self.endpoint, &envelopes).await?;
        let messages: Vec<JsonRpcMessage> = match serde_json::from_slice(&body) {
            Ok(messages) => messages,
            // A rejected batch comes back as one error envelope
            Err(_) => {
                return match decode_message(status, &body)? {
                    JsonRpcMessage::Error(error) => Err(rpc_error(error, status)),
                    JsonRpcMessage::Response(_) => Err(ClientError::InvalidResponse(
                        "expected a list of responses".to_string(),
                    )),
                };
            }
        };

        let mut by_id: HashMap<RequestId, JsonRpcMessage> = messages
            .into_iter()
            .map(|message| (message.id().clone(), message))
            .collect();

        Ok(ids
            .into_iter()
            .map(|id| match by_id.remove(&id) {
                Some(message) => into_result(message, status),
                None => Err(ClientError::InvalidResponse(format!(
                    "no response for request id {:?}",
                    id
                ))),
            })
            .collect())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> ClientResult<(StatusCode, Vec<u8>)> {
        let mut request = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            debug!("HTTP {} from {}", status, url);
        }
        Ok((status, body.to_vec()))
    }
}

/// Params travel as an object, an array, or not at all
fn params_value<P: Serialize>(params: P) -> ClientResult<Option<Value>> {
    match serde_json::to_value(params)? {
        Value::Null => Ok(None),
        value @ (Value::Object(_) | Value::Array(_)) => Ok(Some(value)),
        other => Err(ClientError::InvalidParams(format!(
            "expected an object or array, got {}",
            other
        ))),
    }
}

fn decode_message(status: StatusCode, body: &[u8]) -> ClientResult<JsonRpcMessage> {
    if body.is_empty() {
        return Err(ClientError::InvalidResponse(format!(
            "HTTP {} with an empty body",
            status
        )));
    }
    serde_json::from_slice(body).map_err(|_| {
        warn!("Non JSON-RPC reply with HTTP {}", status);
        ClientError::InvalidResponse(format!(
            "HTTP {}: {}",
            status,
            String::from_utf8_lossy(body)
        ))
    })
}

fn into_result<R: DeserializeOwned>(message: JsonRpcMessage, status: StatusCode) -> ClientResult<R> {
    match message {
        JsonRpcMessage::Response(response) => Ok(serde_json::from_value(response.result)?),
        JsonRpcMessage::Error(error) => Err(rpc_error(error, status)),
    }
}

fn rpc_error(error: instant_json_rpc::JsonRpcError, status: StatusCode) -> ClientError {
    ClientError::Rpc {
        code: error.error.code,
        message: error.error.message,
        data: error.error.data,
        http_status: status.as_u16(),
    }
}
