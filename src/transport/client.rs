//! Remote client implementation
//!
//! Wraps `reqwest` behind the `RemoteClient` trait so the harvest engine can be
//! driven by a scripted client in tests.

use crate::config::ClientConfig;
use crate::model::Continuation;
use crate::transport::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// A single JSON POST against the remote API
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

/// Client context object sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct ClientContext(Value);

impl ClientContext {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self(json!({
            "client": {
                "clientName": config.client_name,
                "clientVersion": config.client_version,
                "hl": config.hl,
                "gl": config.gl,
            }
        }))
    }

    /// Wraps a context object supplied by the page orchestrator
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Builds the POST body for a continuation request
///
/// The click-tracking object is only included when a tracking param is known.
pub fn build_request(context: &ClientContext, continuation: &Continuation) -> Value {
    let mut body = json!({
        "context": context.as_value(),
        "continuation": continuation.token.as_wire(),
    });

    if let Some(tracking) = &continuation.tracking {
        body["clickTracking"] = json!({ "clickTrackingParams": tracking });
    }

    body
}

/// Builds an HTTP client suitable for continuation requests
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "thread-harvest/{} ({}/{})",
        env!("CARGO_PKG_VERSION"),
        config.client_name,
        config.client_version
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `RemoteClient` backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Network("Request timeout".to_string())
                } else if e.is_connect() {
                    TransportError::Network("Connection refused".to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
