//! HTTP transport.
//!
//! Sends [`RemoteRequest`]s to a real document server over HTTP(S) with
//! `reqwest`. Credentials from the [`InstanceHandle`] go out as basic auth.
//!
//! The URL is assembled per request, so a malformed host only fails when a
//! request is actually made.

use crate::config::GatewayConfig;
use crate::error::{OrchestratorError, Result};
use crate::instance::InstanceHandle;
use crate::transport::{
    BoxFuture, Method, RemoteRequest, RemoteResponse, Transport, TransportError, TransportResult,
};
use reqwest::Client;
use serde_json::Value;
use url::Url;

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A [`Transport`] bound to one server over HTTP(S).
///
/// `reqwest::Client` pools connections internally; cloning is cheap.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl HttpTransport {
    /// Build a transport for `instance` with the configured timeouts.
    pub fn new(instance: &InstanceHandle, config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout_duration())
            .connect_timeout(config.connect_timeout_duration())
            .build()
            .map_err(|e| OrchestratorError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(instance, client))
    }

    /// Use an existing client (shared pool across instances).
    pub fn with_client(instance: &InstanceHandle, client: Client) -> Self {
        Self {
            client,
            base_url: instance.base_url(),
            user: instance.user().to_string(),
            password: instance.password().to_string(),
        }
    }

    /// Resolve a request to its full URL.
    ///
    /// Each path segment is percent-encoded on its own, so `/` inside a
    /// database name or document id never splits the segment.
    pub fn request_url(&self, request: &RemoteRequest) -> TransportResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError(format!("invalid URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| TransportError(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(&request.path);

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: RemoteRequest) -> BoxFuture<'_, RemoteResponse> {
        Box::pin(async move {
            let url = self.request_url(&request)?;

            let mut builder = self
                .client
                .request(request.method.into(), url)
                .basic_auth(&self.user, Some(&self.password))
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError(e.to_string()))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| TransportError(e.to_string()))?;

            Ok(RemoteResponse::new(status, decode_body(text)))
        })
    }
}

/// Empty → `Null`, JSON → parsed, anything else → `String` as received.
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}
