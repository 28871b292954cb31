// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote transport traits.
//!
//! Defines the single request/response seam the [`DatabaseGateway`](crate::gateway::DatabaseGateway)
//! talks through. One transport is bound to one database server.
//!
//! Implementations:
//! - [`HttpTransport`](crate::http::HttpTransport) for real servers
//! - `MemoryTransport` (behind the `test-util` feature) for standalone mode and tests
//!
//! # Example
//!
//! ```rust,no_run
//! use replication_orchestrator::transport::{BoxFuture, RemoteRequest, RemoteResponse, Transport};
//! use serde_json::json;
//!
//! struct AlwaysOk;
//!
//! impl Transport for AlwaysOk {
//!     fn send(&self, _request: RemoteRequest) -> BoxFuture<'_, RemoteResponse> {
//!         Box::pin(async move { Ok(RemoteResponse::new(200, json!({"ok": true}))) })
//!     }
//! }
//! ```

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// The request never produced a response (connection refused, timeout, bad URL).
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// HTTP verbs used against the document server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Head => write!(f, "HEAD"),
            Method::Put => write!(f, "PUT"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One request against a server.
///
/// `path` holds raw (unencoded) segments. The transport is responsible for
/// percent-encoding each segment, so a database named `a/b` stays one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn new<I, S>(method: Method, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, path)
    }

    pub fn head<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Head, path)
    }

    pub fn put<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Put, path)
    }

    pub fn post<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Post, path)
    }

    pub fn delete<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter by name.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A server response: status plus decoded JSON body.
///
/// Bodies that are empty decode to `Value::Null`; bodies that are not JSON
/// are kept as `Value::String`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request/response primitive every gateway operation is built on.
///
/// No retries, no timeouts of its own: the implementation's underlying
/// client owns those.
pub trait Transport: Send + Sync + 'static {
    /// Send one request and wait for the server's answer.
    ///
    /// A non-2xx status is still `Ok`; only failures to get any response are `Err`.
    fn send(&self, request: RemoteRequest) -> BoxFuture<'_, RemoteResponse>;
}
