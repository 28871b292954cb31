// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication orchestrator.
//!
//! Errors are categorized by where they originate: locally (before any
//! network call), on the wire, or at the remote server.
//!
//! # Error Categories
//!
//! | Error Type | Remote | Retryable | Description |
//! |------------|--------|-----------|-------------|
//! | `SelfReplication` | No | No | Source and target resolve to the same host:port |
//! | `Remote` | Yes | 5xx / 429 | Server rejected the request (status + body kept verbatim) |
//! | `Conflict` | Yes | No | Stale revision (HTTP 409), re-fetch and try again |
//! | `Transport` | Yes | Yes | Connection refused, timeout, TLS failure |
//! | `Decode` | No | No | Server answered 2xx with an unexpected shape |
//! | `Config` | No | No | Configuration invalid |
//! | `DrainIncomplete` | No | Yes | Jobs still running after the drain round limit |
//!
//! # Retry Behavior
//!
//! Nothing in this crate retries. [`OrchestratorError::is_retryable()`] is an
//! advisory for callers that implement their own retry policy.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur while orchestrating replication.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Replication requested between two handles on the same server.
    ///
    /// Raised before any remote call is made. Pick distinct instances.
    #[error("Refusing to replicate {host}:{port} onto itself")]
    SelfReplication { host: String, port: u16 },

    /// The server answered with a non-success status.
    ///
    /// `body` is the server's response, untouched.
    #[error("Remote error ({operation}): HTTP {status}: {body}")]
    Remote {
        operation: String,
        status: u16,
        body: Value,
    },

    /// The server rejected a write because the supplied revision is stale (HTTP 409).
    ///
    /// The document is unchanged. Re-fetch the current revision and retry.
    #[error("Conflict ({operation}): {body}")]
    Conflict { operation: String, body: Value },

    /// The request never got a response from the server.
    #[error("Transport error ({operation}): {message}")]
    Transport {
        operation: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    /// A success response could not be decoded into the expected shape.
    #[error("Decode error ({operation}): {message}")]
    Decode { operation: String, message: String },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A drain gave up with replication jobs still scheduled.
    #[error("Drain incomplete after {rounds} rounds: {remaining} jobs still running")]
    DrainIncomplete { rounds: u32, remaining: usize },
}

impl OrchestratorError {
    /// Map a non-success response to the matching error.
    pub fn from_status(operation: impl Into<String>, status: u16, body: Value) -> Self {
        let operation = operation.into();
        if status == 409 {
            Self::Conflict { operation, body }
        } else {
            Self::Remote {
                operation,
                status,
                body,
            }
        }
    }

    /// Create a transport error from a [`TransportError`].
    pub fn transport(operation: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a decode error from a serde failure.
    pub fn decode(operation: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: source.to_string(),
        }
    }

    /// True for every failure that came from (or on the way to) the remote server.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Remote { .. } | Self::Conflict { .. } | Self::Transport { .. }
        )
    }

    /// True if the server rejected a stale revision.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// HTTP status reported by the server, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote { status, .. } => *status >= 500 || *status == 429,
            Self::Transport { .. } => true,
            Self::DrainIncomplete { .. } => true, // scheduler may settle on a later attempt
            Self::Conflict { .. } => false,       // needs a fresh revision first
            Self::SelfReplication { .. } => false,
            Self::Decode { .. } => false,
            Self::Config(_) => false,
        }
    }
}
