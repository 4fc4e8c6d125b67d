//! Transport/translation seam
//!
//! The router never speaks a vendor protocol itself. A `Transport` takes a
//! deployment record and the canonical payload, performs the call, and reports
//! failures with a `retriable` flag that the router trusts as-is.

use super::deployment::Deployment;
use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio::time::Instant;

/// Token accounting reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Canonical (provider-neutral) response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub payload: serde_json::Value,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// One chunk of a streamed response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    pub payload: serde_json::Value,
    /// Cumulative usage, usually only present on the final chunk
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Stream of chunks produced by a transport
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, TransportError>> + Send>>;

/// Failure category reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    Server,
    RateLimited,
    BadRequest,
    Authentication,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connection => "connection",
            TransportErrorKind::Server => "server",
            TransportErrorKind::RateLimited => "rate limited",
            TransportErrorKind::BadRequest => "bad request",
            TransportErrorKind::Authentication => "authentication",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Error returned by the transport layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error{}: {message}", format_status(.status))]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Upstream HTTP status, when there was one
    pub status: Option<u16>,
    /// Whether another deployment may succeed where this one failed
    pub retriable: bool,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        message: impl Into<String>,
        status: Option<u16>,
        retriable: bool,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            retriable,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message, None, true)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message, None, true)
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Server, message, Some(status), true)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimited, message, Some(429), true)
    }

    pub fn bad_request(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::BadRequest, message, Some(status), false)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Authentication, message, Some(401), false)
    }

    pub fn other(message: impl Into<String>, retriable: bool) -> Self {
        Self::new(TransportErrorKind::Other, message, None, retriable)
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == TransportErrorKind::RateLimited
    }
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Backend call surface consumed by the router
///
/// Implementations must stop work promptly when the returned future is
/// dropped; the router cancels calls that outlive their deadline that way.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a unary call
    async fn invoke(
        &self,
        deployment: &Deployment,
        payload: &serde_json::Value,
        deadline: Instant,
    ) -> Result<CompletionResponse, TransportError>;

    /// Open a streamed call
    async fn invoke_stream(
        &self,
        deployment: &Deployment,
        payload: &serde_json::Value,
        deadline: Instant,
    ) -> Result<ChunkStream, TransportError> {
        let _ = (payload, deadline);
        Err(TransportError::bad_request(
            400,
            format!("streaming is not supported by provider {}", deployment.provider),
        ))
    }
}
