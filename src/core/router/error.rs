//! Router error types
//!
//! This module defines the routing error taxonomy and the registration-time
//! configuration errors.

use super::deployment::DeploymentId;
use super::limiter::DenyReason;
use super::transport::TransportError;

/// Invalid deployment or router configuration
///
/// Raised at registration/validation time; never reaches the routing path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Deployment registered without an id
    #[error("deployment id must not be empty")]
    EmptyId,

    /// Deployment serves no logical model name
    #[error("deployment {0} serves no model names")]
    NoModelNames(DeploymentId),

    /// Weight must be a positive, finite number
    #[error("deployment {id} has invalid weight {weight}: must be positive and finite")]
    InvalidWeight { id: DeploymentId, weight: f64 },

    /// A configured limit was negative
    #[error("deployment {id} has negative {field} limit: {value}")]
    NegativeLimit {
        id: DeploymentId,
        field: &'static str,
        value: i64,
    },

    /// A router-wide setting is out of range
    #[error("invalid router setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Router error types
///
/// Retriable backend errors are absorbed by the dispatch loop and only surface
/// through `RetriesExhausted`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// Invalid deployment registration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logical model name has no registered deployments
    #[error("no deployments configured for model: {0}")]
    NoDeploymentsConfigured(String),

    /// Every candidate was in cooldown or limiter-denied at decision time
    #[error("all deployments unavailable for model: {0}")]
    AllDeploymentsUnavailable(String),

    /// Attempt budget spent with at least one backend call made
    #[error(
        "retries exhausted for model {model} after {attempts} attempts{}",
        describe_last_error(.last_error)
    )]
    RetriesExhausted {
        model: String,
        attempts: u32,
        last_error: Option<TransportError>,
    },

    /// Backend rejected the request itself; surfaced without further attempts
    #[error("non-retriable backend error from deployment {deployment_id}: {source}")]
    NonRetriableBackendError {
        deployment_id: DeploymentId,
        #[source]
        source: TransportError,
    },

    /// Request deadline passed before a response was obtained
    #[error("deadline exceeded for model {model} after {attempts} attempts")]
    DeadlineExceeded { model: String, attempts: u32 },

    /// Caller identity is over its own admission limits
    #[error("caller {caller} rate limited: {reason}")]
    CallerRateLimited { caller: String, reason: DenyReason },
}

impl RouterError {
    /// The backend error carried by this error, if any
    pub fn backend_error(&self) -> Option<&TransportError> {
        match self {
            RouterError::RetriesExhausted { last_error, .. } => last_error.as_ref(),
            RouterError::NonRetriableBackendError { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn describe_last_error(last_error: &Option<TransportError>) -> String {
    match last_error {
        Some(err) => format!(": {}", err),
        None => String::new(),
    }
}
