//! Execution helpers for router operations
//!
//! Classification of backend errors into health outcomes and the bookkeeping
//! carried across attempts of one routed request.

use super::deployment::{Deployment, DeploymentId};
use super::health::CallOutcome;
use super::limiter::Admission;
use super::transport::TransportError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Map a transport error onto the health outcome it records
///
/// The transport's `retriable` flag is trusted as-is; rate limits are kept
/// apart so they can be told apart in logs and stats.
pub fn classify_error(error: &TransportError) -> CallOutcome {
    if error.is_rate_limit() {
        CallOutcome::RateLimited
    } else if error.retriable {
        CallOutcome::RetriableError
    } else {
        CallOutcome::NonRetriableError
    }
}

/// Whether another deployment may succeed where this one failed
pub fn is_retryable_error(error: &TransportError) -> bool {
    error.retriable
}

/// Deadline for one backend call
///
/// The deployment's own timeout, counted from `now`, bounded by the request
/// deadline.
pub fn call_deadline(deployment: &Deployment, request_deadline: Instant, now: Instant) -> Instant {
    match deployment.config.timeout {
        Some(timeout) => request_deadline.min(now + timeout),
        None => request_deadline,
    }
}

/// Successful dispatch, before release and response assembly
///
/// The deployment admission is handed back to the caller so unary calls can
/// release with the reported tokens and streamed calls can hold it until the
/// stream ends.
#[derive(Debug)]
pub(crate) struct Dispatched<T> {
    pub value: T,
    pub admission: Admission,
    pub deployment: Arc<Deployment>,
    pub model_used: String,
    pub attempts: u32,
    pub used_fallback: bool,
    pub latency: Duration,
}

/// Attempt bookkeeping for one logical model
#[derive(Debug, Default)]
pub(crate) struct AttemptState {
    /// Deployments already tried for this model
    pub tried: HashSet<DeploymentId>,
    pub attempts: u32,
    pub backend_calls: u32,
}

impl AttemptState {
    /// Exclusion set for the next selection
    ///
    /// `retry_pass` ignores deployments tried earlier for this model, so a
    /// remaining attempt may go back to one of them.
    pub fn exclusions(&self, request: &HashSet<DeploymentId>, retry_pass: bool) -> HashSet<DeploymentId> {
        if retry_pass {
            request.clone()
        } else {
            request.union(&self.tried).cloned().collect()
        }
    }
}
