//! Per-call routing request

use super::deployment::DeploymentId;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// One inbound caller request
///
/// Owned by the call's execution context and dropped when the call completes
/// or exhausts its attempts.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    /// Correlation id for logs and spend events
    pub request_id: Uuid,
    /// Logical model name (or alias) requested by the caller
    pub model: String,
    /// Canonical payload handed to the transport unchanged
    pub payload: serde_json::Value,
    /// Caller identity for per-caller limits and spend accounting
    pub caller: Option<String>,
    /// Absolute deadline for the whole request, fallbacks included
    pub deadline: Instant,
    /// Deployments that must not be tried
    pub excluded: HashSet<DeploymentId>,
    /// Token estimate reserved against limiter windows at admission
    pub estimated_tokens: u64,
}

impl RoutingRequest {
    pub fn new(model: impl Into<String>, payload: serde_json::Value, deadline: Instant) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            model: model.into(),
            payload,
            caller: None,
            deadline,
            excluded: HashSet::new(),
            estimated_tokens: 0,
        }
    }

    /// Request with a deadline `timeout` from now
    pub fn with_timeout(
        model: impl Into<String>,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Self {
        Self::new(model, payload, Instant::now() + timeout)
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    /// Estimate the token cost from the payload size (about four bytes per token)
    pub fn with_payload_estimate(mut self) -> Self {
        self.estimated_tokens = estimate_tokens(&self.payload);
        self
    }

    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    pub fn excluding(mut self, deployment_id: impl Into<DeploymentId>) -> Self {
        self.excluded.insert(deployment_id.into());
        self
    }

    /// Time left before the deadline
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Rough token count of a canonical payload
pub fn estimate_tokens(payload: &serde_json::Value) -> u64 {
    let bytes = match payload.get("messages") {
        Some(messages) => messages.to_string().len(),
        None => payload.to_string().len(),
    };
    (bytes as u64).div_ceil(4)
}
