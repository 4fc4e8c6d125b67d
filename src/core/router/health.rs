//! Health and cooldown tracking
//!
//! One `HealthState` per deployment id, created on first write and dropped when
//! the deployment is deregistered. Every read-modify-write happens under that
//! deployment's own mutex; there is no tracker-wide lock.
//!
//! Cooldown policy:
//! - retriable errors and rate limits extend `cooldown_until` with exponential
//!   backoff seeded by the consecutive-failure count, capped at a maximum
//! - a success resets the consecutive-failure count but never shortens an
//!   active cooldown
//! - non-retriable errors are request defects and leave cooldown untouched

use super::deployment::DeploymentId;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Classified result of one call against a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    RetriableError,
    NonRetriableError,
    RateLimited,
}

impl CallOutcome {
    /// Whether this outcome counts against deployment health
    pub fn is_health_failure(self) -> bool {
        matches!(self, CallOutcome::RetriableError | CallOutcome::RateLimited)
    }
}

/// Exponential cooldown parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Cooldown applied on the first failure beyond `allowed_fails`
    pub base: Duration,
    /// Upper bound for any single cooldown
    pub max: Duration,
    /// Cap on the doubling exponent
    pub max_exponent: u32,
    /// Consecutive failures tolerated before cooldown begins
    pub allowed_fails: u32,
}

impl CooldownPolicy {
    /// Backoff for the given consecutive-failure count, if it warrants one
    ///
    /// `base * 2^min(n - allowed_fails - 1, max_exponent)`, capped at `max`.
    pub fn backoff(&self, consecutive_failures: u32) -> Option<Duration> {
        let beyond = consecutive_failures.checked_sub(self.allowed_fails)?;
        if beyond == 0 {
            return None;
        }
        let exponent = (beyond - 1).min(self.max_exponent);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max))
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(300),
            max_exponent: 6,
            allowed_fails: 2,
        }
    }
}

#[derive(Debug, Default)]
struct HealthInner {
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
    window_start: Option<Instant>,
    successes: u64,
    failures: u64,
    avg_latency: Option<Duration>,
}

impl HealthInner {
    fn roll_window(&mut self, now: Instant, window: Duration) {
        match self.window_start {
            Some(start) if now.saturating_duration_since(start) < window => {}
            _ => {
                self.window_start = Some(now);
                self.successes = 0;
                self.failures = 0;
            }
        }
    }
}

/// Mutable health record for one deployment
#[derive(Debug, Default)]
pub struct HealthState {
    inner: Mutex<HealthInner>,
}

/// Point-in-time view of a deployment's health
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HealthSnapshot {
    pub cooldown_until: Option<Instant>,
    pub consecutive_failures: u32,
    /// Successes in the current observation window
    pub successes: u64,
    /// Failures in the current observation window
    pub failures: u64,
    /// Exponential moving average of call latency
    pub avg_latency: Option<Duration>,
}

impl HealthSnapshot {
    /// False iff `cooldown_until > now`
    pub fn is_eligible(&self, now: Instant) -> bool {
        self.cooldown_until.is_none_or(|until| until <= now)
    }

    /// Remaining cooldown at `now`
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

/// Health & cooldown tracker
#[derive(Debug)]
pub struct HealthTracker {
    states: DashMap<DeploymentId, Arc<HealthState>>,
    policy: CooldownPolicy,
    window: Duration,
}

impl HealthTracker {
    /// Create a tracker with the given cooldown policy and observation window
    pub fn new(policy: CooldownPolicy, window: Duration) -> Self {
        Self {
            states: DashMap::new(),
            policy,
            window,
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Returns false iff the deployment's cooldown extends past `now`
    pub fn is_eligible(&self, id: &str, now: Instant) -> bool {
        match self.states.get(id) {
            Some(state) => state
                .inner
                .lock()
                .cooldown_until
                .is_none_or(|until| until <= now),
            None => true,
        }
    }

    /// Apply one call outcome
    ///
    /// Returns the new cooldown deadline when this outcome started or extended
    /// a cooldown.
    pub fn record_outcome(&self, id: &str, outcome: CallOutcome, now: Instant) -> Option<Instant> {
        let state = self.state(id);
        let mut inner = state.inner.lock();
        inner.roll_window(now, self.window);

        match outcome {
            CallOutcome::Success => {
                inner.successes += 1;
                inner.consecutive_failures = 0;
                None
            }
            CallOutcome::NonRetriableError => {
                inner.failures += 1;
                None
            }
            CallOutcome::RetriableError | CallOutcome::RateLimited => {
                inner.failures += 1;
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

                let backoff = self.policy.backoff(inner.consecutive_failures)?;
                let candidate = now + backoff;
                let until = match inner.cooldown_until {
                    Some(existing) if existing > candidate => existing,
                    _ => candidate,
                };
                inner.cooldown_until = Some(until);

                warn!(
                    deployment_id = %id,
                    outcome = ?outcome,
                    consecutive_failures = inner.consecutive_failures,
                    cooldown_ms = backoff.as_millis() as u64,
                    "deployment entering cooldown"
                );
                Some(until)
            }
        }
    }

    /// Fold a call latency into the rolling average (alpha = 0.2)
    pub fn record_latency(&self, id: &str, latency: Duration) {
        let state = self.state(id);
        let mut inner = state.inner.lock();
        inner.avg_latency = Some(match inner.avg_latency {
            None => latency,
            Some(avg) => (latency + avg * 4) / 5,
        });
    }

    /// Current view of a deployment's health
    pub fn snapshot(&self, id: &str, now: Instant) -> HealthSnapshot {
        let Some(state) = self.states.get(id) else {
            return HealthSnapshot::default();
        };
        let inner = state.inner.lock();
        let window_expired = inner
            .window_start
            .is_none_or(|start| now.saturating_duration_since(start) >= self.window);

        HealthSnapshot {
            cooldown_until: inner.cooldown_until,
            consecutive_failures: inner.consecutive_failures,
            successes: if window_expired { 0 } else { inner.successes },
            failures: if window_expired { 0 } else { inner.failures },
            avg_latency: inner.avg_latency,
        }
    }

    /// Drop the state of a removed deployment
    pub fn remove(&self, id: &str) {
        self.states.remove(id);
    }

    fn state(&self, id: &str) -> Arc<HealthState> {
        if let Some(state) = self.states.get(id) {
            return state.clone();
        }
        self.states.entry(id.to_string()).or_default().clone()
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(CooldownPolicy::default(), Duration::from_secs(60))
    }
}
