//! Per-deployment admission control
//!
//! Fixed-window request/token counters plus an in-flight gauge, one state per
//! deployment id (and per caller identity for caller limits). Each state sits
//! behind its own mutex, so admissions against unrelated deployments never
//! contend.
//!
//! Window counters reset exactly at window boundaries. This accepts a small
//! burst at the edge of a window in exchange for O(1) bookkeeping.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Admission limits; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateLimits {
    /// Requests per window
    #[serde(default)]
    pub rpm: Option<u64>,
    /// Tokens per window
    #[serde(default)]
    pub tpm: Option<u64>,
    /// Concurrent in-flight requests
    #[serde(default)]
    pub max_parallel_requests: Option<u32>,
}

impl RateLimits {
    pub fn is_unlimited(&self) -> bool {
        self.rpm.is_none() && self.tpm.is_none() && self.max_parallel_requests.is_none()
    }
}

/// Why an admission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Concurrency,
    RequestsPerWindow,
    TokensPerWindow,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Concurrency => f.write_str("concurrency limit reached"),
            DenyReason::RequestsPerWindow => f.write_str("requests-per-window limit reached"),
            DenyReason::TokensPerWindow => f.write_str("tokens-per-window limit reached"),
        }
    }
}

#[derive(Debug)]
struct WindowCounters {
    in_flight: u32,
    window_start: Instant,
    /// Number of windows elapsed since the state was created
    generation: u64,
    requests: u64,
    tokens: u64,
}

impl WindowCounters {
    fn new(now: Instant) -> Self {
        Self {
            in_flight: 0,
            window_start: now,
            generation: 0,
            requests: 0,
            tokens: 0,
        }
    }

    /// Number of whole windows between the current window start and `now`
    fn windows_elapsed(&self, now: Instant, window: Duration) -> u64 {
        let elapsed = now.saturating_duration_since(self.window_start);
        let window_nanos = window.as_nanos().max(1);
        (elapsed.as_nanos() / window_nanos) as u64
    }

    fn roll(&mut self, now: Instant, window: Duration) {
        let elapsed = self.windows_elapsed(now, window);
        if elapsed == 0 {
            return;
        }
        let advance = window
            .checked_mul(u32::try_from(elapsed).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX);
        self.window_start = self.window_start.checked_add(advance).unwrap_or(now);
        self.generation = self.generation.saturating_add(elapsed);
        self.requests = 0;
        self.tokens = 0;
    }

    fn check(&self, limits: &RateLimits, cost: u64) -> Result<(), DenyReason> {
        check_counts(self.in_flight, self.requests, self.tokens, limits, cost)
    }
}

fn check_counts(
    in_flight: u32,
    requests: u64,
    tokens: u64,
    limits: &RateLimits,
    cost: u64,
) -> Result<(), DenyReason> {
    if let Some(max) = limits.max_parallel_requests {
        if in_flight >= max {
            return Err(DenyReason::Concurrency);
        }
    }
    if let Some(rpm) = limits.rpm {
        if requests >= rpm {
            return Err(DenyReason::RequestsPerWindow);
        }
    }
    if let Some(tpm) = limits.tpm {
        if tokens >= tpm || tokens.saturating_add(cost) > tpm {
            return Err(DenyReason::TokensPerWindow);
        }
    }
    Ok(())
}

/// Mutable limiter state for one key
#[derive(Debug)]
pub struct LimiterState {
    inner: Mutex<WindowCounters>,
    window: Duration,
}

impl LimiterState {
    fn new(window: Duration, now: Instant) -> Self {
        Self {
            inner: Mutex::new(WindowCounters::new(now)),
            window,
        }
    }

    fn snapshot(&self, now: Instant) -> LimiterSnapshot {
        let counters = self.inner.lock();
        let expired = counters.windows_elapsed(now, self.window) > 0;
        LimiterSnapshot {
            in_flight: counters.in_flight,
            requests: if expired { 0 } else { counters.requests },
            tokens: if expired { 0 } else { counters.tokens },
        }
    }
}

/// Point-in-time view of one limiter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LimiterSnapshot {
    pub in_flight: u32,
    pub requests: u64,
    pub tokens: u64,
}

impl LimiterSnapshot {
    /// Whether an admission with `cost` would currently pass
    pub fn would_admit(&self, limits: &RateLimits, cost: u64) -> bool {
        check_counts(self.in_flight, self.requests, self.tokens, limits, cost).is_ok()
    }

    /// Token usage as a fraction of the token limit (0.0 when unlimited)
    pub fn token_utilization(&self, limits: &RateLimits) -> f64 {
        match limits.tpm {
            Some(tpm) if tpm > 0 => self.tokens as f64 / tpm as f64,
            _ => 0.0,
        }
    }
}

/// A granted admission
///
/// Holds one in-flight slot until released. Releasing consumes the value, so a
/// slot can never be returned twice; dropping an unreleased admission (for
/// example when the request future is cancelled) releases it with the
/// estimated cost.
#[derive(Debug)]
pub struct Admission {
    state: Arc<LimiterState>,
    key: String,
    estimated_cost: u64,
    generation: u64,
    released: bool,
}

impl Admission {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn estimated_cost(&self) -> u64 {
        self.estimated_cost
    }

    /// Return the slot and reconcile the token counter to `actual_cost`
    pub fn release(mut self, actual_cost: u64) {
        self.release_inner(actual_cost, Instant::now());
    }

    fn release_inner(&mut self, actual_cost: u64, now: Instant) {
        if self.released {
            return;
        }
        self.released = true;

        let mut counters = self.state.inner.lock();
        counters.in_flight = counters.in_flight.saturating_sub(1);
        counters.roll(now, self.state.window);

        // A rolled window already discarded the estimate
        if counters.generation == self.generation {
            counters.tokens = counters
                .tokens
                .saturating_sub(self.estimated_cost)
                .saturating_add(actual_cost);
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.released {
            let cost = self.estimated_cost;
            self.release_inner(cost, Instant::now());
        }
    }
}

/// Rate/concurrency limiter
///
/// Deployment and caller states live in separate maps so a caller identity can
/// never collide with a deployment id.
#[derive(Debug)]
pub struct RateLimiter {
    deployments: DashMap<String, Arc<LimiterState>>,
    callers: DashMap<String, Arc<LimiterState>>,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given fixed window size
    pub fn new(window: Duration) -> Self {
        Self {
            deployments: DashMap::new(),
            callers: DashMap::new(),
            window: window.max(Duration::from_millis(1)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Atomically check limits and reserve capacity on a deployment
    ///
    /// On denial nothing is modified.
    pub fn try_admit(
        &self,
        deployment_id: &str,
        limits: &RateLimits,
        estimated_cost: u64,
        now: Instant,
    ) -> Result<Admission, DenyReason> {
        let state = Self::state_for(&self.deployments, deployment_id, self.window, now);
        Self::admit(state, deployment_id, limits, estimated_cost, now)
    }

    /// Atomically check limits and reserve capacity for a caller identity
    pub fn try_admit_caller(
        &self,
        caller: &str,
        limits: &RateLimits,
        estimated_cost: u64,
        now: Instant,
    ) -> Result<Admission, DenyReason> {
        let state = Self::state_for(&self.callers, caller, self.window, now);
        Self::admit(state, caller, limits, estimated_cost, now)
    }

    /// Release an admission with the actual cost
    ///
    /// Equivalent to [`Admission::release`]. A denied admission produces no
    /// `Admission`, so there is nothing to release.
    pub fn release(&self, admission: Admission, actual_cost: u64) {
        admission.release(actual_cost);
    }

    /// Current counters for a deployment (zeros if never admitted)
    pub fn snapshot(&self, deployment_id: &str, now: Instant) -> LimiterSnapshot {
        self.deployments
            .get(deployment_id)
            .map(|state| state.snapshot(now))
            .unwrap_or_default()
    }

    /// Current counters for a caller identity
    pub fn caller_snapshot(&self, caller: &str, now: Instant) -> LimiterSnapshot {
        self.callers
            .get(caller)
            .map(|state| state.snapshot(now))
            .unwrap_or_default()
    }

    /// Read-only pre-check used by selection
    pub fn would_admit(
        &self,
        deployment_id: &str,
        limits: &RateLimits,
        estimated_cost: u64,
        now: Instant,
    ) -> bool {
        limits.is_unlimited()
            || self
                .snapshot(deployment_id, now)
                .would_admit(limits, estimated_cost)
    }

    /// Drop the state of a removed deployment
    ///
    /// A state still held by outstanding admissions is kept, so a deployment
    /// registered again under the same id sees the calls it is still draining.
    /// Returns whether the state was dropped.
    pub fn remove(&self, deployment_id: &str) -> bool {
        self.deployments
            .remove_if(deployment_id, |_, state| Arc::strong_count(state) == 1)
            .is_some()
    }

    fn state_for(
        map: &DashMap<String, Arc<LimiterState>>,
        key: &str,
        window: Duration,
        now: Instant,
    ) -> Arc<LimiterState> {
        if let Some(state) = map.get(key) {
            return state.clone();
        }
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(LimiterState::new(window, now)))
            .clone()
    }

    fn admit(
        state: Arc<LimiterState>,
        key: &str,
        limits: &RateLimits,
        estimated_cost: u64,
        now: Instant,
    ) -> Result<Admission, DenyReason> {
        let generation = {
            let mut counters = state.inner.lock();
            counters.roll(now, state.window);

            if let Err(reason) = counters.check(limits, estimated_cost) {
                debug!(
                    key = %key,
                    reason = %reason,
                    in_flight = counters.in_flight,
                    requests = counters.requests,
                    tokens = counters.tokens,
                    "admission denied"
                );
                return Err(reason);
            }

            counters.in_flight += 1;
            counters.requests += 1;
            counters.tokens = counters.tokens.saturating_add(estimated_cost);
            counters.generation
        };

        Ok(Admission {
            state,
            key: key.to_string(),
            estimated_cost,
            generation,
            released: false,
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
