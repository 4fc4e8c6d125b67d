//! Routing strategy implementations
//!
//! Selection is a function of candidate snapshots: it never touches live
//! health or limiter state. Per tier, candidates are filtered to those out of
//! cooldown and admissible by the limiter pre-check, then one is chosen with
//! the configured strategy. A higher tier is only considered once every lower
//! tier has no eligible candidate.

use super::deployment::{Deployment, DeploymentId};
use super::health::HealthSnapshot;
use super::limiter::LimiterSnapshot;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::time::Duration;
use tokio::time::Instant;

/// Routing strategy enumeration
///
/// - **SimpleShuffle**: weighted random by configured weight (default)
/// - **LeastBusy**: weighted random, weight divided by `in_flight + 1`
/// - **RoundRobin**: strict rotation through the eligible set, per model name
/// - **LatencyBased**: lowest rolling average latency
/// - **UsageBased**: lowest token usage relative to the token limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    #[default]
    SimpleShuffle,
    LeastBusy,
    RoundRobin,
    LatencyBased,
    UsageBased,
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoutingStrategy::SimpleShuffle => "simple_shuffle",
            RoutingStrategy::LeastBusy => "least_busy",
            RoutingStrategy::RoundRobin => "round_robin",
            RoutingStrategy::LatencyBased => "latency_based",
            RoutingStrategy::UsageBased => "usage_based",
        };
        f.write_str(name)
    }
}

impl FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "simple_shuffle" | "weighted_random" | "shuffle" => Ok(RoutingStrategy::SimpleShuffle),
            "least_busy" => Ok(RoutingStrategy::LeastBusy),
            "round_robin" => Ok(RoutingStrategy::RoundRobin),
            "latency_based" => Ok(RoutingStrategy::LatencyBased),
            "usage_based" => Ok(RoutingStrategy::UsageBased),
            other => Err(format!("unknown routing strategy: {}", other)),
        }
    }
}

/// One candidate deployment with the state selection needs
#[derive(Debug, Clone)]
pub struct CandidateSnapshot {
    pub deployment: Arc<Deployment>,
    pub health: HealthSnapshot,
    pub limiter: LimiterSnapshot,
    /// Result of the limiter pre-check for this request's estimated cost
    pub admissible: bool,
}

impl CandidateSnapshot {
    pub fn id(&self) -> &DeploymentId {
        &self.deployment.id
    }
}

/// Result of one selection
#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    Selected(Arc<Deployment>),
    NoneEligible,
}

impl SelectionOutcome {
    pub fn deployment_id(&self) -> Option<&str> {
        match self {
            SelectionOutcome::Selected(d) => Some(d.id.as_str()),
            SelectionOutcome::NoneEligible => None,
        }
    }
}

/// Round-robin positions, persisted per model name
#[derive(Debug, Default)]
pub struct RoundRobinCursors {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobinCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next position in `0..len` for `model_name`
    pub fn next(&self, model_name: &str, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        if let Some(counter) = self.counters.get(model_name) {
            return counter.fetch_add(1, Relaxed) % len;
        }
        let counter = self
            .counters
            .entry(model_name.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        counter.fetch_add(1, Relaxed) % len
    }
}

/// Pick a deployment from tiered candidates
pub fn select<R: Rng + ?Sized>(
    strategy: RoutingStrategy,
    model_name: &str,
    tiers: &[Vec<CandidateSnapshot>],
    now: Instant,
    cursors: &RoundRobinCursors,
    rng: &mut R,
) -> SelectionOutcome {
    for tier in tiers {
        let mut eligible: Vec<&CandidateSnapshot> = tier
            .iter()
            .filter(|c| c.health.is_eligible(now) && c.admissible)
            .collect();

        if eligible.is_empty() {
            continue;
        }
        eligible.sort_by(|a, b| a.id().cmp(b.id()));

        let chosen = match strategy {
            RoutingStrategy::SimpleShuffle => weighted_random(&eligible, rng, |c| c.deployment.weight()),
            RoutingStrategy::LeastBusy => weighted_random(&eligible, rng, |c| {
                c.deployment.weight() / (c.limiter.in_flight as f64 + 1.0)
            }),
            RoutingStrategy::RoundRobin => eligible[cursors.next(model_name, eligible.len())],
            RoutingStrategy::LatencyBased => lowest_latency(&eligible),
            RoutingStrategy::UsageBased => lowest_usage(&eligible),
        };
        return SelectionOutcome::Selected(chosen.deployment.clone());
    }

    SelectionOutcome::NoneEligible
}

/// Weighted random selection
///
/// Probability is proportional to `score`. Non-positive total falls back to
/// uniform choice.
fn weighted_random<'a, R, F>(
    candidates: &[&'a CandidateSnapshot],
    rng: &mut R,
    score: F,
) -> &'a CandidateSnapshot
where
    R: Rng + ?Sized,
    F: Fn(&CandidateSnapshot) -> f64,
{
    if candidates.len() == 1 {
        return candidates[0];
    }

    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| score(c).max(0.0))
        .map(|s| if s.is_finite() { s } else { 0.0 })
        .collect();
    let total: f64 = scores.iter().sum();

    if total <= 0.0 {
        return candidates[rng.gen_range(0..candidates.len())];
    }

    let mut point = rng.gen_range(0.0..total);
    for (candidate, weight) in candidates.iter().zip(&scores) {
        if point < *weight {
            return candidate;
        }
        point -= weight;
    }

    // Rounding can leave `point` marginally above the last bucket
    candidates[candidates.len() - 1]
}

/// Lowest average latency; unmeasured deployments count as the mean
fn lowest_latency<'a>(candidates: &[&'a CandidateSnapshot]) -> &'a CandidateSnapshot {
    let measured: Vec<Duration> = candidates
        .iter()
        .filter_map(|c| c.health.avg_latency)
        .collect();
    let mean = if measured.is_empty() {
        Duration::ZERO
    } else {
        measured.iter().sum::<Duration>() / measured.len() as u32
    };

    let mut best = candidates[0];
    let mut best_latency = best.health.avg_latency.unwrap_or(mean);
    for candidate in &candidates[1..] {
        let latency = candidate.health.avg_latency.unwrap_or(mean);
        if latency < best_latency {
            best = candidate;
            best_latency = latency;
        }
    }
    best
}

/// Lowest token-window utilisation; unlimited deployments count as idle
fn lowest_usage<'a>(candidates: &[&'a CandidateSnapshot]) -> &'a CandidateSnapshot {
    let mut best = candidates[0];
    let mut best_usage = best.limiter.token_utilization(&best.deployment.config.limits);
    for candidate in &candidates[1..] {
        let usage = candidate
            .limiter
            .token_utilization(&candidate.deployment.config.limits);
        if usage < best_usage {
            best = candidate;
            best_usage = usage;
        }
    }
    best
}
