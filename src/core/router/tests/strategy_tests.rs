//! Selection strategy tests

use super::support::*;
use crate::core::router::config::RouterConfig;
use crate::core::router::deployment::DeploymentConfig;
use crate::core::router::health::HealthSnapshot;
use crate::core::router::limiter::{LimiterSnapshot, RateLimits};
use crate::core::router::strategy_impl::{
    CandidateSnapshot, RoundRobinCursors, RoutingStrategy, SelectionOutcome, select,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn candidate(id: &str, weight: f64) -> CandidateSnapshot {
    let deployment = create_test_deployment(id, "gpt").with_config(DeploymentConfig {
        weight,
        limits: RateLimits {
            tpm: Some(1_000),
            ..Default::default()
        },
        ..Default::default()
    });
    CandidateSnapshot {
        deployment: Arc::new(deployment),
        health: HealthSnapshot::default(),
        limiter: LimiterSnapshot::default(),
        admissible: true,
    }
}

fn cooling(mut candidate: CandidateSnapshot, now: Instant) -> CandidateSnapshot {
    candidate.health.cooldown_until = Some(now + Duration::from_secs(10));
    candidate
}

fn pick(strategy: RoutingStrategy, tiers: &[Vec<CandidateSnapshot>], rng: &mut StdRng) -> Option<String> {
    match select(strategy, "gpt", tiers, Instant::now(), &RoundRobinCursors::new(), rng) {
        SelectionOutcome::Selected(d) => Some(d.id.clone()),
        SelectionOutcome::NoneEligible => None,
    }
}

fn tally(
    strategy: RoutingStrategy,
    tiers: &[Vec<CandidateSnapshot>],
    draws: usize,
) -> HashMap<String, usize> {
    let mut rng = StdRng::seed_from_u64(7);
    let cursors = RoundRobinCursors::new();
    let now = Instant::now();
    let mut counts = HashMap::new();
    for _ in 0..draws {
        if let SelectionOutcome::Selected(d) = select(strategy, "gpt", tiers, now, &cursors, &mut rng) {
            *counts.entry(d.id.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[test]
fn test_weighted_shuffle_follows_weights() {
    let tiers = vec![vec![candidate("d1", 3.0), candidate("d2", 1.0)]];
    let counts = tally(RoutingStrategy::SimpleShuffle, &tiers, 4_000);

    let share = counts["d1"] as f64 / 4_000.0;
    assert!((0.70..0.80).contains(&share), "d1 share was {share}");
}

#[test]
fn test_least_busy_prefers_idle_deployment() {
    let mut busy = candidate("d1", 1.0);
    busy.limiter.in_flight = 9;
    let tiers = vec![vec![busy, candidate("d2", 1.0)]];

    let counts = tally(RoutingStrategy::LeastBusy, &tiers, 2_000);
    let share = counts["d2"] as f64 / 2_000.0;
    assert!(share > 0.85, "idle share was {share}");
}

#[test]
fn test_round_robin_rotates_evenly() {
    let tiers = vec![vec![
        candidate("d1", 1.0),
        candidate("d2", 5.0),
        candidate("d3", 1.0),
    ]];
    let counts = tally(RoutingStrategy::RoundRobin, &tiers, 31);

    for id in ["d1", "d2", "d3"] {
        assert!((10..=11).contains(&counts[id]), "{id} got {}", counts[id]);
    }
}

#[test]
fn test_latency_based_picks_fastest() {
    let mut slow = candidate("d1", 1.0);
    slow.health.avg_latency = Some(Duration::from_millis(300));
    let mut fast = candidate("d2", 1.0);
    fast.health.avg_latency = Some(Duration::from_millis(100));
    // Unmeasured counts as the mean (200ms)
    let unknown = candidate("d3", 1.0);

    let tiers = vec![vec![slow, fast, unknown]];
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
        pick(RoutingStrategy::LatencyBased, &tiers, &mut rng).as_deref(),
        Some("d2")
    );
}

#[test]
fn test_usage_based_picks_least_utilised() {
    let mut heavy = candidate("d1", 1.0);
    heavy.limiter.tokens = 800;
    let mut light = candidate("d2", 1.0);
    light.limiter.tokens = 100;

    let mut rng = StdRng::seed_from_u64(1);
    let tiers = vec![vec![heavy.clone(), light]];
    assert_eq!(
        pick(RoutingStrategy::UsageBased, &tiers, &mut rng).as_deref(),
        Some("d2")
    );

    let mut unlimited = candidate("d3", 1.0);
    Arc::make_mut(&mut unlimited.deployment).config.limits = RateLimits::default();
    unlimited.limiter.tokens = 5_000;
    let tiers = vec![vec![heavy, unlimited]];
    assert_eq!(
        pick(RoutingStrategy::UsageBased, &tiers, &mut rng).as_deref(),
        Some("d3")
    );
}

#[test]
fn test_ineligible_candidates_are_never_chosen() {
    let now = Instant::now();
    let mut denied = candidate("d2", 100.0);
    denied.admissible = false;
    let tiers = vec![vec![
        cooling(candidate("d1", 100.0), now),
        denied,
        candidate("d3", 1.0),
    ]];

    for strategy in [
        RoutingStrategy::SimpleShuffle,
        RoutingStrategy::LeastBusy,
        RoutingStrategy::RoundRobin,
        RoutingStrategy::LatencyBased,
        RoutingStrategy::UsageBased,
    ] {
        let counts = tally(strategy, &tiers, 50);
        assert_eq!(counts.get("d3"), Some(&50), "strategy {strategy}");
    }
}

#[test]
fn test_lower_tier_exhausted_before_higher() {
    let now = Instant::now();
    let tiers = vec![
        vec![candidate("a", 1.0), candidate("b", 1.0)],
        vec![candidate("c", 1.0)],
    ];
    let counts = tally(RoutingStrategy::SimpleShuffle, &tiers, 200);
    assert!(!counts.contains_key("c"));

    let tiers = vec![
        vec![cooling(candidate("a", 1.0), now), cooling(candidate("b", 1.0), now)],
        vec![candidate("c", 1.0)],
    ];
    let counts = tally(RoutingStrategy::SimpleShuffle, &tiers, 20);
    assert_eq!(counts.get("c"), Some(&20));
}

#[test]
fn test_none_eligible() {
    let now = Instant::now();
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(pick(RoutingStrategy::RoundRobin, &[], &mut rng), None);

    let tiers = vec![vec![cooling(candidate("d1", 1.0), now)]];
    assert_eq!(pick(RoutingStrategy::SimpleShuffle, &tiers, &mut rng), None);
}

#[tokio::test]
async fn test_router_round_robin_distribution() {
    let transport = ScriptedTransport::new();
    let router = router_with(
        RouterConfig {
            routing_strategy: RoutingStrategy::RoundRobin,
            ..Default::default()
        },
        &transport,
        vec![
            create_test_deployment("d1", "gpt"),
            create_test_deployment("d2", "gpt"),
            create_test_deployment("d3", "gpt"),
        ],
    );

    for _ in 0..30 {
        router.route(request("gpt")).await.unwrap();
    }
    for id in ["d1", "d2", "d3"] {
        assert_eq!(transport.call_count(id), 10);
    }
}

#[tokio::test]
async fn test_router_skips_limit_exhausted_deployment() {
    let transport = ScriptedTransport::new();
    let full = create_test_deployment("d1", "gpt").with_config(DeploymentConfig {
        weight: 100.0,
        limits: RateLimits {
            max_parallel_requests: Some(0),
            ..Default::default()
        },
        ..Default::default()
    });
    let router = router_with(
        RouterConfig::default(),
        &transport,
        vec![full, create_test_deployment("d2", "gpt")],
    );

    for _ in 0..10 {
        let routed = router.route(request("gpt")).await.unwrap();
        assert_eq!(routed.deployment_id, "d2");
        assert_eq!(routed.attempts, 1);
    }
}
