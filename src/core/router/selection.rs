//! Deployment selection logic
//!
//! Builds candidate snapshots from the registry, health tracker and limiter,
//! then hands them to the strategy. Selection itself never mutates health or
//! limiter state; the caller admits the chosen deployment afterwards.

use super::deployment::DeploymentId;
use super::router::Router;
use super::strategy_impl::{self, CandidateSnapshot, SelectionOutcome};
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::debug;

impl Router {
    /// Snapshot the candidates for a model, tier by tier
    ///
    /// Deployments in `excluded` are left out entirely.
    pub fn candidate_snapshots(
        &self,
        model_name: &str,
        excluded: &HashSet<DeploymentId>,
        estimated_cost: u64,
        now: Instant,
    ) -> Vec<Vec<CandidateSnapshot>> {
        self.registry
            .list_candidates(model_name)
            .into_iter()
            .map(|tier| {
                tier.into_iter()
                    .filter(|d| !excluded.contains(&d.id))
                    .map(|deployment| {
                        let limits = deployment.config.limits;
                        CandidateSnapshot {
                            health: self.health.snapshot(&deployment.id, now),
                            limiter: self.limiter.snapshot(&deployment.id, now),
                            admissible: self.limiter.would_admit(
                                &deployment.id,
                                &limits,
                                estimated_cost,
                                now,
                            ),
                            deployment,
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|tier| !tier.is_empty())
            .collect()
    }

    /// Select a deployment for a model with the configured strategy
    ///
    /// # Flow
    ///
    /// 1. Resolve aliases and group candidates by tier
    /// 2. Drop excluded, cooling-down and limiter-denied deployments
    /// 3. Apply the routing strategy to the first tier with survivors
    pub fn select_deployment(
        &self,
        model_name: &str,
        excluded: &HashSet<DeploymentId>,
        estimated_cost: u64,
        now: Instant,
    ) -> SelectionOutcome {
        let resolved = self.registry.resolve_model_name(model_name);
        let tiers = self.candidate_snapshots(&resolved, excluded, estimated_cost, now);
        let outcome = strategy_impl::select(
            self.config.routing_strategy,
            &resolved,
            &tiers,
            now,
            &self.round_robin,
            &mut rand::thread_rng(),
        );

        debug!(
            model = %resolved,
            strategy = %self.config.routing_strategy,
            selected = outcome.deployment_id().unwrap_or("none"),
            "deployment selection"
        );
        outcome
    }
}
