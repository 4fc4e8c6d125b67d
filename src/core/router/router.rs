//! Router core structure
//!
//! The `Router` owns the registry, the health tracker and the limiter for the
//! lifetime of the process, and wires them to the external transport. All
//! shared state starts empty; nothing is recovered from previous runs.

use super::config::RouterConfig;
use super::deployment::{Deployment, DeploymentId};
use super::error::{ConfigError, RouterError};
use super::fallback::FallbackConfig;
use super::health::{CallOutcome, HealthSnapshot, HealthTracker};
use super::ledger::SpendNotifier;
use super::limiter::{LimiterSnapshot, RateLimiter, RateLimits};
use super::registry::{CandidateTiers, DeploymentRegistry};
use super::strategy_impl::RoundRobinCursors;
use super::transport::Transport;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Diagnostic view of one deployment
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStats {
    pub deployment_id: DeploymentId,
    pub tier: u32,
    pub weight: f64,
    pub tags: Vec<String>,
    pub eligible: bool,
    /// Remaining cooldown, if the deployment is cooling down
    pub cooldown_remaining: Option<Duration>,
    pub consecutive_failures: u32,
    pub window_successes: u64,
    pub window_failures: u64,
    pub avg_latency: Option<Duration>,
    pub limiter: LimiterSnapshot,
}

/// Deployment router
///
/// The central orchestrator for deployment management and request dispatch.
/// Per-deployment state is synchronized per deployment id; there is no lock
/// around request handling as a whole.
pub struct Router {
    pub(crate) registry: DeploymentRegistry,
    pub(crate) health: HealthTracker,
    pub(crate) limiter: RateLimiter,
    pub(crate) config: RouterConfig,
    pub(crate) fallback_config: FallbackConfig,
    pub(crate) caller_limits: DashMap<String, RateLimits>,
    pub(crate) round_robin: RoundRobinCursors,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) spend: Option<SpendNotifier>,
}

impl Router {
    /// Create a new router with the given configuration and transport
    pub fn new(config: RouterConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: DeploymentRegistry::new(),
            health: HealthTracker::new(config.cooldown_policy(), config.health_window()),
            limiter: RateLimiter::new(config.rate_limit_window()),
            config,
            fallback_config: FallbackConfig::default(),
            caller_limits: DashMap::new(),
            round_robin: RoundRobinCursors::new(),
            transport,
            spend: None,
        }
    }

    /// Set fallback configuration (builder pattern)
    pub fn with_fallback_config(mut self, config: FallbackConfig) -> Self {
        self.fallback_config = config;
        self
    }

    /// Attach a spend notifier (builder pattern)
    pub fn with_spend_notifier(mut self, notifier: SpendNotifier) -> Self {
        self.spend = Some(notifier);
        self
    }

    /// Get the router configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn fallbacks(&self) -> &FallbackConfig {
        &self.fallback_config
    }

    // ========== Deployment Management ==========

    /// Register (insert or replace) a deployment
    pub fn register(&self, deployment: Deployment) -> Result<(), RouterError> {
        self.registry.register(deployment)?;
        Ok(())
    }

    /// Remove a deployment and drop its health and limiter state
    pub fn deregister(&self, id: &str) -> Option<Arc<Deployment>> {
        let removed = self.registry.deregister(id)?;
        self.health.remove(id);
        if !self.limiter.remove(id) {
            debug!(deployment_id = %id, "keeping limiter state for in-flight calls");
        }
        Some(removed)
    }

    /// Apply a full deployment list from a configuration reload
    ///
    /// Every record is validated before any change is applied. Registered ids
    /// absent from `deployments` are deregistered.
    pub fn reload(&self, deployments: Vec<Deployment>) -> Result<(), ConfigError> {
        for deployment in &deployments {
            deployment.validate()?;
        }

        let keep: HashSet<DeploymentId> = deployments.iter().map(|d| d.id.clone()).collect();
        let count = deployments.len();
        for deployment in deployments {
            self.registry.register(deployment)?;
        }

        let stale: Vec<DeploymentId> = self
            .registry
            .list_deployments()
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        for id in &stale {
            self.deregister(id);
        }

        info!(
            deployments = count,
            removed = stale.len(),
            "deployment configuration reloaded"
        );
        Ok(())
    }

    /// Add a model name alias
    pub fn add_model_alias(&self, alias: &str, model_name: &str) {
        self.registry.add_model_alias(alias, model_name);
    }

    /// Configure per-caller admission limits
    pub fn set_caller_limits(&self, caller: &str, limits: RateLimits) {
        self.caller_limits.insert(caller.to_string(), limits);
    }

    // ========== Query Methods ==========

    pub fn get_deployment(&self, id: &str) -> Option<Arc<Deployment>> {
        self.registry.get(id)
    }

    pub fn list_candidates(&self, model_name: &str) -> CandidateTiers {
        self.registry.list_candidates(model_name)
    }

    /// List all model names
    pub fn list_models(&self) -> Vec<String> {
        self.registry.list_models()
    }

    /// List all deployment IDs
    pub fn list_deployments(&self) -> Vec<DeploymentId> {
        self.registry.list_deployments()
    }

    /// Whether a deployment is currently out of cooldown
    pub fn is_eligible(&self, id: &str) -> bool {
        self.health.is_eligible(id, Instant::now())
    }

    /// Health and limiter view of a deployment
    pub fn deployment_stats(&self, id: &str) -> Option<DeploymentStats> {
        let deployment = self.registry.get(id)?;
        let now = Instant::now();
        let health: HealthSnapshot = self.health.snapshot(id, now);

        Some(DeploymentStats {
            deployment_id: deployment.id.clone(),
            tier: deployment.tier(),
            weight: deployment.weight(),
            tags: deployment.tags.clone(),
            eligible: health.is_eligible(now),
            cooldown_remaining: health.cooldown_remaining(now),
            consecutive_failures: health.consecutive_failures,
            window_successes: health.successes,
            window_failures: health.failures,
            avg_latency: health.avg_latency,
            limiter: self.limiter.snapshot(id, now),
        })
    }

    // ========== Recording Methods ==========

    /// Record a call outcome against a deployment's health
    pub fn record_outcome(&self, id: &str, outcome: CallOutcome) -> Option<Instant> {
        self.health.record_outcome(id, outcome, Instant::now())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("deployments", &self.registry.len())
            .field("models", &self.registry.list_models())
            .field("spend_notifier", &self.spend.is_some())
            .finish()
    }
}
