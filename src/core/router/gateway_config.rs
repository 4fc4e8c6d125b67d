//! Configuration file integration
//!
//! Builds a `Router` from a loaded `Config` and applies later reloads of the
//! same file to a running router.

use super::ledger::{SpendLedger, SpendNotifier};
use super::router::Router;
use super::transport::Transport;
use crate::config::Config;
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::info;

impl Router {
    /// Create a Router from a validated configuration
    ///
    /// Every `model_list` entry becomes a deployment; fallbacks, aliases and
    /// caller limits are installed as configured.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let router = Router::new(config.router_settings.clone(), transport);
        router.apply_config(config)?;

        info!(
            deployments = router.registry.len(),
            strategy = %router.config.routing_strategy,
            "router initialized from configuration"
        );
        Ok(router)
    }

    /// Create a Router that reports spend to `ledger`
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config_with_ledger(
        config: &Config,
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn SpendLedger>,
    ) -> Result<Self> {
        let notifier = SpendNotifier::spawn(ledger, config.router_settings.spend_buffer);
        Ok(Self::from_config(config, transport)?.with_spend_notifier(notifier))
    }

    /// Apply deployments, fallbacks, aliases and caller limits from `config`
    ///
    /// Router settings (strategy, attempt budget, cooldown policy) are fixed at
    /// construction and are not changed here.
    pub fn apply_config(&self, config: &Config) -> Result<()> {
        let deployments = config.deployments()?;
        let caller_limits = config.caller_rate_limits()?;

        self.reload(deployments)?;
        self.fallback_config.replace_all(config.fallbacks.clone());
        self.registry.replace_model_aliases(&config.model_aliases);

        self.caller_limits.clear();
        for (caller, limits) in caller_limits {
            self.set_caller_limits(&caller, limits);
        }
        Ok(())
    }
}
