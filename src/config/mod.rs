//! Configuration management for the router
//!
//! This module handles loading, environment overrides and validation of the
//! router configuration file.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::core::router::{
    ConfigError, Deployment, DeploymentRegistry, RateLimits, RouterConfig, RoutingStrategy,
};
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Routing strategy override
pub const ENV_STRATEGY: &str = "LLM_ROUTER_STRATEGY";
/// Attempt budget override
pub const ENV_MAX_ATTEMPTS: &str = "LLM_ROUTER_MAX_ATTEMPTS";
/// Default request timeout override, in seconds
pub const ENV_TIMEOUT_SECS: &str = "LLM_ROUTER_TIMEOUT_SECS";
/// Log level override
pub const ENV_LOG_LEVEL: &str = "LLM_ROUTER_LOG_LEVEL";

/// Main configuration struct for the router
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Router runtime settings
    pub router_settings: RouterConfig,
    /// Deployments
    pub model_list: Vec<DeploymentEntry>,
    /// Model name -> ordered fallback model names
    pub fallbacks: HashMap<String, Vec<String>>,
    /// Alias -> logical model name
    pub model_aliases: HashMap<String, String>,
    /// Caller identity -> admission limits
    pub caller_limits: HashMap<String, LimitsEntry>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    ///
    /// Environment overrides are applied before validation.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        debug!(
            deployments = config.model_list.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Parse configuration from YAML without validating it
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| GatewayError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `LLM_ROUTER_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_STRATEGY) {
            self.router_settings.routing_strategy = value
                .parse::<RoutingStrategy>()
                .map_err(|e| GatewayError::config(format!("{}: {}", ENV_STRATEGY, e)))?;
        }
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            self.router_settings.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.router_settings.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        Validate::validate(self).map_err(|e| GatewayError::config(format!("Router config error: {}", e)))
    }

    /// Registry records for every `model_list` entry
    pub fn deployments(&self) -> std::result::Result<Vec<Deployment>, ConfigError> {
        self.model_list
            .iter()
            .map(DeploymentEntry::to_deployment)
            .collect()
    }

    /// Caller limits converted for the limiter
    pub fn caller_rate_limits(&self) -> std::result::Result<HashMap<String, RateLimits>, ConfigError> {
        self.caller_limits
            .iter()
            .map(|(caller, limits)| Ok((caller.clone(), limits.to_rate_limits(caller)?)))
            .collect()
    }

    /// Build a standalone registry with every deployment and alias
    pub fn build_registry(&self) -> Result<DeploymentRegistry> {
        let registry = DeploymentRegistry::new();
        for deployment in self.deployments()? {
            registry.register(deployment)?;
        }
        for (alias, target) in &self.model_aliases {
            registry.add_model_alias(alias, target);
        }
        Ok(registry)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GatewayError::config(format!("Failed to serialize config to YAML: {}", e)))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| GatewayError::config(format!("{}: invalid value '{}': {}", key, value, e)))
}
