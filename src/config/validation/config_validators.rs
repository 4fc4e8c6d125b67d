//! Configuration validators
//!
//! Validation implementations for the router configuration file sections.

use super::trait_def::Validate;
use crate::config::Config;
use crate::config::models::*;
use crate::core::router::RouterConfig;
use std::collections::HashSet;
use tracing::debug;

impl Validate for Config {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating router configuration file");

        Validate::validate(&self.router_settings)?;
        self.logging.validate()?;

        let mut ids = HashSet::new();
        for entry in &self.model_list {
            if !ids.insert(entry.deployment_id.as_str()) {
                return Err(format!("Duplicate deployment id: {}", entry.deployment_id));
            }
            entry.validate()?;
        }

        for (model, fallbacks) in &self.fallbacks {
            if fallbacks.iter().any(|f| f.trim().is_empty()) {
                return Err(format!("Fallback list for {} contains an empty model name", model));
            }
        }

        for (alias, target) in &self.model_aliases {
            if alias == target {
                return Err(format!("Model alias {} points to itself", alias));
            }
        }

        for (caller, limits) in &self.caller_limits {
            limits
                .to_rate_limits(caller)
                .map_err(|e| format!("Caller limits: {}", e))?;
        }

        Ok(())
    }
}

impl Validate for RouterConfig {
    fn validate(&self) -> Result<(), String> {
        RouterConfig::validate(self).map_err(|e| e.to_string())
    }
}

impl Validate for DeploymentEntry {
    fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err(format!(
                "Deployment {} must name a provider model",
                self.deployment_id
            ));
        }
        self.to_deployment().map(|_| ()).map_err(|e| e.to_string())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.level.trim().is_empty() {
            return Err("Log level cannot be empty".to_string());
        }
        Ok(())
    }
}
