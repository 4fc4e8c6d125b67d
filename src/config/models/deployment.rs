//! Deployment entries (`model_list`)

use super::default_weight;
use super::limits::LimitsEntry;
use crate::core::router::{ConfigError, Deployment, DeploymentConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One `model_list` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEntry {
    /// Unique deployment id
    pub deployment_id: String,
    /// Single logical model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Additional logical model names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_names: Vec<String>,
    /// Vendor protocol
    #[serde(default)]
    pub provider: ProviderKind,
    /// Provider-side model identifier
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Name of the environment variable holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub tier: u32,
    /// Per-call timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub limits: LimitsEntry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DeploymentEntry {
    /// All logical names this entry serves, without duplicates
    pub fn served_models(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.model_names.len() + 1);
        for name in self.model_name.iter().chain(self.model_names.iter()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Build the registry record
    pub fn to_deployment(&self) -> Result<Deployment, ConfigError> {
        let limits = self.limits.to_rate_limits(&self.deployment_id)?;
        let deployment = Deployment {
            id: self.deployment_id.clone(),
            model_names: self.served_models(),
            provider: self.provider,
            model: self.model.clone(),
            api_base: self.api_base.clone(),
            api_key_env: self.api_key_env.clone(),
            config: DeploymentConfig {
                weight: self.weight,
                tier: self.tier,
                limits,
                timeout: self.timeout_secs.map(Duration::from_secs),
            },
            tags: self.tags.clone(),
        };
        deployment.validate()?;
        Ok(deployment)
    }
}
