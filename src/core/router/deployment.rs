//! Deployment records
//!
//! This module defines the building blocks the registry stores:
//! - `Deployment`: a concrete backend instance serving one or more logical model names
//! - `DeploymentConfig`: routing weight, priority tier, admission limits and timeout
//! - `ProviderKind`: which vendor protocol the transport layer must speak
//!
//! Records are immutable once registered. Changing limits means registering a
//! new record under the same id, which replaces the old one as a whole.

use super::error::ConfigError;
use super::limiter::RateLimits;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Deployment identifier (unique within the registry)
pub type DeploymentId = String;

/// Backend vendor kind, consumed by the transport/translation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Azure,
    Anthropic,
    Bedrock,
    Vertex,
    Gemini,
    Mistral,
    Cohere,
    Groq,
    Ollama,
    #[serde(rename = "openai_compatible")]
    OpenAICompatible,
    Other,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Azure => "azure",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Vertex => "vertex",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Cohere => "cohere",
            ProviderKind::Groq => "groq",
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAICompatible => "openai_compatible",
            ProviderKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Deployment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentConfig {
    /// Weight for weighted random selection (must be > 0)
    pub weight: f64,

    /// Priority tier (lower tiers are exhausted first)
    pub tier: u32,

    /// Admission limits; absent fields are unlimited
    pub limits: RateLimits,

    /// Per-call timeout, bounded further by the request deadline
    pub timeout: Option<Duration>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            weight: 1.0,
            tier: 0,
            limits: RateLimits::default(),
            timeout: None,
        }
    }
}

/// Deployment - a concrete backend instance
///
/// Represents a single deployment of a provider (e.g., "openai-gpt4-east").
/// Multiple deployments can serve the same logical model name (e.g., "gpt-4"),
/// and one deployment may serve several names.
///
/// ## Example
///
/// ```rust
/// use llm_router::core::router::{Deployment, DeploymentConfig, ProviderKind, RateLimits};
///
/// let deployment = Deployment::new("openai-gpt4-east", ProviderKind::OpenAI, "gpt-4o", "gpt-4")
///     .with_config(DeploymentConfig {
///         weight: 2.0,
///         limits: RateLimits {
///             rpm: Some(500),
///             tpm: Some(100_000),
///             max_parallel_requests: Some(16),
///         },
///         ..Default::default()
///     })
///     .with_tags(vec!["production".to_string()]);
///
/// assert!(deployment.validate().is_ok());
/// assert!(deployment.serves("gpt-4"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: DeploymentId,

    /// Logical model names this deployment serves
    pub model_names: Vec<String>,

    /// Vendor kind
    pub provider: ProviderKind,

    /// Backend model identifier (e.g., "azure/gpt-4-turbo")
    pub model: String,

    /// Backend endpoint override
    pub api_base: Option<String>,

    /// Name of the environment variable holding the credential
    pub api_key_env: Option<String>,

    /// Routing and admission configuration
    pub config: DeploymentConfig,

    /// Free-form tags (e.g., ["production", "fast"])
    pub tags: Vec<String>,
}

impl Deployment {
    /// Create a new deployment serving a single logical model name
    pub fn new(
        id: impl Into<DeploymentId>,
        provider: ProviderKind,
        model: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model_names: vec![model_name.into()],
            provider,
            model: model.into(),
            api_base: None,
            api_key_env: None,
            config: DeploymentConfig::default(),
            tags: Vec::new(),
        }
    }

    /// Set deployment configuration (builder pattern)
    pub fn with_config(mut self, config: DeploymentConfig) -> Self {
        self.config = config;
        self
    }

    /// Add another logical model name (builder pattern)
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        if !self.model_names.contains(&model_name) {
            self.model_names.push(model_name);
        }
        self
    }

    /// Set deployment tags (builder pattern)
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the endpoint and credential reference (builder pattern)
    pub fn with_endpoint(mut self, api_base: Option<String>, api_key_env: Option<String>) -> Self {
        self.api_base = api_base;
        self.api_key_env = api_key_env;
        self
    }

    /// Whether this deployment serves the given logical model name
    pub fn serves(&self, model_name: &str) -> bool {
        self.model_names.iter().any(|m| m == model_name)
    }

    pub fn tier(&self) -> u32 {
        self.config.tier
    }

    pub fn weight(&self) -> f64 {
        self.config.weight
    }

    /// Check the record before it enters the registry
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }

        if self.model_names.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::NoModelNames(self.id.clone()));
        }

        let weight = self.config.weight;
        if !weight.is_finite() || weight <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                id: self.id.clone(),
                weight,
            });
        }

        Ok(())
    }
}
