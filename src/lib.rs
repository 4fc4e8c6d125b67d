//! # llm-router
//!
//! Deployment router for an LLM gateway. Routes each request for a logical
//! model name to one of several concrete backend deployments, tracking their
//! health and admission limits, and retries or falls back when a deployment
//! fails.
//!
//! ## Features
//!
//! - **Tiered selection**: lower priority tiers are exhausted before higher ones
//! - **Strategies**: weighted shuffle, least-busy, round-robin, latency and usage based
//! - **Cooldowns**: exponential backoff on retriable failures, per deployment
//! - **Admission control**: requests, tokens and concurrency per window, per deployment and per caller
//! - **Retry and fallback**: bounded attempt budget, cross-model fallbacks, shared deadline
//! - **Streaming**: retry covers stream setup only
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_router::{Config, Router};
//! use llm_router::core::router::{CompletionResponse, Deployment, Transport, TransportError};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Transport for Echo {
//!     async fn invoke(
//!         &self,
//!         _deployment: &Deployment,
//!         payload: &serde_json::Value,
//!         _deadline: tokio::time::Instant,
//!     ) -> Result<CompletionResponse, TransportError> {
//!         Ok(CompletionResponse { payload: payload.clone(), usage: None })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/router.yaml").await?;
//!     let router = Router::from_config(&config, Arc::new(Echo))?;
//!
//!     let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
//!     let routed = router
//!         .completion("gpt", serde_json::json!({"messages": []}), Some("team-a"), deadline)
//!         .await?;
//!     println!("served by {} after {} attempts", routed.deployment_id, routed.attempts);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use core::router::{Router, RouterConfig, RouterError, RoutingRequest, RoutingStrategy};
pub use utils::error::{GatewayError, Result};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build information
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    /// Version number
    pub version: &'static str,
    /// Build timestamp (seconds since the epoch)
    pub build_time: &'static str,
    /// Git commit hash
    pub git_hash: &'static str,
    /// Rust version
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            rust_version: option_env!("RUST_VERSION").unwrap_or("unknown"),
        }
    }
}

/// Build information captured at compile time
pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}
