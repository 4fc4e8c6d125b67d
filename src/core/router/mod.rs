//! Deployment router for LLM backends
//!
//! This module provides deployment registration, health-aware selection,
//! admission control and retry/fallback dispatch across backend deployments.
//!
//! ## Module Structure
//!
//! - `config` - Router settings and their defaults
//! - `deployment` - Deployment records
//! - `error` - Routing and registration error types
//! - `registry` - Deployment registry and the logical-model index
//! - `health` - Health and cooldown tracking
//! - `limiter` - Rate/concurrency admission control
//! - `strategy_impl` - Routing strategies (pure selection)
//! - `selection` - Candidate snapshots and deployment selection
//! - `request` - Per-call routing request
//! - `transport` - Backend call seam
//! - `ledger` - Spend notification hook
//! - `fallback` - Cross-model fallbacks and routed response metadata
//! - `router` - Core Router struct and deployment management
//! - `execution` - Error classification and attempt bookkeeping
//! - `execute_impl` - Dispatch loop, route and route_stream
//! - `gateway_config` - Construction from the configuration file

pub mod config;
pub mod deployment;
pub mod error;
pub mod execute_impl;
pub mod execution;
pub mod fallback;
pub mod gateway_config;
pub mod health;
pub mod ledger;
pub mod limiter;
pub mod registry;
pub mod request;
pub mod router;
pub mod selection;
pub mod strategy_impl;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::RouterConfig;
pub use deployment::{Deployment, DeploymentConfig, DeploymentId, ProviderKind};
pub use error::{ConfigError, RouterError};
pub use execution::{call_deadline, classify_error, is_retryable_error};
pub use fallback::{FallbackConfig, RoutedResponse};
pub use health::{CallOutcome, CooldownPolicy, HealthSnapshot, HealthTracker};
pub use ledger::{SpendEvent, SpendLedger, SpendNotifier};
pub use limiter::{Admission, DenyReason, LimiterSnapshot, RateLimiter, RateLimits};
pub use registry::{CandidateTiers, DeploymentRegistry};
pub use request::{RoutingRequest, estimate_tokens};
pub use router::{DeploymentStats, Router};
pub use strategy_impl::{
    CandidateSnapshot, RoundRobinCursors, RoutingStrategy, SelectionOutcome, select,
};
pub use transport::{
    ChunkStream, CompletionResponse, StreamChunk, TokenUsage, Transport, TransportError,
    TransportErrorKind,
};
