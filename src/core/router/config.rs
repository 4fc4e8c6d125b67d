//! Router configuration types
//!
//! This module defines the router settings: routing strategy, attempt budget,
//! cooldown backoff, limiter window and fallback depth.

use super::error::ConfigError;
use super::health::CooldownPolicy;
use super::strategy_impl::RoutingStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Router configuration
///
/// ## Defaults
///
/// - `routing_strategy`: SimpleShuffle
/// - `max_attempts`: 3
/// - `allowed_fails`: 2 (the third consecutive retriable failure starts a cooldown)
/// - `cooldown_base_ms`: 5000, `cooldown_max_ms`: 300000, `cooldown_max_exponent`: 6
/// - `rate_limit_window_secs`: 60
/// - `health_window_secs`: 60
/// - `timeout_secs`: 60
/// - `max_fallback_depth`: 2
/// - `spend_buffer`: 1024
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Routing strategy to use for deployment selection
    pub routing_strategy: RoutingStrategy,

    /// Attempts per logical model, limiter denials included
    pub max_attempts: u32,

    /// Consecutive retriable failures tolerated before cooldown
    pub allowed_fails: u32,

    /// First cooldown duration in milliseconds
    pub cooldown_base_ms: u64,

    /// Cooldown ceiling in milliseconds
    pub cooldown_max_ms: u64,

    /// Cap on the backoff doubling exponent
    pub cooldown_max_exponent: u32,

    /// Fixed limiter window in seconds
    pub rate_limit_window_secs: u64,

    /// Health observation window in seconds
    pub health_window_secs: u64,

    /// Default request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum number of fallback models tried after the primary
    pub max_fallback_depth: u32,

    /// Capacity of the spend notification buffer
    pub spend_buffer: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            routing_strategy: RoutingStrategy::SimpleShuffle,
            max_attempts: 3,
            allowed_fails: 2,
            cooldown_base_ms: 5_000,
            cooldown_max_ms: 300_000,
            cooldown_max_exponent: 6,
            rate_limit_window_secs: 60,
            health_window_secs: 60,
            timeout_secs: 60,
            max_fallback_depth: 2,
            spend_buffer: 1024,
        }
    }
}

impl RouterConfig {
    pub fn cooldown_policy(&self) -> CooldownPolicy {
        CooldownPolicy {
            base: Duration::from_millis(self.cooldown_base_ms),
            max: Duration::from_millis(self.cooldown_max_ms),
            max_exponent: self.cooldown_max_exponent,
            allowed_fails: self.allowed_fails,
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn health_window(&self) -> Duration {
        Duration::from_secs(self.health_window_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the router cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cooldown_max_ms < self.cooldown_base_ms {
            return Err(ConfigError::InvalidSetting {
                field: "cooldown_max_ms",
                reason: format!(
                    "{} is smaller than cooldown_base_ms ({})",
                    self.cooldown_max_ms, self.cooldown_base_ms
                ),
            });
        }
        if self.cooldown_max_exponent > 31 {
            return Err(ConfigError::InvalidSetting {
                field: "cooldown_max_exponent",
                reason: "must be at most 31".to_string(),
            });
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "rate_limit_window_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.health_window_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "health_window_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
