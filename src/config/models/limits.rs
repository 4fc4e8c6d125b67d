//! Admission limit configuration

use crate::core::router::{ConfigError, RateLimits};
use serde::{Deserialize, Serialize};

/// Limits as written in the configuration file
///
/// Values are signed so a negative limit is reported as a configuration error
/// instead of a YAML type error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimitsEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_requests: Option<i64>,
}

impl LimitsEntry {
    /// Convert to limiter limits; `owner` names the deployment or caller in errors
    pub fn to_rate_limits(&self, owner: &str) -> Result<RateLimits, ConfigError> {
        let rpm = non_negative(owner, "rpm", self.rpm)?;
        let tpm = non_negative(owner, "tpm", self.tpm)?;
        let max_parallel_requests = non_negative(owner, "max_parallel_requests", self.max_parallel_requests)?
            .map(|value| u32::try_from(value).unwrap_or(u32::MAX));

        Ok(RateLimits {
            rpm,
            tpm,
            max_parallel_requests,
        })
    }
}

fn non_negative(owner: &str, field: &'static str, value: Option<i64>) -> Result<Option<u64>, ConfigError> {
    match value {
        Some(value) if value < 0 => Err(ConfigError::NegativeLimit {
            id: owner.to_string(),
            field,
            value,
        }),
        Some(value) => Ok(Some(value as u64)),
        None => Ok(None),
    }
}
