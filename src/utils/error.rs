//! Error types for the router crate

use crate::core::router::{ConfigError, RouterError};
use thiserror::Error;

/// Result type alias for the router crate
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Crate-level error type
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid deployment record
    #[error("Invalid deployment: {0}")]
    Deployment(#[from] ConfigError),

    /// Routing errors
    #[error("Routing error: {0}")]
    Router(#[from] RouterError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl GatewayError {
    pub fn config(message: impl Into<String>) -> Self {
        GatewayError::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }
}
