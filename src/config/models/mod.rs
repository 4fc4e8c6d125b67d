//! Configuration data models
//!
//! This module defines the YAML-facing configuration structures.

pub mod deployment;
pub mod limits;
pub mod logging;

pub use deployment::*;
pub use limits::*;
pub use logging::*;

/// Default deployment weight
pub fn default_weight() -> f64 {
    1.0
}

/// Default log level
pub fn default_log_level() -> String {
    "info".to_string()
}
