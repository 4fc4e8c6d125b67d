//! Utility modules for the router
//!
//! - **error**: crate-level error type and `Result` alias
//! - **logging**: tracing subscriber initialisation

pub mod error;
pub mod logging;

pub use error::{GatewayError, Result};
pub use logging::init_logging;
