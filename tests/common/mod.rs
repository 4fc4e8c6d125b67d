//! Common test utilities for llm-router
//!
//! - Configuration fixtures written to temporary files
//! - A transport driven by per-deployment failure switches
//! - An in-memory spend ledger

pub mod fixtures;
pub mod transport;

pub use fixtures::{SAMPLE_CONFIG, write_config};
pub use transport::{MemoryLedger, SwitchTransport};

/// Assert that a result is Ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(_) => panic!("Expected Err, got Ok"),
            Err(e) => e,
        }
    };
}
