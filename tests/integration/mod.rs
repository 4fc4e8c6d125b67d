//! Integration tests for llm-router
//!
//! These tests build routers through the public API and configuration files.

pub mod config_tests;
pub mod routing_tests;
