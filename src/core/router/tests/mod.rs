//! Router tests module
//!
//! Contains tests for the router core: registry, health, limiter, strategies
//! and the dispatch loop.

mod support;

mod strategy_tests;
