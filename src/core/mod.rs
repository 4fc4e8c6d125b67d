//! Core functionality for the router
//!
//! This module contains the routing core: deployment registry, health and
//! admission state, strategies and the dispatch orchestrator.

pub mod router;
