//! Fallback configuration and execution result types
//!
//! This module defines cross-model fallback mappings and the metadata
//! returned with a routed response.

use super::deployment::DeploymentId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Routed response with metadata
///
/// Contains the value produced by the winning deployment along with which
/// deployment served it, how many attempts were spent, and whether a fallback
/// model was used.
#[derive(Debug)]
pub struct RoutedResponse<T> {
    /// The successful result value
    pub response: T,
    /// The deployment that successfully handled the request
    pub deployment_id: DeploymentId,
    /// Logical model name that served the request (differs from the requested one after a fallback)
    pub model_used: String,
    /// Total attempts across all models, limiter denials included
    pub attempts: u32,
    /// Whether a fallback model was used
    pub used_fallback: bool,
    /// Time from routing start to the first successful response (or first chunk)
    pub latency: Duration,
}

/// Fallback configuration
///
/// Maps a logical model name to the ordered list of model names to try once
/// its own candidates are exhausted.
///
/// ## Thread Safety
///
/// Uses `RwLock` to allow concurrent reads and exclusive writes on reload.
#[derive(Debug, Default)]
pub struct FallbackConfig {
    fallbacks: RwLock<HashMap<String, Vec<String>>>,
}

impl FallbackConfig {
    /// Create a new empty fallback configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add fallback models for a model (builder pattern)
    pub fn add(self, model: &str, fallbacks: Vec<String>) -> Self {
        self.set(model, fallbacks);
        self
    }

    /// Replace the fallback list of a model (runtime method)
    pub fn set(&self, model: &str, fallbacks: Vec<String>) {
        self.fallbacks.write().insert(model.to_string(), fallbacks);
    }

    /// Replace every mapping at once
    pub fn replace_all(&self, mappings: HashMap<String, Vec<String>>) {
        *self.fallbacks.write() = mappings;
    }

    /// Fallback models configured for `model_name` (empty if none)
    pub fn get_fallbacks(&self, model_name: &str) -> Vec<String> {
        self.fallbacks
            .read()
            .get(model_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Primary model followed by at most `max_depth` distinct fallbacks
    pub fn chain(&self, model_name: &str, max_depth: usize) -> Vec<String> {
        let mut models = vec![model_name.to_string()];
        for fallback in self.get_fallbacks(model_name) {
            if models.len() > max_depth {
                break;
            }
            if !models.contains(&fallback) {
                models.push(fallback);
            }
        }
        models
    }
}
