//! Deployment registry
//!
//! Holds every registered deployment and the logical-model index. Reads are
//! lock-free (DashMap); writes are rare and serialized by a registry-level
//! mutex so two reloads never interleave. Records are stored as `Arc` and
//! replaced whole, so a reader sees either the old record or the new one.

use super::deployment::{Deployment, DeploymentId};
use super::error::ConfigError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Candidates for one model name, grouped by tier in ascending order
pub type CandidateTiers = Vec<Vec<Arc<Deployment>>>;

#[derive(Debug, Default)]
pub struct DeploymentRegistry {
    deployments: DashMap<DeploymentId, Arc<Deployment>>,
    model_index: DashMap<String, Vec<DeploymentId>>,
    model_aliases: DashMap<String, String>,
    write_lock: Mutex<()>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a deployment
    ///
    /// Returns the record that was replaced, if any.
    pub fn register(&self, deployment: Deployment) -> Result<Option<Arc<Deployment>>, ConfigError> {
        deployment.validate()?;

        let _guard = self.write_lock.lock();
        let id = deployment.id.clone();
        let record = Arc::new(deployment);
        let previous = self.deployments.insert(id.clone(), record.clone());

        if let Some(old) = &previous {
            for model in old.model_names.iter().filter(|m| !record.serves(m)) {
                self.unindex(model, &id);
            }
        }
        for model in &record.model_names {
            let mut ids = self.model_index.entry(model.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id.clone());
            }
        }

        info!(
            deployment_id = %id,
            models = ?record.model_names,
            provider = %record.provider,
            tier = record.tier(),
            replaced = previous.is_some(),
            "deployment registered"
        );
        Ok(previous)
    }

    /// Remove a deployment
    ///
    /// Calls already dispatched to it keep their own `Arc` and finish normally.
    pub fn deregister(&self, id: &str) -> Option<Arc<Deployment>> {
        let _guard = self.write_lock.lock();
        let (_, removed) = self.deployments.remove(id)?;
        for model in &removed.model_names {
            self.unindex(model, id);
        }
        info!(deployment_id = %id, "deployment deregistered");
        Some(removed)
    }

    /// Deployments currently serving `model_name`, grouped by tier
    ///
    /// Tiers are ascending; within a tier deployments are ordered by id so
    /// selection is deterministic for equal scores.
    pub fn list_candidates(&self, model_name: &str) -> CandidateTiers {
        let resolved = self.resolve_model_name(model_name);
        let ids = match self.model_index.get(&resolved) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };

        let mut tiers: BTreeMap<u32, Vec<Arc<Deployment>>> = BTreeMap::new();
        for id in ids {
            if let Some(deployment) = self.deployments.get(&id) {
                // Index and record are updated separately; trust the record
                if deployment.serves(&resolved) {
                    tiers
                        .entry(deployment.tier())
                        .or_default()
                        .push(deployment.clone());
                }
            }
        }

        tiers
            .into_values()
            .map(|mut tier| {
                tier.sort_by(|a, b| a.id.cmp(&b.id));
                tier
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Deployment>> {
        self.deployments.get(id).map(|d| d.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.deployments.contains_key(id)
    }

    /// Add a model name alias
    pub fn add_model_alias(&self, alias: &str, model_name: &str) {
        self.model_aliases
            .insert(alias.to_string(), model_name.to_string());
    }

    /// Replace every alias with `aliases`
    pub fn replace_model_aliases(&self, aliases: &HashMap<String, String>) {
        self.model_aliases
            .retain(|alias, _| aliases.contains_key(alias));
        for (alias, target) in aliases {
            self.add_model_alias(alias, target);
        }
    }

    /// Resolve a model name (handles aliases)
    pub fn resolve_model_name(&self, name: &str) -> String {
        self.model_aliases
            .get(name)
            .map(|v| v.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// All logical model names with at least one deployment, sorted
    pub fn list_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self
            .model_index
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        models.sort();
        models
    }

    /// All deployment ids, sorted
    pub fn list_deployments(&self) -> Vec<DeploymentId> {
        let mut ids: Vec<DeploymentId> = self
            .deployments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    fn unindex(&self, model: &str, id: &str) {
        let now_empty = match self.model_index.get_mut(model) {
            Some(mut ids) => {
                ids.retain(|existing| existing != id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.model_index.remove_if(model, |_, ids| ids.is_empty());
        }
    }
}
