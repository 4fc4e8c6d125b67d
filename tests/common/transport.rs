//! Test transport and spend ledger

use async_trait::async_trait;
use llm_router::core::router::{
    CompletionResponse, Deployment, SpendEvent, SpendLedger, TokenUsage, Transport, TransportError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;

/// Succeeds unless the deployment has been switched to failing
#[derive(Debug, Default)]
pub struct SwitchTransport {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl SwitchTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `deployment_id` fail with a retriable server error
    pub fn fail(&self, deployment_id: &str) {
        self.failing.lock().insert(deployment_id.to_string());
    }

    pub fn recover(&self, deployment_id: &str) {
        self.failing.lock().remove(deployment_id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for SwitchTransport {
    async fn invoke(
        &self,
        deployment: &Deployment,
        _payload: &serde_json::Value,
        _deadline: Instant,
    ) -> Result<CompletionResponse, TransportError> {
        self.calls.lock().push(deployment.id.clone());
        if self.failing.lock().contains(&deployment.id) {
            return Err(TransportError::server(503, "service unavailable"));
        }
        Ok(CompletionResponse {
            payload: serde_json::json!({ "model": deployment.model }),
            usage: Some(TokenUsage {
                prompt_tokens: 5,
                completion_tokens: 7,
            }),
        })
    }
}

/// Spend ledger that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    events: Mutex<Vec<SpendEvent>>,
}

impl MemoryLedger {
    pub fn events(&self) -> Vec<SpendEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl SpendLedger for MemoryLedger {
    async fn record_spend(&self, event: SpendEvent) {
        self.events.lock().push(event);
    }
}
