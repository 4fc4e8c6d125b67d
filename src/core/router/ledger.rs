//! Spend notification hook
//!
//! Completed calls are reported to a `SpendLedger` through a bounded channel
//! drained by a background task, so routing never waits on accounting.

use super::deployment::DeploymentId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// One completed call's token cost
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendEvent {
    pub request_id: Uuid,
    pub caller: Option<String>,
    pub deployment_id: DeploymentId,
    /// Logical model name that served the request
    pub model: String,
    pub tokens: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Persistent spend/budget storage (external collaborator)
#[async_trait]
pub trait SpendLedger: Send + Sync {
    async fn record_spend(&self, event: SpendEvent);
}

/// Fire-and-forget handle onto a spend ledger
#[derive(Debug, Clone)]
pub struct SpendNotifier {
    sender: mpsc::Sender<SpendEvent>,
}

impl SpendNotifier {
    /// Spawn the forwarding task on the current tokio runtime
    ///
    /// The task exits once every notifier clone has been dropped.
    pub fn spawn(ledger: Arc<dyn SpendLedger>, buffer: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SpendEvent>(buffer.max(1));

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                ledger.record_spend(event).await;
            }
            debug!("spend notifier channel closed");
        });

        Self { sender }
    }

    /// Queue an event without waiting; returns false if it was dropped
    pub fn notify(&self, event: SpendEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    deployment_id = %event.deployment_id,
                    tokens = event.tokens,
                    "spend buffer full, event dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
