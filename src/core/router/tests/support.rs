//! Shared fixtures: test deployments and a scripted transport

use crate::core::router::config::RouterConfig;
use crate::core::router::deployment::{Deployment, DeploymentConfig, ProviderKind};
use crate::core::router::request::RoutingRequest;
use crate::core::router::router::Router;
use crate::core::router::transport::{
    ChunkStream, CompletionResponse, StreamChunk, TokenUsage, Transport, TransportError,
};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What the scripted transport does for one call
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Respond with the given completion token count
    Succeed { tokens: u64 },
    /// Fail with the given error
    Fail(TransportError),
    /// Sleep, then behave as the inner step
    Delay(Duration, Box<Behavior>),
    /// Stream `count` chunks, then optionally fail
    Chunks {
        count: usize,
        tokens: u64,
        then_fail: Option<TransportError>,
    },
    /// Stream `count` chunks, then never produce another item
    Stall { count: usize },
}

impl Behavior {
    pub fn ok() -> Self {
        Behavior::Succeed { tokens: 10 }
    }

    pub fn delayed(delay: Duration, then: Behavior) -> Self {
        Behavior::Delay(delay, Box::new(then))
    }
}

/// Transport double driven per deployment id
///
/// Scripted steps are consumed first; once exhausted the deployment's default
/// behavior applies (success if none was set).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Behavior>>>,
    defaults: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn always(&self, deployment_id: &str, behavior: Behavior) {
        self.defaults
            .lock()
            .insert(deployment_id.to_string(), behavior);
    }

    pub fn script(&self, deployment_id: &str, steps: Vec<Behavior>) {
        self.scripts
            .lock()
            .insert(deployment_id.to_string(), steps.into());
    }

    /// Deployment ids in invocation order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, deployment_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|id| id.as_str() == deployment_id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_behavior(&self, deployment_id: &str) -> Behavior {
        self.calls.lock().push(deployment_id.to_string());
        if let Some(step) = self
            .scripts
            .lock()
            .get_mut(deployment_id)
            .and_then(|steps| steps.pop_front())
        {
            return step;
        }
        self.defaults
            .lock()
            .get(deployment_id)
            .cloned()
            .unwrap_or_else(Behavior::ok)
    }

    /// Resolve delays, returning the terminal behavior
    async fn settle(mut behavior: Behavior) -> Behavior {
        while let Behavior::Delay(delay, next) = behavior {
            tokio::time::sleep(delay).await;
            behavior = *next;
        }
        behavior
    }
}

fn usage(tokens: u64) -> TokenUsage {
    TokenUsage {
        prompt_tokens: 0,
        completion_tokens: tokens,
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(
        &self,
        deployment: &Deployment,
        payload: &serde_json::Value,
        _deadline: Instant,
    ) -> Result<CompletionResponse, TransportError> {
        let behavior = self.next_behavior(&deployment.id);
        match Self::settle(behavior).await {
            Behavior::Succeed { tokens } | Behavior::Chunks { tokens, .. } => {
                Ok(CompletionResponse {
                    payload: serde_json::json!({
                        "deployment": deployment.id,
                        "echo": payload,
                    }),
                    usage: Some(usage(tokens)),
                })
            }
            Behavior::Fail(err) => Err(err),
            Behavior::Stall { .. } => std::future::pending().await,
            Behavior::Delay(..) => unreachable!("delays are settled"),
        }
    }

    async fn invoke_stream(
        &self,
        deployment: &Deployment,
        _payload: &serde_json::Value,
        _deadline: Instant,
    ) -> Result<ChunkStream, TransportError> {
        let behavior = self.next_behavior(&deployment.id);
        let mut stall = false;
        let (count, tokens, then_fail) = match Self::settle(behavior).await {
            Behavior::Succeed { tokens } => (2, tokens, None),
            Behavior::Chunks {
                count,
                tokens,
                then_fail,
            } => (count, tokens, then_fail),
            Behavior::Stall { count } => {
                stall = true;
                (count, 0, None)
            }
            Behavior::Fail(err) => return Err(err),
            Behavior::Delay(..) => unreachable!("delays are settled"),
        };

        let mut items: Vec<Result<StreamChunk, TransportError>> = (0..count)
            .map(|index| {
                Ok(StreamChunk {
                    payload: serde_json::json!({ "deployment": deployment.id, "index": index }),
                    usage: (index + 1 == count && then_fail.is_none() && !stall)
                        .then(|| usage(tokens)),
                })
            })
            .collect();
        if let Some(err) = then_fail {
            items.push(Err(err));
        }
        let items = futures::stream::iter(items);
        if stall {
            return Ok(Box::pin(items.chain(futures::stream::pending())));
        }
        Ok(Box::pin(items))
    }
}

/// Helper function to create a test deployment
pub fn create_test_deployment(id: &str, model_name: &str) -> Deployment {
    Deployment::new(id, ProviderKind::OpenAI, "gpt-4o", model_name)
}

pub fn tiered_deployment(id: &str, model_name: &str, tier: u32) -> Deployment {
    create_test_deployment(id, model_name).with_config(DeploymentConfig {
        tier,
        ..Default::default()
    })
}

/// Settings that cool a deployment down on its first retriable failure
pub fn strict_config() -> RouterConfig {
    RouterConfig {
        allowed_fails: 0,
        ..Default::default()
    }
}

pub fn router_with(
    config: RouterConfig,
    transport: &Arc<ScriptedTransport>,
    deployments: Vec<Deployment>,
) -> Router {
    let router = Router::new(config, transport.clone());
    for deployment in deployments {
        router.register(deployment).unwrap();
    }
    router
}

pub fn request(model: &str) -> RoutingRequest {
    RoutingRequest::with_timeout(model, serde_json::json!({"messages": []}), Duration::from_secs(30))
}
