//! Execution implementation for Router
//!
//! This module contains the dispatch loop and the caller-facing `route`,
//! `route_stream` and `completion` methods built on it.

use super::deployment::Deployment;
use super::error::RouterError;
use super::execution::{
    AttemptState, Dispatched, call_deadline, classify_error, is_retryable_error,
};
use super::fallback::RoutedResponse;
use super::health::CallOutcome;
use super::ledger::{SpendEvent, SpendNotifier};
use super::limiter::Admission;
use super::request::RoutingRequest;
use super::router::Router;
use super::strategy_impl::SelectionOutcome;
use super::transport::{ChunkStream, CompletionResponse, StreamChunk, TokenUsage, TransportError};
use chrono::Utc;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

impl Router {
    /// Route a unary request
    ///
    /// # Flow
    ///
    /// 1. Admit the caller against its own limits (if configured)
    /// 2. Dispatch across the model's deployments, then its fallbacks
    /// 3. Release admissions with the reported token usage
    /// 4. Notify the spend ledger
    pub async fn route(
        &self,
        request: RoutingRequest,
    ) -> Result<RoutedResponse<CompletionResponse>, RouterError> {
        let span = info_span!("route", request_id = %request.request_id, model = %request.model);
        let caller_admission = self.admit_caller(&request)?;

        let transport = &self.transport;
        let payload = &request.payload;
        let result = self
            .dispatch(&request, |deployment: Arc<Deployment>, deadline: Instant| async move {
                transport.invoke(&deployment, payload, deadline).await
            })
            .instrument(span)
            .await;

        let dispatched = match result {
            Ok(dispatched) => dispatched,
            Err(err) => {
                if let Some(admission) = caller_admission {
                    admission.release(0);
                }
                return Err(err);
            }
        };

        let tokens = dispatched
            .value
            .usage
            .map(|usage| usage.total_tokens())
            .unwrap_or(request.estimated_tokens);
        dispatched.admission.release(tokens);
        if let Some(admission) = caller_admission {
            admission.release(tokens);
        }

        if let Some(spend) = &self.spend {
            notify_spend(
                spend,
                &request,
                &dispatched.deployment.id,
                &dispatched.model_used,
                tokens,
            );
        }

        Ok(RoutedResponse {
            response: dispatched.value,
            deployment_id: dispatched.deployment.id.clone(),
            model_used: dispatched.model_used,
            attempts: dispatched.attempts,
            used_fallback: dispatched.used_fallback,
            latency: dispatched.latency,
        })
    }

    /// Route a streamed request
    ///
    /// Retry and fallback only cover stream setup: once the first chunk has
    /// arrived the deployment counts as successful, and a later upstream error
    /// is handed to the caller as the stream's last item instead of being
    /// retried. Admissions are released when the stream ends or is dropped.
    pub async fn route_stream(
        &self,
        request: RoutingRequest,
    ) -> Result<RoutedResponse<ChunkStream>, RouterError> {
        let span = info_span!("route_stream", request_id = %request.request_id, model = %request.model);
        let caller_admission = self.admit_caller(&request)?;

        let transport = &self.transport;
        let payload = &request.payload;
        let result = self
            .dispatch(&request, |deployment: Arc<Deployment>, deadline: Instant| async move {
                let mut upstream = match transport.invoke_stream(&deployment, payload, deadline).await {
                    Ok(upstream) => upstream,
                    Err(err) => return Err(err),
                };
                match upstream.next().await {
                    Some(Ok(first)) => Ok((Some(first), upstream)),
                    Some(Err(err)) => Err(err),
                    None => Ok((None, upstream)),
                }
            })
            .instrument(span)
            .await;

        let Dispatched {
            value: (first, mut upstream),
            admission,
            deployment,
            model_used,
            attempts,
            used_fallback,
            latency,
        } = match result {
            Ok(dispatched) => dispatched,
            Err(err) => {
                if let Some(admission) = caller_admission {
                    admission.release(0);
                }
                return Err(err);
            }
        };

        let deployment_id = deployment.id.clone();
        let spend = self.spend.clone();
        let estimated = request.estimated_tokens;
        let event_model = model_used.clone();

        let stream = async_stream::stream! {
            let mut usage: Option<TokenUsage> = None;

            if let Some(chunk) = first {
                usage = chunk.usage.or(usage);
                yield Ok::<StreamChunk, TransportError>(chunk);
            }

            let deadline = request.deadline;
            loop {
                let item = match tokio::time::timeout_at(deadline, upstream.next()).await {
                    Ok(Some(item)) => item,
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            request_id = %request.request_id,
                            deployment_id = %deployment.id,
                            "stream deadline exceeded"
                        );
                        yield Err(TransportError::timeout("request deadline exceeded mid-stream"));
                        break;
                    }
                };
                match item {
                    Ok(chunk) => {
                        usage = chunk.usage.or(usage);
                        yield Ok(chunk);
                    }
                    Err(err) => {
                        warn!(
                            request_id = %request.request_id,
                            deployment_id = %deployment.id,
                            error = %err,
                            "stream terminated mid-flight"
                        );
                        yield Err(err);
                        break;
                    }
                }
            }

            let tokens = usage.map(|u| u.total_tokens()).unwrap_or(estimated);
            admission.release(tokens);
            if let Some(admission) = caller_admission {
                admission.release(tokens);
            }
            if let Some(spend) = &spend {
                notify_spend(spend, &request, &deployment.id, &event_model, tokens);
            }
        };

        Ok(RoutedResponse {
            response: Box::pin(stream),
            deployment_id,
            model_used,
            attempts,
            used_fallback,
            latency,
        })
    }

    /// Caller-facing entry point
    ///
    /// Builds a request from its parts, estimating the token cost from the
    /// payload, and routes it.
    pub async fn completion(
        &self,
        model_name: &str,
        payload: serde_json::Value,
        caller: Option<&str>,
        deadline: Instant,
    ) -> Result<RoutedResponse<CompletionResponse>, RouterError> {
        let mut request = RoutingRequest::new(model_name, payload, deadline).with_payload_estimate();
        if let Some(caller) = caller {
            request = request.with_caller(caller);
        }
        self.route(request).await
    }

    /// Run `operation` against deployments of the requested model, then its fallbacks
    ///
    /// `operation` receives the chosen deployment and the deadline for that
    /// call. The attempt budget applies per logical model; the request deadline
    /// is shared across all of them.
    pub(crate) async fn dispatch<T, F, Fut>(
        &self,
        request: &RoutingRequest,
        operation: F,
    ) -> Result<Dispatched<T>, RouterError>
    where
        F: Fn(Arc<Deployment>, Instant) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let start = Instant::now();
        let primary = self.registry.resolve_model_name(&request.model);
        if self.registry.list_candidates(&primary).is_empty() {
            warn!(model = %request.model, "no deployments configured");
            return Err(RouterError::NoDeploymentsConfigured(request.model.clone()));
        }

        let models = self
            .fallback_config
            .chain(&primary, self.config.max_fallback_depth as usize);

        let mut attempts = 0u32;
        let mut backend_calls = 0u32;
        let mut last_error: Option<TransportError> = None;

        for (index, model) in models.iter().enumerate() {
            let used_fallback = index > 0;
            if used_fallback {
                if self.registry.list_candidates(model).is_empty() {
                    warn!(from = %primary, to = %model, "fallback model has no deployments, skipping");
                    continue;
                }
                info!(from = %primary, to = %model, attempts, "falling back to next model");
            }

            let mut state = AttemptState::default();
            let mut retry_pass = false;

            while state.attempts < self.config.max_attempts {
                let now = Instant::now();
                if request.is_expired(now) {
                    warn!(attempts = attempts + state.attempts, "request deadline exceeded");
                    return Err(RouterError::DeadlineExceeded {
                        model: request.model.clone(),
                        attempts: attempts + state.attempts,
                    });
                }

                let excluded = state.exclusions(&request.excluded, retry_pass);
                let deployment =
                    match self.select_deployment(model, &excluded, request.estimated_tokens, now) {
                        SelectionOutcome::Selected(deployment) => deployment,
                        SelectionOutcome::NoneEligible if !retry_pass && !state.tried.is_empty() => {
                            retry_pass = true;
                            continue;
                        }
                        SelectionOutcome::NoneEligible => break,
                    };

                state.attempts += 1;
                state.tried.insert(deployment.id.clone());
                let attempt = attempts + state.attempts;

                let admission = match self.limiter.try_admit(
                    &deployment.id,
                    &deployment.config.limits,
                    request.estimated_tokens,
                    now,
                ) {
                    Ok(admission) => admission,
                    Err(reason) => {
                        self.health
                            .record_outcome(&deployment.id, CallOutcome::RateLimited, now);
                        debug!(
                            deployment_id = %deployment.id,
                            attempt,
                            reason = %reason,
                            "deployment admission denied"
                        );
                        continue;
                    }
                };

                let deadline = call_deadline(&deployment, request.deadline, now);
                state.backend_calls += 1;
                debug!(deployment_id = %deployment.id, model = %model, attempt, "dispatching request");

                let call_start = Instant::now();
                let result =
                    match tokio::time::timeout_at(deadline, operation(deployment.clone(), deadline))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            let now = Instant::now();
                            if request.is_expired(now) {
                                drop(admission);
                                self.health.record_outcome(
                                    &deployment.id,
                                    CallOutcome::RetriableError,
                                    now,
                                );
                                warn!(
                                    deployment_id = %deployment.id,
                                    attempt,
                                    "request deadline exceeded during backend call"
                                );
                                return Err(RouterError::DeadlineExceeded {
                                    model: request.model.clone(),
                                    attempts: attempt,
                                });
                            }
                            Err(TransportError::timeout(format!(
                                "call to deployment {} timed out",
                                deployment.id
                            )))
                        }
                    };

                match result {
                    Ok(value) => {
                        let call_latency = call_start.elapsed();
                        self.health.record_latency(&deployment.id, call_latency);
                        self.health
                            .record_outcome(&deployment.id, CallOutcome::Success, Instant::now());
                        debug!(
                            deployment_id = %deployment.id,
                            attempt,
                            latency_ms = call_latency.as_millis() as u64,
                            "request succeeded"
                        );
                        return Ok(Dispatched {
                            value,
                            admission,
                            deployment,
                            model_used: model.clone(),
                            attempts: attempt,
                            used_fallback,
                            latency: start.elapsed(),
                        });
                    }
                    Err(err) => {
                        admission.release(0);
                        self.health
                            .record_outcome(&deployment.id, classify_error(&err), Instant::now());

                        if !is_retryable_error(&err) {
                            error!(
                                deployment_id = %deployment.id,
                                attempt,
                                error = %err,
                                "non-retriable backend error"
                            );
                            return Err(RouterError::NonRetriableBackendError {
                                deployment_id: deployment.id.clone(),
                                source: err,
                            });
                        }

                        warn!(
                            deployment_id = %deployment.id,
                            attempt,
                            error = %err,
                            "retriable backend error"
                        );
                        last_error = Some(err);
                    }
                }
            }

            attempts += state.attempts;
            backend_calls += state.backend_calls;
        }

        if backend_calls > 0 {
            warn!(attempts, backend_calls, "retries exhausted");
            Err(RouterError::RetriesExhausted {
                model: request.model.clone(),
                attempts,
                last_error,
            })
        } else {
            warn!(attempts, "all deployments unavailable");
            Err(RouterError::AllDeploymentsUnavailable(request.model.clone()))
        }
    }

    fn admit_caller(&self, request: &RoutingRequest) -> Result<Option<Admission>, RouterError> {
        let Some(caller) = request.caller.as_deref() else {
            return Ok(None);
        };
        let Some(limits) = self.caller_limits.get(caller).map(|limits| *limits) else {
            return Ok(None);
        };

        match self
            .limiter
            .try_admit_caller(caller, &limits, request.estimated_tokens, Instant::now())
        {
            Ok(admission) => Ok(Some(admission)),
            Err(reason) => {
                warn!(
                    request_id = %request.request_id,
                    caller = %caller,
                    reason = %reason,
                    "caller rate limited"
                );
                Err(RouterError::CallerRateLimited {
                    caller: caller.to_string(),
                    reason,
                })
            }
        }
    }
}

fn notify_spend(
    spend: &SpendNotifier,
    request: &RoutingRequest,
    deployment_id: &str,
    model: &str,
    tokens: u64,
) {
    spend.notify(SpendEvent {
        request_id: request.request_id,
        caller: request.caller.clone(),
        deployment_id: deployment_id.to_string(),
        model: model.to_string(),
        tokens,
        recorded_at: Utc::now(),
    });
}
