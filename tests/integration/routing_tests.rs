//! Routing tests against a router built from configuration

#[cfg(test)]
mod tests {
    use crate::assert_ok;
    use crate::common::{MemoryLedger, SAMPLE_CONFIG, SwitchTransport};
    use llm_router::core::router::SpendLedger;
    use llm_router::{Config, Router, RouterError, RoutingRequest};
    use std::sync::Arc;
    use std::time::Duration;

    fn router(transport: &Arc<SwitchTransport>) -> Router {
        let config = assert_ok!(Config::from_yaml_str(SAMPLE_CONFIG));
        assert_ok!(Router::from_config(&config, transport.clone()))
    }

    fn request(model: &str) -> RoutingRequest {
        RoutingRequest::with_timeout(
            model,
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
            Duration::from_secs(10),
        )
        .with_payload_estimate()
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_tier_serves_first() {
        let transport = SwitchTransport::new();
        let router = router(&transport);

        let routed = assert_ok!(router.route(request("gpt")).await);

        assert_eq!(routed.deployment_id, "gpt-primary");
        assert_eq!(routed.attempts, 1);
        assert_eq!(routed.response.payload["model"], "gpt-4o");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_to_backup_tier_and_recovery() {
        let transport = SwitchTransport::new();
        let router = router(&transport);
        transport.fail("gpt-primary");

        let routed = assert_ok!(router.route(request("gpt")).await);
        assert_eq!(routed.deployment_id, "gpt-backup");
        assert_eq!(routed.attempts, 2);

        // Cooling down: the backup serves without touching the primary
        transport.recover("gpt-primary");
        let routed = assert_ok!(router.route(request("gpt")).await);
        assert_eq!(routed.deployment_id, "gpt-backup");
        assert_eq!(transport.calls(), vec!["gpt-primary", "gpt-backup", "gpt-backup"]);

        tokio::time::advance(Duration::from_secs(1)).await;
        let routed = assert_ok!(router.route(request("gpt4")).await);
        assert_eq!(routed.deployment_id, "gpt-primary");
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_fallback_after_budget_spent() {
        let transport = SwitchTransport::new();
        let router = router(&transport);
        transport.fail("gpt-primary");
        transport.fail("gpt-backup");

        let routed = assert_ok!(router.route(request("gpt")).await);

        assert_eq!(routed.deployment_id, "claude-main");
        assert_eq!(routed.model_used, "claude");
        assert!(routed.used_fallback);
        assert_eq!(routed.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_fallback() {
        let transport = SwitchTransport::new();
        let router = router(&transport);
        transport.fail("claude-main");

        let err = router.route(request("claude-latest")).await.unwrap_err();

        // The only deployment cooled down after its first failure, so the
        // rest of the budget has nothing to spend on
        match err {
            RouterError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls(), vec!["claude-main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_limits_from_config() {
        let transport = SwitchTransport::new();
        let router = router(&transport);

        for _ in 0..2 {
            assert_ok!(router.route(request("gpt").with_caller("team-a")).await);
        }
        let err = router
            .route(request("gpt").with_caller("team-a"))
            .await
            .unwrap_err();

        assert!(matches!(err, RouterError::CallerRateLimited { .. }));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_spend_reported_to_ledger() {
        let transport = SwitchTransport::new();
        let ledger = Arc::new(MemoryLedger::default());
        let config = assert_ok!(Config::from_yaml_str(SAMPLE_CONFIG));
        let router = assert_ok!(Router::from_config_with_ledger(
            &config,
            transport.clone(),
            ledger.clone() as Arc<dyn SpendLedger>,
        ));

        let routed = assert_ok!(router.route(request("gpt").with_caller("team-a")).await);

        for _ in 0..100 {
            if !ledger.events().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let events = ledger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].deployment_id, routed.deployment_id);
        assert_eq!(events[0].caller.as_deref(), Some("team-a"));
        assert_eq!(events[0].model, "gpt");
        assert_eq!(events[0].tokens, 12);
    }
}
