//! Configuration loading tests
//!
//! Loads configuration files from disk and builds routers from them.

#[cfg(test)]
mod tests {
    use crate::common::{SAMPLE_CONFIG, SwitchTransport, write_config};
    use crate::{assert_err, assert_ok};
    use llm_router::core::router::{ProviderKind, RoutingStrategy};
    use llm_router::{Config, GatewayError, Router};

    fn replace(original: &str, from: &str, to: &str) -> String {
        assert!(original.contains(from), "fixture does not contain {from:?}");
        original.replacen(from, to, 1)
    }

    #[test]
    fn test_load_sample_config() {
        let file = write_config(SAMPLE_CONFIG);
        let config = assert_ok!(tokio_test::block_on(Config::from_file(file.path())));

        assert_eq!(
            config.router_settings.routing_strategy,
            RoutingStrategy::SimpleShuffle
        );
        assert_eq!(config.router_settings.max_attempts, 2);
        // Unset settings keep their defaults
        assert_eq!(config.router_settings.rate_limit_window_secs, 60);
        assert_eq!(config.model_list.len(), 3);
        assert_eq!(config.model_list[1].provider, ProviderKind::Azure);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_example_config_is_valid() {
        let example = include_str!("../../config/router.yaml.example");
        let config = assert_ok!(Config::from_yaml_str(example));
        assert_ok!(config.validate());
        assert_ok!(config.build_registry());
    }

    #[test]
    fn test_rejects_duplicate_deployment_ids() {
        let yaml = replace(SAMPLE_CONFIG, "deployment_id: gpt-backup", "deployment_id: gpt-primary");
        let config = assert_ok!(Config::from_yaml_str(&yaml));
        let err = assert_err!(config.validate());
        assert!(err.to_string().contains("Duplicate deployment id"));
    }

    #[test]
    fn test_rejects_negative_limit() {
        let yaml = replace(SAMPLE_CONFIG, "rpm: 100", "rpm: -5");
        let config = assert_ok!(Config::from_yaml_str(&yaml));
        let err = assert_err!(config.validate());
        assert!(err.to_string().contains("negative rpm limit"));
    }

    #[test]
    fn test_rejects_non_positive_weight() {
        let yaml = replace(SAMPLE_CONFIG, "    tier: 1\n", "    tier: 1\n    weight: 0\n");
        let config = assert_ok!(Config::from_yaml_str(&yaml));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempt_budget() {
        let yaml = replace(SAMPLE_CONFIG, "max_attempts: 2", "max_attempts: 0");
        let file = write_config(&yaml);
        let err = assert_err!(tokio_test::block_on(Config::from_file(file.path())));
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = assert_err!(Config::from_yaml_str("model_list: [unterminated"));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[tokio::test]
    async fn test_router_from_config() {
        let config = assert_ok!(Config::from_yaml_str(SAMPLE_CONFIG));
        let router = assert_ok!(Router::from_config(&config, SwitchTransport::new()));

        assert_eq!(
            router.list_models(),
            vec!["claude", "claude-latest", "gpt"]
        );
        let tiers = router.list_candidates("gpt4");
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0][0].id, "gpt-primary");
        assert_eq!(router.fallbacks().get_fallbacks("gpt"), vec!["claude"]);

        let primary = router.get_deployment("gpt-primary").unwrap();
        assert_eq!(primary.config.limits.rpm, Some(100));
        assert_eq!(primary.api_key_env.as_deref(), Some("OPENAI_API_KEY"));

        let backup = router.deployment_stats("gpt-backup").unwrap();
        assert_eq!(backup.tier, 1);
        assert_eq!(backup.tags, vec!["backup"]);
    }

    #[tokio::test]
    async fn test_apply_config_reloads_deployments() {
        let config = assert_ok!(Config::from_yaml_str(SAMPLE_CONFIG));
        let router = assert_ok!(Router::from_config(&config, SwitchTransport::new()));
        assert_eq!(router.registry().resolve_model_name("gpt4"), "gpt");

        let mut updated = config.clone();
        updated.model_list.retain(|entry| entry.deployment_id != "gpt-backup");
        updated.fallbacks.clear();
        updated.model_aliases.clear();
        assert_ok!(router.apply_config(&updated));

        assert_eq!(router.registry().resolve_model_name("gpt4"), "gpt4");
        assert!(router.list_candidates("gpt4").is_empty());

        assert_eq!(
            router.list_deployments(),
            vec!["claude-main", "gpt-primary"]
        );
        assert!(router.fallbacks().get_fallbacks("gpt").is_empty());
    }
}
