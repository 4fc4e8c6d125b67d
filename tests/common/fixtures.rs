//! Configuration fixtures

use std::io::Write;
use tempfile::NamedTempFile;

/// Two tiers of `gpt` deployments with a `claude` fallback
pub const SAMPLE_CONFIG: &str = r#"
router_settings:
  routing_strategy: simple_shuffle
  max_attempts: 2
  allowed_fails: 0
  cooldown_base_ms: 1000
  cooldown_max_ms: 10000

model_list:
  - deployment_id: gpt-primary
    model_name: gpt
    provider: openai
    model: gpt-4o
    api_key_env: OPENAI_API_KEY
    tier: 0
    rpm: 100
    max_parallel_requests: 4

  - deployment_id: gpt-backup
    model_name: gpt
    provider: azure
    model: gpt-4o
    api_base: https://example.openai.azure.com
    tier: 1
    tags: [backup]

  - deployment_id: claude-main
    model_names: [claude, claude-latest]
    provider: anthropic
    model: claude-sonnet
    tpm: 100000

fallbacks:
  gpt: [claude]

model_aliases:
  gpt4: gpt

caller_limits:
  team-a: { rpm: 2 }

logging:
  level: warn
"#;

/// Write `content` to a temporary YAML file kept alive by the handle
pub fn write_config(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}
