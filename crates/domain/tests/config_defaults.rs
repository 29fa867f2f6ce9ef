//! Config deserialization defaults - an empty TOML file must produce a
//! fully usable configuration.

use pf_domain::config::{Config, ConfigSeverity, ProviderKind, RunnerKind, Secrets};
use pf_domain::session::Level;

#[test]
fn empty_toml_yields_full_defaults() {
    let config: Config = toml::from_str("").unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 7400);
    assert_eq!(config.server.read_timeout_seconds, 15);
    assert_eq!(config.server.stream_timeout_seconds, 120);

    assert_eq!(config.llm.default_provider, "auto");
    assert!(config.llm.providers.is_empty());

    assert_eq!(config.runner.kind, RunnerKind::Docker);
    assert_eq!(config.runner.memory_mb, 256);
    assert!((config.runner.cpus - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.runner.timeout_seconds, 30);
    assert!(!config.runner.network_enabled);
    assert_eq!(config.runner.max_concurrent, 3);

    assert_eq!(config.learning.default_track, "standard");
    let policy = config.learning.policy_for("standard");
    assert_eq!(policy.max_level, Level::L3);
    assert_eq!(policy.cooldown_seconds, 60);
    assert!(!policy.patching_enabled);
}

#[test]
fn partial_toml_overrides_only_named_fields() {
    let config: Config = toml::from_str(
        r#"
        [server]
        port = 9000

        [learning]
        default_track = "practice"

        [learning.tracks.practice]
        max_level = "L2"
        cooldown_seconds = 30
        "#,
    )
    .unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "127.0.0.1");
    let policy = config.learning.policy_for("practice");
    assert_eq!(policy.max_level, Level::L2);
    assert_eq!(policy.cooldown_seconds, 30);
    // Unknown tracks fall back to built-in defaults.
    assert_eq!(config.learning.policy_for("ghost").max_level, Level::L3);
}

#[test]
fn provider_config_parses() {
    let config: Config = toml::from_str(
        r#"
        [llm]
        default_provider = "anthropic"

        [[llm.providers]]
        id = "anthropic"
        kind = "anthropic"
        model = "claude-sonnet-4-20250514"
        base_url = "https://api.anthropic.com"
        api_key_env = "ANTHROPIC_API_KEY"
        "#,
    )
    .unwrap();

    let p = &config.llm.providers[0];
    assert_eq!(p.kind, ProviderKind::Anthropic);
    assert!(p.enabled);
    assert!(p.api_key.is_none());
    assert!(config.validate().is_empty());
}

#[test]
fn validation_flags_bad_config() {
    let config: Config = toml::from_str(
        r#"
        [server]
        port = 0

        [[llm.providers]]
        id = "a"
        kind = "anthropic"
        base_url = "not-a-url"

        [[llm.providers]]
        id = "a"
        kind = "openai_compat"
        base_url = "https://x.test"
        "#,
    )
    .unwrap();

    let issues = config.validate();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .collect();
    // port, base_url, duplicate id
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().any(|i| i.field == "server.port"));
    assert!(errors.iter().any(|i| i.field.contains("base_url")));
    assert!(errors.iter().any(|i| i.message.contains("duplicate")));
}

#[test]
fn secrets_merge_by_provider_id() {
    let mut config: Config = toml::from_str(
        r#"
        [[llm.providers]]
        id = "anthropic"
        kind = "anthropic"
        base_url = "https://api.anthropic.com"
        "#,
    )
    .unwrap();

    let secrets: Secrets = toml::from_str(
        r#"
        [api_keys]
        anthropic = "sk-test-123"
        unrelated = "sk-other"
        "#,
    )
    .unwrap();

    config.merge_secrets(&secrets);
    assert_eq!(
        config.llm.providers[0].api_key.as_deref(),
        Some("sk-test-123")
    );
}
