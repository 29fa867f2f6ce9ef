//! Daemon configuration.
//!
//! Deserialized from a TOML file at startup and passed around as a plain
//! value; nothing here mutates after boot. Secrets (provider API keys)
//! live in a separate file and are merged in by the gateway loader.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::session::Level;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Read timeout for small (non-streaming) requests, seconds.
    #[serde(default = "d_15")]
    pub read_timeout_seconds: u64,
    /// Write timeout for streaming responses, seconds.
    #[serde(default = "d_120")]
    pub stream_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            read_timeout_seconds: 15,
            stream_timeout_seconds: 120,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the session and profile stores.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider id to use when the request does not name one.
    /// `"auto"` (or empty) lets the registry pick deterministically.
    #[serde(default = "d_auto")]
    pub default_provider: String,
    /// Per-request timeout for provider HTTP calls, milliseconds.
    #[serde(default = "d_20000")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: d_auto(),
            request_timeout_ms: 20_000,
            providers: Vec::new(),
            resilience: ResilienceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default = "d_enabled")]
    pub enabled: bool,
    /// Default model for this provider.
    #[serde(default)]
    pub model: Option<String>,
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Direct key, normally injected from the secrets file - never
    /// committed to the main config.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

/// Resilience wrapper knobs, shared by all providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Consecutive failures before the circuit opens.
    #[serde(default = "d_5")]
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls, seconds.
    #[serde(default = "d_30")]
    pub break_seconds: u64,
    /// Retry attempts for transient errors (0 = no retries).
    #[serde(default = "d_2")]
    pub max_retries: u32,
    #[serde(default = "d_500")]
    pub initial_backoff_ms: u64,
    #[serde(default = "d_10000")]
    pub max_backoff_ms: u64,
    /// Token-bucket refill rate, requests per second (0 = unlimited).
    #[serde(default)]
    pub rate_per_second: u32,
    /// Token-bucket burst capacity.
    #[serde(default = "d_4")]
    pub burst: u32,
    /// Bulkhead: maximum concurrent in-flight calls per provider.
    #[serde(default = "d_4")]
    pub max_concurrent: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            break_seconds: 30,
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            rate_per_second: 0,
            burst: 4,
            max_concurrent: 4,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Container-isolated execution; falls back to `local` when the
    /// docker daemon is unreachable.
    #[default]
    Docker,
    /// Same interface, weaker isolation (bare subprocess in a tempdir).
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub kind: RunnerKind,
    #[serde(default = "d_256")]
    pub memory_mb: u64,
    #[serde(default = "d_cpus")]
    pub cpus: f64,
    #[serde(default = "d_30")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub network_enabled: bool,
    /// Global cap on concurrently executing sandbox phases.
    #[serde(default = "d_3")]
    pub max_concurrent: u32,
    /// Container image per language tag; unset languages use built-in
    /// defaults.
    #[serde(default)]
    pub images: HashMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            kind: RunnerKind::Docker,
            memory_mb: 256,
            cpus: 0.5,
            timeout_seconds: 30,
            network_enabled: false,
            max_concurrent: 3,
            images: HashMap::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Learning tracks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPolicy {
    #[serde(default = "d_l3")]
    pub max_level: Level,
    #[serde(default = "d_60")]
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub patching_enabled: bool,
}

impl Default for TrackPolicy {
    fn default() -> Self {
        Self {
            max_level: Level::L3,
            cooldown_seconds: 60,
            patching_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "d_track")]
    pub default_track: String,
    /// Per-track policy (key = track name).
    #[serde(default)]
    pub tracks: HashMap<String, TrackPolicy>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            default_track: d_track(),
            tracks: HashMap::new(),
        }
    }
}

impl LearningConfig {
    /// Policy for a track, falling back to defaults for unknown names.
    pub fn policy_for(&self, track: &str) -> TrackPolicy {
        self.tracks.get(track).cloned().unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Content roots (exercises + specs)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "d_exercises_path")]
    pub exercises_path: PathBuf,
    #[serde(default = "d_specs_path")]
    pub specs_path: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            exercises_path: d_exercises_path(),
            specs_path: d_specs_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Secrets file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Contents of the separate secrets file: provider id → API key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Secrets {
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Config {
    /// Inject keys from the secrets file into matching providers.
    pub fn merge_secrets(&mut self, secrets: &Secrets) {
        for provider in &mut self.llm.providers {
            if let Some(key) = secrets.api_keys.get(&provider.id) {
                provider.api_key = Some(key.clone());
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.llm.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured — interventions will fail".into(),
            });
        }

        let mut seen_ids = std::collections::HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !seen_ids.insert(provider.id.as_str()) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: format!("duplicate provider id \"{}\"", provider.id),
                });
            }
        }

        let default = &self.llm.default_provider;
        if default != "auto"
            && !default.is_empty()
            && !self.llm.providers.iter().any(|p| &p.id == default)
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.default_provider".into(),
                message: format!("default provider \"{default}\" is not configured"),
            });
        }

        if self.runner.memory_mb < 64 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "runner.memory_mb".into(),
                message: "less than 64 MB will break most toolchains".into(),
            });
        }
        if self.runner.cpus <= 0.0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "runner.cpus".into(),
                message: "cpu share must be positive".into(),
            });
        }
        if self.runner.max_concurrent == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "runner.max_concurrent".into(),
                message: "concurrency cap must be at least 1".into(),
            });
        }

        if !self.learning.tracks.is_empty()
            && !self
                .learning
                .tracks
                .contains_key(&self.learning.default_track)
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "learning.default_track".into(),
                message: format!(
                    "default track \"{}\" has no explicit policy; built-in defaults apply",
                    self.learning.default_track
                ),
            });
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// serde default helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    7400
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_exercises_path() -> PathBuf {
    PathBuf::from("./exercises")
}
fn d_specs_path() -> PathBuf {
    PathBuf::from("./specs")
}
fn d_auto() -> String {
    "auto".into()
}
fn d_track() -> String {
    "standard".into()
}
fn d_enabled() -> bool {
    true
}
fn d_l3() -> Level {
    Level::L3
}
fn d_cpus() -> f64 {
    0.5
}
fn d_2() -> u32 {
    2
}
fn d_3() -> u32 {
    3
}
fn d_4() -> u32 {
    4
}
fn d_5() -> u32 {
    5
}
fn d_15() -> u64 {
    15
}
fn d_30() -> u64 {
    30
}
fn d_60() -> u64 {
    60
}
fn d_120() -> u64 {
    120
}
fn d_256() -> u64 {
    256
}
fn d_500() -> u64 {
    500
}
fn d_10000() -> u64 {
    10_000
}
fn d_20000() -> u64 {
    20_000
}
