//! Provider registry.
//!
//! Holds all configured LLM provider instances by name and resolves the
//! default. Reads vastly outnumber writes, but registration and
//! default changes are allowed at runtime, so the maps sit behind a
//! reader-writer lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use pf_domain::config::{LlmConfig, ProviderKind};
use pf_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::resilience::ResilientProvider;
use crate::traits::LlmProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Named set of LLM providers plus the default-selection policy.
pub struct ProviderRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// Explicit default. `"auto"` or empty means "pick deterministically".
    default: String,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message so raw secrets never reach logs or client responses.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..]);
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                providers: HashMap::new(),
                default: "auto".into(),
            }),
        }
    }

    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Every enabled provider entry is instantiated, wrapped in the
    /// resilience layer, and registered. Providers that fail to
    /// initialize are logged and skipped rather than aborting startup;
    /// their (masked) errors are returned alongside the registry.
    pub fn from_config(config: &LlmConfig) -> (Self, Vec<ProviderInitError>) {
        let registry = Self::new();
        let mut init_errors = Vec::new();

        for pc in &config.providers {
            if !pc.enabled {
                tracing::debug!(provider_id = %pc.id, "provider disabled, skipping");
                continue;
            }

            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc, config.request_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, config.request_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        "registered LLM provider"
                    );
                    let wrapped = ResilientProvider::wrap(provider, &config.resilience);
                    registry.register(Arc::new(wrapped));
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        kind: format!("{:?}", pc.kind),
                        error: safe_error,
                    });
                }
            }
        }

        registry.set_default(&config.default_provider);
        (registry, init_errors)
    }

    /// Register (or replace) a provider under its own name.
    pub fn register(&self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        self.inner.write().providers.insert(name, provider);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn LlmProvider>> {
        self.inner
            .read()
            .providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))
    }

    /// Change the default provider name. `"auto"` or empty restores
    /// deterministic selection.
    pub fn set_default(&self, name: &str) {
        self.inner.write().default = name.to_string();
    }

    /// Resolve the default provider.
    ///
    /// An explicit default takes precedence unless it is `"auto"` or
    /// unset; otherwise the first registered provider in name order is
    /// returned so selection stays deterministic across restarts.
    pub fn default_provider(&self) -> Result<Arc<dyn LlmProvider>> {
        let inner = self.inner.read();

        if !inner.default.is_empty() && inner.default != "auto" {
            return inner
                .providers
                .get(&inner.default)
                .cloned()
                .ok_or_else(|| Error::ProviderNotFound(inner.default.clone()));
        }

        let mut names: Vec<&String> = inner.providers.keys().collect();
        names.sort();
        names
            .first()
            .and_then(|name| inner.providers.get(*name))
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound("no-default".into()))
    }

    /// All registered provider names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The configured default name (may be `"auto"`).
    pub fn default_name(&self) -> String {
        self.inner.read().default.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
