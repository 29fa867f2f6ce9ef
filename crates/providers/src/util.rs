//! Shared utility functions for provider adapters.

use pf_domain::config::ProviderConfig;
use pf_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::ProviderTimeout`]; everything else maps
/// to a provider error.
pub(crate) fn from_reqwest(provider: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ProviderTimeout(e.to_string())
    } else {
        Error::Provider {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

/// Resolve the API key for a provider.
///
/// Precedence:
/// 1. `api_key` (injected from the secrets file at startup)
/// 2. `api_key_env` (reads the named environment variable)
/// 3. Error
pub fn resolve_api_key(cfg: &ProviderConfig) -> Result<String> {
    if let Some(ref key) = cfg.api_key {
        return Ok(key.clone());
    }

    if let Some(ref env_var) = cfg.api_key_env {
        return std::env::var(env_var).map_err(|_| {
            Error::Unauthorized(format!(
                "environment variable '{env_var}' not set or not valid UTF-8"
            ))
        });
    }

    Err(Error::Unauthorized(format!(
        "provider '{}' has no API key: set it in the secrets file or via api_key_env",
        cfg.id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_domain::config::ProviderKind;

    fn cfg() -> ProviderConfig {
        ProviderConfig {
            id: "test".into(),
            kind: ProviderKind::Anthropic,
            enabled: true,
            model: None,
            base_url: "https://api.test".into(),
            api_key_env: None,
            api_key: None,
        }
    }

    #[test]
    fn secrets_key_takes_precedence() {
        let mut c = cfg();
        c.api_key = Some("sk-direct".into());
        c.api_key_env = Some("PF_TEST_UNUSED_VAR".into());
        assert_eq!(resolve_api_key(&c).unwrap(), "sk-direct");
    }

    #[test]
    fn env_var_resolution() {
        let var = "PF_TEST_RESOLVE_KEY_4321";
        std::env::set_var(var, "sk-from-env");
        let mut c = cfg();
        c.api_key_env = Some(var.into());
        assert_eq!(resolve_api_key(&c).unwrap(), "sk-from-env");
        std::env::remove_var(var);
    }

    #[test]
    fn missing_key_errors() {
        let err = resolve_api_key(&cfg()).unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn missing_env_var_errors_with_name() {
        let mut c = cfg();
        c.api_key_env = Some("PF_TEST_NONEXISTENT_9999".into());
        let err = resolve_api_key(&c).unwrap_err();
        assert!(err.to_string().contains("PF_TEST_NONEXISTENT_9999"));
    }
}
