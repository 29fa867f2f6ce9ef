//! Config and secrets loading.
//!
//! The main config is TOML; secrets (provider API keys) live in a
//! separate file that must not be group- or world-readable. A missing
//! config file yields the built-in defaults so the daemon can boot in a
//! fresh directory.

use std::path::{Path, PathBuf};

use anyhow::Context;

use pf_domain::config::{Config, Secrets};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PAIRFLOW_CONFIG";
/// Environment variable naming the secrets file.
pub const SECRETS_ENV: &str = "PAIRFLOW_SECRETS";

const DEFAULT_CONFIG_PATH: &str = "./pairflow.toml";
const DEFAULT_SECRETS_PATH: &str = "./pairflow.secrets.toml";

/// Resolve, read, and merge config + secrets.
pub fn load() -> anyhow::Result<(Config, PathBuf)> {
    let config_path = PathBuf::from(
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()),
    );

    let mut config = if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        tracing::info!(
            path = %config_path.display(),
            "config file not found — using built-in defaults"
        );
        Config::default()
    };

    let secrets_path = PathBuf::from(
        std::env::var(SECRETS_ENV).unwrap_or_else(|_| DEFAULT_SECRETS_PATH.into()),
    );
    if secrets_path.exists() {
        check_secrets_permissions(&secrets_path)?;
        let raw = std::fs::read_to_string(&secrets_path)
            .with_context(|| format!("reading {}", secrets_path.display()))?;
        let secrets: Secrets = toml::from_str(&raw)
            .with_context(|| format!("parsing {}", secrets_path.display()))?;
        config.merge_secrets(&secrets);
        tracing::info!(
            keys = secrets.api_keys.len(),
            path = %secrets_path.display(),
            "secrets loaded"
        );
    }

    Ok((config, config_path))
}

/// Refuse secrets readable by anyone but the owner.
#[cfg(unix)]
fn check_secrets_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions()
        .mode();
    if mode & 0o077 != 0 {
        anyhow::bail!(
            "secrets file {} is group/world readable (mode {:o}); run: chmod 600 {}",
            path.display(),
            mode & 0o777,
            path.display()
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_secrets_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn loose_secrets_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "[api_keys]\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = check_secrets_permissions(&path).unwrap_err();
        assert!(err.to_string().contains("chmod 600"));

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        check_secrets_permissions(&path).unwrap();
    }
}
