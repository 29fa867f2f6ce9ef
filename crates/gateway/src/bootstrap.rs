//! AppState construction: validate config, initialize every subsystem,
//! and return the fully wired state.

use std::sync::Arc;

use anyhow::Context;

use pf_domain::config::{Config, ConfigSeverity};
use pf_exec::ExecutionOrchestrator;
use pf_pairing::PairingEngine;
use pf_profile::{ProfileAggregator, ProfileStore};
use pf_providers::ProviderRegistry;
use pf_sessions::{SessionManager, SessionStore};

use crate::registry::{FileExerciseRegistry, FileSpecService};
use crate::state::AppState;

/// Profile id until multi-user support exists upstream.
const PROFILE_ID: &str = "default";

pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM providers ────────────────────────────────────────────────
    let (llm, init_errors) = ProviderRegistry::from_config(&config.llm);
    let llm = Arc::new(llm);
    if llm.is_empty() {
        tracing::warn!(
            failed = init_errors.len(),
            "no LLM providers initialized — interventions will fail until keys are configured"
        );
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }

    // ── Stores ───────────────────────────────────────────────────────
    let session_store = Arc::new(
        SessionStore::open(&config.storage.state_path).context("initializing session store")?,
    );
    let profile_store = Arc::new(
        ProfileStore::open(&config.storage.state_path).context("initializing profile store")?,
    );

    // ── Profile aggregator ───────────────────────────────────────────
    let profile = Arc::new(ProfileAggregator::open(profile_store.clone(), PROFILE_ID));

    // ── Content collaborators ────────────────────────────────────────
    let exercises = Arc::new(FileExerciseRegistry::new(
        config.content.exercises_path.clone(),
    ));
    let specs = Arc::new(FileSpecService::new(config.content.specs_path.clone()));
    tracing::info!(
        exercises = %config.content.exercises_path.display(),
        specs = %config.content.specs_path.display(),
        "content roots ready"
    );

    // ── Execution orchestrator ───────────────────────────────────────
    let orchestrator = Arc::new(ExecutionOrchestrator::new(config.runner.clone()).await);

    // ── Session manager ──────────────────────────────────────────────
    let sessions = Arc::new(SessionManager::new(
        session_store.clone(),
        exercises.clone(),
        specs.clone(),
        orchestrator,
        profile.clone(),
        config.learning.clone(),
    ));
    tracing::info!(
        default_track = %config.learning.default_track,
        "session manager ready"
    );

    // ── Pairing engine ───────────────────────────────────────────────
    let engine = Arc::new(PairingEngine::new(llm.clone(), profile.clone()));

    Ok(AppState {
        config,
        llm,
        sessions,
        engine,
        profile,
        exercises,
        specs,
        session_store,
        profile_store,
    })
}
