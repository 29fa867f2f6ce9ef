use std::sync::Arc;

use pf_domain::config::Config;
use pf_domain::exercise::{ExerciseRegistry, SpecService};
use pf_pairing::PairingEngine;
use pf_profile::{ProfileAggregator, ProfileStore};
use pf_providers::ProviderRegistry;
use pf_sessions::{SessionManager, SessionStore};

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,
    pub sessions: Arc<SessionManager>,
    pub engine: Arc<PairingEngine>,
    pub profile: Arc<ProfileAggregator>,
    pub exercises: Arc<dyn ExerciseRegistry>,
    pub specs: Arc<dyn SpecService>,

    // Stores kept for the shutdown flush.
    pub session_store: Arc<SessionStore>,
    pub profile_store: Arc<ProfileStore>,
}
