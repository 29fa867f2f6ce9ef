pub mod admin;
pub mod error;
pub mod interventions;
pub mod profile;
pub mod runs;
pub mod sessions;

use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use pf_domain::config::ServerConfig;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split by response profile: small request/response pairs
/// get the short read timeout, while runs and interventions (sandbox
/// phases, provider streaming) get the long one. The timeout covers the
/// response head - SSE bodies keep flowing past it.
pub fn router(server: &ServerConfig) -> Router<AppState> {
    let small = Router::new()
        // Health probe (public)
        .route("/v1/health", get(admin::health))
        // Sessions
        .route("/v1/sessions", post(sessions::create_session))
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:id", get(sessions::get_session))
        .route("/v1/sessions/:id", delete(sessions::delete_session))
        .route("/v1/sessions/:id/code", put(sessions::update_code))
        .route("/v1/sessions/:id/complete", post(sessions::complete_session))
        .route("/v1/sessions/:id/abandon", post(sessions::abandon_session))
        // Profile & analytics
        .route("/v1/profile", get(profile::get_profile))
        .route("/v1/analytics/overview", get(profile::overview))
        .route("/v1/analytics/skills", get(profile::skills))
        .route("/v1/analytics/errors", get(profile::errors))
        .route("/v1/analytics/trend", get(profile::trend))
        // Providers
        .route("/v1/providers", get(admin::list_providers))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.read_timeout_seconds,
        )));

    let long = Router::new()
        // Runs (sandbox phases can take the full sandbox timeout)
        .route("/v1/sessions/:id/runs", post(runs::run_code))
        .route("/v1/sessions/:id/format", post(runs::format_code))
        // Interventions (hint | review | stuck | next | explain);
        // static sibling routes win over the capture.
        .route("/v1/sessions/:id/:action", post(interventions::intervene))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.stream_timeout_seconds,
        )));

    small.merge(long).layer(TraceLayer::new_for_http())
}
