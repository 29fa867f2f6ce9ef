//! Health and provider listing.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// Liveness probe. Public, no auth.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": state.llm.len(),
    }))
}

/// Registered provider names plus the default-selection setting.
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "providers": state.llm.list(),
        "default": state.llm.default_name(),
    }))
}
