//! Profile and analytics endpoints.
//!
//! - `GET /v1/profile`            - the raw learning profile
//! - `GET /v1/analytics/overview` - headline counters
//! - `GET /v1/analytics/skills`   - assessment + per-topic progression
//! - `GET /v1/analytics/errors`   - top error patterns (`?limit=N`)
//! - `GET /v1/analytics/trend`    - hint-dependency trend ring

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use pf_profile::analytics;

use crate::state::AppState;

pub async fn get_profile(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.profile.snapshot().await)
}

pub async fn overview(State(state): State<AppState>) -> impl IntoResponse {
    let profile = state.profile.snapshot().await;
    Json(analytics::overview(&profile))
}

pub async fn skills(State(state): State<AppState>) -> impl IntoResponse {
    let profile = state.profile.snapshot().await;
    Json(analytics::skills(&profile))
}

#[derive(Debug, Deserialize)]
pub struct ErrorsQuery {
    #[serde(default = "d_limit")]
    limit: usize,
}

fn d_limit() -> usize {
    10
}

pub async fn errors(
    State(state): State<AppState>,
    Query(query): Query<ErrorsQuery>,
) -> impl IntoResponse {
    let profile = state.profile.snapshot().await;
    Json(serde_json::json!({
        "patterns": analytics::top_errors(&profile, query.limit),
    }))
}

pub async fn trend(State(state): State<AppState>) -> impl IntoResponse {
    let profile = state.profile.snapshot().await;
    Json(serde_json::json!({
        "points": analytics::trend(&profile),
    }))
}
