//! Session endpoints.
//!
//! - `POST   /v1/sessions`               - create by intent
//! - `GET    /v1/sessions`               - list
//! - `GET    /v1/sessions/:id`           - inspect
//! - `DELETE /v1/sessions/:id`           - delete (cascading)
//! - `PUT    /v1/sessions/:id/code`      - replace the snapshot
//! - `POST   /v1/sessions/:id/complete`  - terminal transition
//! - `POST   /v1/sessions/:id/abandon`   - terminal transition

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use pf_domain::session::{CodeSnapshot, LearningPolicy};
use pf_sessions::CreateSessionRequest;

use crate::api::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub exercise_id: Option<String>,
    #[serde(default)]
    pub spec_path: Option<String>,
    #[serde(default)]
    pub code: Option<CodeSnapshot>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub policy: Option<LearningPolicy>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .sessions
        .create(CreateSessionRequest {
            exercise_id: body.exercise_id,
            spec_path: body.spec_path,
            code: body.code,
            track: body.track,
            policy: body.policy,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.get(&id)?;
    let runs = state.sessions.runs(&id);
    let interventions = state.sessions.interventions(&id);
    Ok(Json(serde_json::json!({
        "session": session,
        "runs": runs,
        "interventions": interventions,
    })))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.sessions.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct UpdateCodeBody {
    pub code: CodeSnapshot,
}

pub async fn update_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCodeBody>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.update_code(&id, body.code).await?;
    Ok(Json(session))
}

pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.complete(&id).await?;
    Ok(Json(session))
}

pub async fn abandon_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.abandon(&id).await?;
    Ok(Json(session))
}
