//! Run endpoints.
//!
//! - `POST /v1/sessions/:id/runs`   - format/build/test phases
//! - `POST /v1/sessions/:id/format` - rewrite the snapshot in place
//!   (gated on the track's `patching_enabled`)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use pf_domain::session::{CodeSnapshot, RunPhases};
use pf_sessions::RunRequest;

use crate::api::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunBody {
    /// Run-only override; the session snapshot is used when absent.
    #[serde(default)]
    pub code: Option<CodeSnapshot>,
    #[serde(flatten)]
    pub phases: RunPhases,
}

pub async fn run_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RunBody>,
) -> ApiResult<impl IntoResponse> {
    // When the client disconnects, axum drops this future; the guard
    // forwards that as cancellation into the sandbox.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let run = state
        .sessions
        .run_code(
            &id,
            RunRequest {
                code: body.code,
                phases: body.phases,
            },
            &cancel,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(run)))
}

pub async fn format_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let session = state.sessions.format_code(&id, &cancel).await?;
    Ok(Json(session))
}
