//! Intervention endpoints.
//!
//! `POST /v1/sessions/:id/{hint|review|stuck|next|explain}` - request an
//! intervention; `"stream": true` switches the response to SSE with
//! event names `metadata`, `content`, `error`, `done`.
//!
//! Journaling happens only on a completed generation: the non-streaming
//! path records after the provider returns, the streaming path records
//! when the chunk stream reaches `done`. A stream that ends in `error`
//! (including cancellation) leaves no trace in the journal.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use pf_domain::error::Error;
use pf_domain::session::{InterventionIntent, Session, SessionIntent};
use pf_pairing::{InterventionChunk, InterventionContext, InterventionPlan};
use pf_sessions::cooldown::cooldown_remaining;
use pf_sessions::InterventionDraft;

use crate::api::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InterventionBody {
    /// Switch the response to SSE.
    #[serde(default)]
    pub stream: bool,
    /// Provider name override; the registry default applies otherwise.
    #[serde(default)]
    pub provider: Option<String>,
    /// Required for L5 interventions.
    #[serde(default)]
    pub justification: Option<String>,
}

fn parse_intent(action: &str) -> Result<InterventionIntent, Error> {
    match action {
        "hint" => Ok(InterventionIntent::Hint),
        "review" => Ok(InterventionIntent::Review),
        "stuck" => Ok(InterventionIntent::Stuck),
        "next" => Ok(InterventionIntent::Next),
        "explain" => Ok(InterventionIntent::Explain),
        other => Err(Error::NotFound(format!("no such intervention: {other}"))),
    }
}

/// Load the session, gather context, plan, and run the cooldown
/// pre-check. The manager re-checks under the session lock at journal
/// time; this early check lets streaming requests fail with a clean 429
/// before any SSE bytes go out.
async fn prepare(
    state: &AppState,
    id: &str,
    intent: InterventionIntent,
    provider: Option<String>,
) -> Result<(Session, InterventionPlan), Error> {
    let session = state.sessions.get(id)?;
    if !session.is_active() {
        return Err(Error::SessionNotActive {
            session_id: session.id.clone(),
            status: session.status.to_string(),
        });
    }

    let exercise = match (&session.intent, &session.exercise_id) {
        (SessionIntent::Training, Some(exercise_id)) => {
            match state.exercises.load(exercise_id).await {
                Ok(ex) => Some(ex),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id,
                        exercise_id = %exercise_id,
                        error = %e,
                        "exercise unavailable, prompting without it"
                    );
                    None
                }
            }
        }
        _ => None,
    };
    let spec = match (&session.intent, &session.spec_path) {
        (SessionIntent::FeatureGuidance, Some(spec_path)) => {
            match state.specs.load_validated(spec_path).await {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id,
                        spec_path = %spec_path,
                        error = %e,
                        "spec unavailable, prompting without it"
                    );
                    None
                }
            }
        }
        _ => None,
    };

    let runs = state.sessions.runs(id);
    let ctx = InterventionContext {
        session: session.clone(),
        exercise,
        spec,
        runs,
    };
    let plan = state.engine.plan(intent, &ctx, provider).await?;

    if let Some(remaining_seconds) = cooldown_remaining(
        Utc::now(),
        session.last_intervention_at,
        session.policy.cooldown_seconds,
        plan.level,
    ) {
        return Err(Error::CooldownActive { remaining_seconds });
    }

    Ok((session, plan))
}

pub async fn intervene(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    Json(body): Json<InterventionBody>,
) -> ApiResult<Response> {
    let intent = parse_intent(&action)?;
    let (_session, plan) = prepare(&state, &id, intent, body.provider.clone()).await?;

    if body.stream {
        Ok(stream_response(state, id, plan, body.justification))
    } else {
        let content = state.engine.intervene(&plan).await?;
        let intervention = state
            .sessions
            .record_intervention(
                &id,
                InterventionDraft {
                    run_id: plan.run_id.clone(),
                    intent: plan.intent,
                    level: plan.level,
                    kind: plan.kind,
                    content,
                    justification: body.justification,
                },
            )
            .await?;
        Ok(Json(intervention).into_response())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn stream_response(
    state: AppState,
    session_id: String,
    plan: InterventionPlan,
    justification: Option<String>,
) -> Response {
    let intent = plan.intent;
    let level = plan.level;
    let kind = plan.kind;
    let run_id = plan.run_id.clone();

    // Dropping the SSE body (client went away) cancels the provider call.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let mut rx = state.engine.intervene_stream(plan, cancel);

    let stream = async_stream::stream! {
        let _guard = guard;
        let mut content = String::new();

        while let Some(chunk) = rx.recv().await {
            match &chunk {
                InterventionChunk::Content { text } => content.push_str(text),
                InterventionChunk::Done => {
                    // Journal first; only a successful journal entry gets
                    // to terminate the stream with `done`.
                    let draft = InterventionDraft {
                        run_id: run_id.clone(),
                        intent,
                        level,
                        kind,
                        content: std::mem::take(&mut content),
                        justification: justification.clone(),
                    };
                    match state.sessions.record_intervention(&session_id, draft).await {
                        Ok(intervention) => {
                            yield Ok::<_, std::convert::Infallible>(
                                Event::default()
                                    .event("done")
                                    .data(serde_json::json!({ "intervention": intervention }).to_string()),
                            );
                        }
                        Err(e) => {
                            yield Ok(Event::default().event("error").data(
                                serde_json::json!({
                                    "reason": e.code(),
                                    "message": e.to_string(),
                                })
                                .to_string(),
                            ));
                        }
                    }
                    return;
                }
                InterventionChunk::Metadata { .. } | InterventionChunk::Error { .. } => {}
            }

            let terminal = chunk.is_terminal();
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            yield Ok(Event::default().event(chunk.event_name()).data(data));
            if terminal {
                return;
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_parse_from_path_segment() {
        assert_eq!(parse_intent("hint").unwrap(), InterventionIntent::Hint);
        assert_eq!(parse_intent("review").unwrap(), InterventionIntent::Review);
        assert_eq!(parse_intent("stuck").unwrap(), InterventionIntent::Stuck);
        assert_eq!(parse_intent("next").unwrap(), InterventionIntent::Next);
        assert_eq!(parse_intent("explain").unwrap(), InterventionIntent::Explain);
        assert_eq!(parse_intent("solve").unwrap_err().code(), "not-found");
    }
}
