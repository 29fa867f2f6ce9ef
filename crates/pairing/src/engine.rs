//! The pairing engine.
//!
//! Translates `(intent, session, context)` into a bounded intervention:
//! pick the level, assemble the prompt, dispatch the provider, and
//! deliver either a complete string or a typed chunk stream. Journaling
//! belongs to the session manager and happens only after `done`.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pf_domain::error::{Error, Result};
use pf_domain::exercise::{Exercise, SpecDoc};
use pf_domain::session::{InterventionIntent, InterventionKind, Level, Run, Session};
use pf_domain::stream::StreamEvent;
use pf_profile::ProfileAggregator;
use pf_providers::{ChatMessage, GenerateRequest, ProviderRegistry};

use crate::chunk::InterventionChunk;
use crate::level::{kind_for, recent_failed_runs, select_level};
use crate::prompt::{strip_level_claim, system_prompt, user_prompt, PromptInputs};

/// Chunk channel depth; the producer blocks when the consumer lags.
const CHUNK_BUFFER: usize = 32;
/// Buffered prefix inspected for a level claim before streaming starts.
const CLAIM_SNIFF_CHARS: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context and plan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the engine needs about one session, gathered by the
/// caller. Runs are in creation order.
pub struct InterventionContext {
    pub session: Session,
    pub exercise: Option<Exercise>,
    pub spec: Option<SpecDoc>,
    pub runs: Vec<Run>,
}

/// A planned intervention: the gate-relevant choices plus the prompt,
/// ready to dispatch. The caller checks the cooldown against
/// `level` before generating.
pub struct InterventionPlan {
    pub intent: InterventionIntent,
    pub level: Level,
    pub kind: InterventionKind,
    /// The run whose diagnostics fed the prompt, if any.
    pub run_id: Option<String>,
    provider: Option<String>,
    request: GenerateRequest,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PairingEngine {
    providers: Arc<ProviderRegistry>,
    profile: Arc<ProfileAggregator>,
}

impl PairingEngine {
    pub fn new(providers: Arc<ProviderRegistry>, profile: Arc<ProfileAggregator>) -> Self {
        Self { providers, profile }
    }

    /// Choose level and type and assemble the prompt.
    pub async fn plan(
        &self,
        intent: InterventionIntent,
        ctx: &InterventionContext,
        provider: Option<String>,
    ) -> Result<InterventionPlan> {
        let assessment = pf_profile::assess(&self.profile.snapshot().await);
        let failed = recent_failed_runs(&ctx.runs, Utc::now());
        let level = select_level(
            intent,
            &ctx.session.policy,
            &assessment,
            failed,
            ctx.session.hint_count,
        );
        let kind = kind_for(intent, level);

        let last_run = ctx.runs.last();
        let prompt = user_prompt(&PromptInputs {
            intent,
            level,
            kind,
            exercise: ctx.exercise.as_ref(),
            spec: ctx.spec.as_ref(),
            code: &ctx.session.code,
            last_run,
        });

        tracing::debug!(
            session_id = %ctx.session.id,
            intent = ?intent,
            level = %level,
            kind = ?kind,
            failed_runs = failed,
            "intervention planned"
        );

        Ok(InterventionPlan {
            intent,
            level,
            kind,
            run_id: last_run.map(|r| r.id.clone()),
            provider,
            request: GenerateRequest {
                model: None,
                messages: vec![ChatMessage::user(prompt)],
                system: Some(system_prompt()),
                max_tokens: Some(max_tokens_for(level)),
                temperature: Some(0.7),
                stop: Vec::new(),
            },
        })
    }

    /// Produce the full intervention content in one call.
    pub async fn intervene(&self, plan: &InterventionPlan) -> Result<String> {
        let provider = self.resolve_provider(plan)?;
        let response = provider.generate(plan.request.clone()).await?;

        let (content, claimed) = strip_level_claim(&response.content);
        if let Some(claimed) = claimed {
            if claimed > plan.level {
                tracing::warn!(
                    claimed = %claimed,
                    requested = %plan.level,
                    "response claimed a higher level; relabeled"
                );
            }
        }

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(Error::Provider {
                provider: provider.name().to_string(),
                message: "empty completion".into(),
            });
        }
        Ok(content)
    }

    /// Produce the intervention as a lazy chunk stream.
    ///
    /// Ordering: one `metadata` first, `content` fragments in production
    /// order, exactly one terminal `done` or `error`. Cancellation of
    /// `cancel` surfaces as a terminal `error` with reason `cancelled`.
    pub fn intervene_stream(
        &self,
        plan: InterventionPlan,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<InterventionChunk> {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let providers = self.providers.clone();

        tokio::spawn(async move {
            // Metadata always precedes any content.
            if tx
                .send(InterventionChunk::Metadata {
                    level: plan.level,
                    kind: plan.kind,
                })
                .await
                .is_err()
            {
                return;
            }

            let provider = match resolve(&providers, &plan) {
                Ok(p) => p,
                Err(e) => {
                    let _ = tx
                        .send(InterventionChunk::Error {
                            reason: e.code().into(),
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let mut stream = tokio::select! {
                result = provider.generate_stream(plan.request.clone()) => match result {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = tx
                            .send(InterventionChunk::Error {
                                reason: e.code().into(),
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                },
                _ = cancel.cancelled() => {
                    let _ = tx
                        .send(InterventionChunk::Error {
                            reason: "cancelled".into(),
                            message: "request cancelled".into(),
                        })
                        .await;
                    return;
                }
            };

            // Buffer the opening tokens so a leading level claim can be
            // stripped before the first content chunk goes out.
            let mut prefix: Option<String> = Some(String::new());

            loop {
                let event = tokio::select! {
                    event = stream.next() => event,
                    _ = cancel.cancelled() => {
                        // Dropping the stream aborts the provider request.
                        drop(stream);
                        let _ = tx
                            .send(InterventionChunk::Error {
                                reason: "cancelled".into(),
                                message: "request cancelled".into(),
                            })
                            .await;
                        return;
                    }
                };

                match event {
                    Some(Ok(StreamEvent::Token { text })) => {
                        let chunk_text = match prefix.take() {
                            Some(mut buffer) => {
                                buffer.push_str(&text);
                                if buffer.len() >= CLAIM_SNIFF_CHARS || buffer.contains('\n') {
                                    let (stripped, _claim) = strip_level_claim(&buffer);
                                    stripped
                                } else {
                                    prefix = Some(buffer);
                                    continue;
                                }
                            }
                            None => text,
                        };
                        if !chunk_text.is_empty()
                            && tx
                                .send(InterventionChunk::Content { text: chunk_text })
                                .await
                                .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(StreamEvent::Done { .. })) | None => {
                        // Flush a short response still sitting in the sniff
                        // buffer.
                        if let Some(buffer) = prefix.take() {
                            let (stripped, _claim) = strip_level_claim(&buffer);
                            if !stripped.is_empty()
                                && tx
                                    .send(InterventionChunk::Content { text: stripped })
                                    .await
                                    .is_err()
                            {
                                return;
                            }
                        }
                        let _ = tx.send(InterventionChunk::Done).await;
                        return;
                    }
                    Some(Ok(StreamEvent::Error { message })) => {
                        let _ = tx
                            .send(InterventionChunk::Error {
                                reason: "provider-error".into(),
                                message,
                            })
                            .await;
                        return;
                    }
                    Some(Err(e)) => {
                        let _ = tx
                            .send(InterventionChunk::Error {
                                reason: e.code().into(),
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        rx
    }

    fn resolve_provider(
        &self,
        plan: &InterventionPlan,
    ) -> Result<Arc<dyn pf_providers::LlmProvider>> {
        resolve(&self.providers, plan)
    }
}

fn resolve(
    providers: &ProviderRegistry,
    plan: &InterventionPlan,
) -> Result<Arc<dyn pf_providers::LlmProvider>> {
    match plan.provider.as_deref() {
        Some(name) => providers.get(name),
        None => providers.default_provider(),
    }
}

/// Lower levels get tighter budgets; a question needs far fewer tokens
/// than a partial solution.
fn max_tokens_for(level: Level) -> u32 {
    match level {
        Level::L0 => 200,
        Level::L1 => 300,
        Level::L2 => 400,
        Level::L3 => 700,
        Level::L4 => 1200,
        Level::L5 => 2000,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
