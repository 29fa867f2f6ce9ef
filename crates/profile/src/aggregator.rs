//! Event ingestion into the learning profile.
//!
//! Handlers are idempotent on event identity and applied in arrival
//! order under a single writer lock. Each applied event persists the
//! whole profile as one atomic write; storage failures are logged and
//! swallowed so session operations never fail on profile trouble.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use pf_domain::events::{ProfileEvent, ProfileSink, RunInfo, SessionInfo};
use pf_exec::diagnostics::normalize_error_signatures;

use crate::model::{ExerciseAttempt, LearningProfile, TrendPoint, TIME_TO_GREEN_ALPHA};
use crate::topic::topic_key;

/// Skill delta applied to a topic on successful completion.
const SKILL_GAIN_ON_SUCCESS: f64 = 0.05;
/// Skill delta applied on abandonment.
const SKILL_LOSS_ON_ABANDON: f64 = -0.01;
/// Trend points are sampled every this many runs.
const TREND_WINDOW: u32 = 10;
/// How many recently applied event ids are remembered for dedup.
const SEEN_EVENTS_CAP: usize = 512;

struct AggregatorState {
    profile: LearningProfile,
    seen_ids: HashSet<String>,
    seen_order: VecDeque<String>,
}

/// Owns the learning profile; single logical writer.
pub struct ProfileAggregator {
    store: Arc<crate::store::ProfileStore>,
    state: Mutex<AggregatorState>,
}

impl ProfileAggregator {
    /// Load the profile (or start fresh) for the given id.
    pub fn open(store: Arc<crate::store::ProfileStore>, profile_id: &str) -> Self {
        let profile = store
            .get(profile_id)
            .ok()
            .flatten()
            .unwrap_or_else(|| LearningProfile::new(profile_id));

        tracing::info!(
            profile_id,
            sessions = profile.sessions_started,
            runs = profile.total_runs,
            "learning profile loaded"
        );

        Self {
            store,
            state: Mutex::new(AggregatorState {
                profile,
                seen_ids: HashSet::new(),
                seen_order: VecDeque::new(),
            }),
        }
    }

    /// A point-in-time copy for assessment and analytics reads.
    pub async fn snapshot(&self) -> LearningProfile {
        self.state.lock().await.profile.clone()
    }

    // ── Event handlers ───────────────────────────────────────────────

    fn on_session_start(profile: &mut LearningProfile, at: DateTime<Utc>, session: &SessionInfo) {
        profile.sessions_started += 1;
        let topic = topic_key(session.exercise_id.as_deref());
        profile.push_attempt(ExerciseAttempt {
            session_id: session.session_id.clone(),
            exercise_id: session.exercise_id.clone(),
            topic: topic.clone(),
            started_at: at,
            completed_at: None,
            success: false,
        });
        // Attempt counter moves on start; level only moves on completion.
        if let Some(skill) = profile.topic_skills.get_mut(&topic) {
            skill.attempts += 1;
            skill.last_seen = at;
        } else {
            profile.bump_topic(&topic, 0.0, at);
            profile.topic_skills.get_mut(&topic).unwrap().attempts = 1;
        }
    }

    fn on_session_complete(
        profile: &mut LearningProfile,
        at: DateTime<Utc>,
        session: &SessionInfo,
        completed: bool,
    ) {
        let topic = topic_key(session.exercise_id.as_deref());
        if completed {
            profile.sessions_completed += 1;
            profile.exercises_completed += 1;
            profile.bump_topic(&topic, SKILL_GAIN_ON_SUCCESS, at);
            if let Some(attempt) = profile
                .exercise_history
                .iter_mut()
                .rev()
                .find(|a| a.session_id == session.session_id)
            {
                attempt.completed_at = Some(at);
                attempt.success = true;
            }
        } else {
            profile.bump_topic(&topic, SKILL_LOSS_ON_ABANDON, at);
        }
    }

    fn on_run_complete(
        profile: &mut LearningProfile,
        at: DateTime<Utc>,
        _session: &SessionInfo,
        run: &RunInfo,
    ) {
        profile.total_runs += 1;

        if run.green {
            let sample = run.duration_ms as f64;
            profile.time_to_green_ema_ms = if profile.time_to_green_ema_ms == 0.0 {
                sample
            } else {
                TIME_TO_GREEN_ALPHA * sample
                    + (1.0 - TIME_TO_GREEN_ALPHA) * profile.time_to_green_ema_ms
            };
        } else {
            let mut failures = run.build_output.clone();
            failures.push('\n');
            failures.push_str(&run.test_output);
            for signature in normalize_error_signatures(&failures) {
                *profile.error_patterns.entry(signature).or_default() += 1;
            }
        }

        if profile.total_runs % TREND_WINDOW as u64 == 0 {
            let dependency = profile.hint_dependency();
            profile.push_trend_point(TrendPoint {
                timestamp: at,
                dependency,
                window: TREND_WINDOW,
            });
        }
    }

    fn on_hint_delivered(profile: &mut LearningProfile) {
        profile.hint_requests += 1;
    }
}

#[async_trait::async_trait]
impl ProfileSink for ProfileAggregator {
    async fn publish(&self, event: ProfileEvent) {
        let mut state = self.state.lock().await;

        // Replayed event: already applied, nothing to do.
        let event_id = event.event_id().to_string();
        if state.seen_ids.contains(&event_id) {
            tracing::debug!(event_id = %event_id, "duplicate profile event ignored");
            return;
        }
        state.seen_ids.insert(event_id.clone());
        state.seen_order.push_back(event_id);
        while state.seen_order.len() > SEEN_EVENTS_CAP {
            if let Some(old) = state.seen_order.pop_front() {
                state.seen_ids.remove(&old);
            }
        }

        let profile = &mut state.profile;
        match &event {
            ProfileEvent::SessionStart { at, session, .. } => {
                Self::on_session_start(profile, *at, session)
            }
            ProfileEvent::SessionComplete {
                at,
                session,
                completed,
                ..
            } => Self::on_session_complete(profile, *at, session, *completed),
            ProfileEvent::RunComplete {
                at, session, run, ..
            } => Self::on_run_complete(profile, *at, session, run),
            ProfileEvent::HintDelivered { .. } => Self::on_hint_delivered(profile),
        }
        profile.updated_at = Utc::now();

        if let Err(e) = self.store.upsert(profile) {
            tracing::error!(
                profile_id = %profile.id,
                error = %e,
                "failed to persist profile update"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
