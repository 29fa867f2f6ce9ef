//! The session manager: every client-visible mutation passes through
//! here.
//!
//! Owns intent inference at creation, the policy/cooldown gate on
//! interventions, run dispatch to the execution orchestrator, and the
//! profile event fan-out. Mutations on one session are serialized by the
//! per-session lock map; profile notification failures never fail the
//! journaled operation.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use pf_domain::config::LearningConfig;
use pf_domain::error::{Error, Result};
use pf_domain::events::{ProfileEvent, ProfileSink, RunInfo, SessionInfo};
use pf_domain::exercise::{CheckRecipe, ExerciseRegistry, SpecService};
use pf_domain::session::{
    CodeSnapshot, Intervention, InterventionIntent, InterventionKind, LearningPolicy, Level, Run,
    RunPhases, Session, SessionIntent, SessionStatus,
};
use pf_exec::ExecutionOrchestrator;

use crate::cooldown::cooldown_remaining;
use crate::lock::SessionLockMap;
use crate::store::SessionStore;

/// Minimum justification length accepted for an L5 intervention.
const L5_JUSTIFICATION_MIN_CHARS: usize = 16;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Clone)]
pub struct CreateSessionRequest {
    pub exercise_id: Option<String>,
    pub spec_path: Option<String>,
    pub code: Option<CodeSnapshot>,
    pub track: Option<String>,
    pub policy: Option<LearningPolicy>,
}

#[derive(Debug, Default, Clone)]
pub struct RunRequest {
    /// Run-only override; the session snapshot is used when absent.
    pub code: Option<CodeSnapshot>,
    pub phases: RunPhases,
}

/// An intervention produced by the pairing engine, ready for the gate.
#[derive(Debug, Clone)]
pub struct InterventionDraft {
    pub run_id: Option<String>,
    pub intent: InterventionIntent,
    pub level: Level,
    pub kind: InterventionKind,
    pub content: String,
    pub justification: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionManager {
    store: Arc<SessionStore>,
    locks: SessionLockMap,
    exercises: Arc<dyn ExerciseRegistry>,
    specs: Arc<dyn SpecService>,
    orchestrator: Arc<ExecutionOrchestrator>,
    profile: Arc<dyn ProfileSink>,
    learning: LearningConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<SessionStore>,
        exercises: Arc<dyn ExerciseRegistry>,
        specs: Arc<dyn SpecService>,
        orchestrator: Arc<ExecutionOrchestrator>,
        profile: Arc<dyn ProfileSink>,
        learning: LearningConfig,
    ) -> Self {
        Self {
            store,
            locks: SessionLockMap::new(),
            exercises,
            specs,
            orchestrator,
            profile,
            learning,
        }
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Create a session, inferring intent from the request shape:
    /// exercise-id → training, spec-path → feature-guidance, neither →
    /// greenfield. Collaborator lookups happen before anything persists,
    /// so a failed create leaves no trace.
    pub async fn create(&self, req: CreateSessionRequest) -> Result<Session> {
        if req.exercise_id.is_some() && req.spec_path.is_some() {
            return Err(Error::BadRequest(
                "provide exercise_id or spec_path, not both".into(),
            ));
        }

        let (intent, code) = if let Some(ref exercise_id) = req.exercise_id {
            let exercise = self.exercises.load(exercise_id).await?;
            (SessionIntent::Training, exercise.initial_snapshot())
        } else if let Some(ref spec_path) = req.spec_path {
            // Validation only; the doc is re-read at prompt time.
            self.specs.load_validated(spec_path).await?;
            (
                SessionIntent::FeatureGuidance,
                req.code.clone().unwrap_or_default(),
            )
        } else {
            (SessionIntent::Greenfield, req.code.clone().unwrap_or_default())
        };

        let track = req
            .track
            .clone()
            .unwrap_or_else(|| self.learning.default_track.clone());
        let policy = req.policy.clone().unwrap_or_else(|| {
            let track_policy = self.learning.policy_for(&track);
            LearningPolicy {
                max_level: track_policy.max_level,
                cooldown_seconds: track_policy.cooldown_seconds,
                patching_enabled: track_policy.patching_enabled,
                track: track.clone(),
            }
        });

        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            intent,
            exercise_id: req.exercise_id,
            spec_path: req.spec_path,
            code,
            policy,
            status: SessionStatus::Active,
            run_count: 0,
            hint_count: 0,
            last_run_at: None,
            last_intervention_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.upsert_session(session.clone())?;
        tracing::info!(
            session_id = %session.id,
            intent = ?session.intent,
            track = %session.policy.track,
            "session created"
        );

        self.publish(ProfileEvent::SessionStart {
            event_id: uuid::Uuid::new_v4().to_string(),
            at: now,
            session: info_of(&session),
        })
        .await;

        Ok(session)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Result<Session> {
        self.store.get_session(id)
    }

    pub fn list(&self) -> Vec<Session> {
        self.store.list_sessions()
    }

    pub fn runs(&self, session_id: &str) -> Vec<Run> {
        self.store.runs_for_session(session_id)
    }

    pub fn interventions(&self, session_id: &str) -> Vec<Intervention> {
        self.store.interventions_for_session(session_id)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Delete a session and everything it owns. A second delete of the
    /// same id returns `not-found`.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.locks.acquire(id).await?;
        self.store.delete_session(id)?;
        self.locks.remove(id);
        tracing::info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Replace the working snapshot. Active sessions only.
    pub async fn update_code(&self, id: &str, code: CodeSnapshot) -> Result<Session> {
        let _guard = self.locks.acquire(id).await?;
        let mut session = self.active_session(id)?;
        session.code = code;
        session.updated_at = Utc::now();
        self.store.upsert_session(session.clone())?;
        Ok(session)
    }

    /// Rewrite the session snapshot to canonical formatting.
    ///
    /// Gated on the session policy's `patching_enabled`: the daemon only
    /// edits learner code when the Learning Contract says it may.
    pub async fn format_code(&self, id: &str, cancel: &CancellationToken) -> Result<Session> {
        let _guard = self.locks.acquire(id).await?;
        let mut session = self.active_session(id)?;

        if !session.policy.patching_enabled {
            return Err(Error::Forbidden(
                "patching is disabled for this session's track".into(),
            ));
        }
        if session.code.is_empty() {
            return Err(Error::BadRequest("no code to format".into()));
        }

        let fixed = self.orchestrator.format_fix(&session.code, cancel).await?;
        session.code = fixed;
        session.updated_at = Utc::now();
        self.store.upsert_session(session.clone())?;
        tracing::info!(session_id = %id, "snapshot reformatted");
        Ok(session)
    }

    /// Dispatch a format/build/test pass and journal the result.
    ///
    /// The per-session lock is held across the sandbox run, so a second
    /// concurrent run on the same session waits its turn.
    pub async fn run_code(
        &self,
        id: &str,
        req: RunRequest,
        cancel: &CancellationToken,
    ) -> Result<Run> {
        let _guard = self.locks.acquire(id).await?;
        let mut session = self.active_session(id)?;

        let code = req.code.unwrap_or_else(|| session.code.clone());
        if code.is_empty() {
            return Err(Error::BadRequest("no code to run".into()));
        }

        let recipe = self.recipe_for(&session).await;
        let result = self
            .orchestrator
            .run(&code, req.phases, recipe.as_ref(), cancel)
            .await?;

        let now = Utc::now();
        let run = Run {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            code,
            phases: req.phases,
            result,
            created_at: now,
        };

        session.run_count += 1;
        session.last_run_at = Some(now);
        session.updated_at = now;
        self.store.insert_run(run.clone(), session.clone())?;

        let green = run.result.is_green(run.phases);
        tracing::info!(
            session_id = %session.id,
            run_id = %run.id,
            green,
            duration_ms = run.result.duration_ms,
            "run journaled"
        );

        self.publish(ProfileEvent::RunComplete {
            event_id: uuid::Uuid::new_v4().to_string(),
            at: now,
            session: info_of(&session),
            run: RunInfo {
                run_id: run.id.clone(),
                green,
                duration_ms: run.result.duration_ms,
                build_output: run.result.build_output.clone(),
                test_output: run.result.test_output.clone(),
            },
        })
        .await;

        Ok(run)
    }

    /// The policy gate: clamp check, L5 justification, cooldown. On
    /// success the intervention is journaled and the profile notified.
    pub async fn record_intervention(
        &self,
        id: &str,
        draft: InterventionDraft,
    ) -> Result<Intervention> {
        let _guard = self.locks.acquire(id).await?;
        let mut session = self.active_session(id)?;

        if draft.level > session.policy.max_level {
            return Err(Error::Forbidden(format!(
                "level {} exceeds the session cap {}",
                draft.level, session.policy.max_level
            )));
        }
        if draft.content.trim().is_empty() {
            return Err(Error::Forbidden("intervention content is empty".into()));
        }
        if draft.level == Level::L5 {
            let justified = draft
                .justification
                .as_deref()
                .map(|j| j.trim().chars().count() >= L5_JUSTIFICATION_MIN_CHARS)
                .unwrap_or(false);
            if !justified {
                return Err(Error::Forbidden(format!(
                    "a full solution requires a justification of at least {L5_JUSTIFICATION_MIN_CHARS} characters"
                )));
            }
        }

        let now = Utc::now();
        if let Some(remaining_seconds) = cooldown_remaining(
            now,
            session.last_intervention_at,
            session.policy.cooldown_seconds,
            draft.level,
        ) {
            return Err(Error::CooldownActive { remaining_seconds });
        }

        let intervention = Intervention {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            run_id: draft.run_id,
            intent: draft.intent,
            level: draft.level,
            kind: draft.kind,
            content: draft.content,
            justification: draft.justification,
            created_at: now,
        };

        session.hint_count += 1;
        session.last_intervention_at = Some(now);
        session.updated_at = now;
        self.store
            .insert_intervention(intervention.clone(), session.clone())?;

        tracing::info!(
            session_id = %session.id,
            intervention_id = %intervention.id,
            level = %intervention.level,
            intent = ?intervention.intent,
            "intervention journaled"
        );

        self.publish(ProfileEvent::HintDelivered {
            event_id: uuid::Uuid::new_v4().to_string(),
            at: now,
            session: info_of(&session),
            level: intervention.level,
        })
        .await;

        Ok(intervention)
    }

    pub async fn complete(&self, id: &str) -> Result<Session> {
        self.finish(id, SessionStatus::Completed).await
    }

    pub async fn abandon(&self, id: &str) -> Result<Session> {
        self.finish(id, SessionStatus::Abandoned).await
    }

    async fn finish(&self, id: &str, status: SessionStatus) -> Result<Session> {
        let _guard = self.locks.acquire(id).await?;
        let mut session = self.active_session(id)?;

        let now = Utc::now();
        session.status = status;
        session.updated_at = now;
        self.store.upsert_session(session.clone())?;
        tracing::info!(session_id = %id, status = %status, "session closed");

        self.publish(ProfileEvent::SessionComplete {
            event_id: uuid::Uuid::new_v4().to_string(),
            at: now,
            session: info_of(&session),
            completed: status == SessionStatus::Completed,
        })
        .await;

        Ok(session)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn active_session(&self, id: &str) -> Result<Session> {
        let session = self.store.get_session(id)?;
        if !session.is_active() {
            return Err(Error::SessionNotActive {
                session_id: session.id,
                status: session.status.to_string(),
            });
        }
        Ok(session)
    }

    /// Check recipe for a training session; other intents use runner
    /// defaults.
    async fn recipe_for(&self, session: &Session) -> Option<CheckRecipe> {
        let exercise_id = session.exercise_id.as_deref()?;
        match self.exercises.load(exercise_id).await {
            Ok(exercise) => Some(exercise.recipe),
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    exercise_id,
                    error = %e,
                    "exercise vanished after session creation; using default recipe"
                );
                None
            }
        }
    }

    async fn publish(&self, event: ProfileEvent) {
        // Sink failures are its own problem; journaled state is already
        // durable at this point.
        self.profile.publish(event).await;
    }
}

fn info_of(session: &Session) -> SessionInfo {
    SessionInfo {
        session_id: session.id.clone(),
        intent: session.intent,
        exercise_id: session.exercise_id.clone(),
        track: session.policy.track.clone(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pf_domain::config::RunnerConfig;
    use pf_domain::exercise::{Exercise, SpecDoc};
    use pf_exec::sandbox::{ExecOutcome, ExecSpec, Sandbox};

    struct FakeExercises;

    #[async_trait::async_trait]
    impl ExerciseRegistry for FakeExercises {
        async fn load(&self, exercise_id: &str) -> Result<Exercise> {
            if exercise_id != "go-v1/basics/hello-world" {
                return Err(Error::ExerciseNotFound(exercise_id.into()));
            }
            let mut starter = CodeSnapshot::new();
            starter.insert("main.go".into(), "package main\n\nfunc main() {}\n".into());
            let mut tests = CodeSnapshot::new();
            tests.insert("main_test.go".into(), "package main\n".into());
            Ok(Exercise {
                id: exercise_id.into(),
                title: "Hello World".into(),
                description: "print hello".into(),
                difficulty: "intro".into(),
                rubric: vec!["prints hello".into()],
                starter_code: starter,
                test_code: tests,
                recipe: CheckRecipe::default(),
                hints: Default::default(),
            })
        }
    }

    struct FakeSpecs;

    #[async_trait::async_trait]
    impl SpecService for FakeSpecs {
        async fn load_validated(&self, spec_path: &str) -> Result<SpecDoc> {
            if spec_path.ends_with("bad.yaml") {
                return Err(Error::SpecInvalid("spec has no goals".into()));
            }
            Ok(SpecDoc {
                path: spec_path.into(),
                name: "feature".into(),
                goals: vec!["ship it".into()],
                features: vec![],
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProfileEvent>>,
    }

    #[async_trait::async_trait]
    impl ProfileSink for RecordingSink {
        async fn publish(&self, event: ProfileEvent) {
            self.events.lock().push(event);
        }
    }

    /// Sandbox whose build phase can be scripted to fail.
    struct StubSandbox {
        build_exit: i32,
    }

    #[async_trait::async_trait]
    impl Sandbox for StubSandbox {
        fn kind(&self) -> &'static str {
            "stub"
        }

        async fn exec(&self, spec: ExecSpec<'_>) -> Result<ExecOutcome> {
            let is_build = spec.argv.join(" ").contains("build");
            let exit = if is_build { self.build_exit } else { 0 };
            Ok(ExecOutcome {
                exit_code: Some(exit),
                output: if exit == 0 {
                    String::new()
                } else {
                    "./main.go:3:1: undefined: prntln".into()
                },
                timed_out: false,
            })
        }

        async fn exec_and_collect(
            &self,
            spec: ExecSpec<'_>,
        ) -> Result<(ExecOutcome, CodeSnapshot)> {
            let code = spec.code.clone();
            let outcome = self.exec(spec).await?;
            Ok((outcome, code))
        }
    }

    struct Harness {
        manager: SessionManager,
        sink: Arc<RecordingSink>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(build_exit: i32) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path()).unwrap());
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = Arc::new(ExecutionOrchestrator::with_sandbox(
            Arc::new(StubSandbox { build_exit }),
            RunnerConfig::default(),
        ));
        let manager = SessionManager::new(
            store,
            Arc::new(FakeExercises),
            Arc::new(FakeSpecs),
            orchestrator,
            sink.clone(),
            LearningConfig::default(),
        );
        Harness {
            manager,
            sink,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(0)
    }

    fn hint_draft(level: Level) -> InterventionDraft {
        InterventionDraft {
            run_id: None,
            intent: InterventionIntent::Hint,
            level,
            kind: InterventionKind::Hint,
            content: "think about the empty input".into(),
            justification: None,
        }
    }

    #[tokio::test]
    async fn create_training_session_uses_starter_and_tests() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("go-v1/basics/hello-world".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(session.intent, SessionIntent::Training);
        assert!(session.code.contains_key("main.go"));
        assert!(session.code.contains_key("main_test.go"));
        assert_eq!(session.run_count, 0);
        assert_eq!(session.hint_count, 0);
        assert!(matches!(
            h.sink.events.lock()[0],
            ProfileEvent::SessionStart { .. }
        ));
    }

    #[tokio::test]
    async fn create_unknown_exercise_fails_without_persisting() {
        let h = harness();
        let err = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("go-v1/basics/missing".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "exercise-not-found");
        assert!(h.manager.list().is_empty());
        assert!(h.sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn create_invalid_spec_fails_without_persisting() {
        let h = harness();
        let err = h
            .manager
            .create(CreateSessionRequest {
                spec_path: Some("specs/bad.yaml".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "spec-invalid");
        assert!(h.manager.list().is_empty());
    }

    #[tokio::test]
    async fn create_with_both_references_is_bad_request() {
        let h = harness();
        let err = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("x".into()),
                spec_path: Some("y.yaml".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad-request");
    }

    #[tokio::test]
    async fn run_code_increments_counter_and_notifies_profile() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("go-v1/basics/hello-world".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let run = h
            .manager
            .run_code(
                &session.id,
                RunRequest::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(run.result.build_ok);
        let reloaded = h.manager.get(&session.id).unwrap();
        assert_eq!(reloaded.run_count, 1);
        assert!(reloaded.last_run_at.is_some());
        assert_eq!(h.manager.runs(&session.id).len(), 1);

        let events = h.sink.events.lock();
        assert!(matches!(events.last(), Some(ProfileEvent::RunComplete { .. })));
    }

    #[tokio::test]
    async fn build_failure_persists_with_tests_skipped() {
        let h = harness_with(1);
        let session = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("go-v1/basics/hello-world".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let run = h
            .manager
            .run_code(
                &session.id,
                RunRequest::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(run.result.format_ok);
        assert!(!run.result.build_ok);
        assert!(!run.result.test_ok);
        assert!(run.result.test_results.is_empty());
        assert!(!run.result.build_output.is_empty());
        assert_eq!(h.manager.get(&session.id).unwrap().run_count, 1);
    }

    #[tokio::test]
    async fn intervention_counts_and_cooldown_gate() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest::default())
            .await
            .unwrap();

        // L3 passes the first time.
        h.manager
            .record_intervention(&session.id, hint_draft(Level::L3))
            .await
            .unwrap();
        assert_eq!(h.manager.get(&session.id).unwrap().hint_count, 1);

        // Immediate second L3 hits the cooldown (default 60s).
        let err = h
            .manager
            .record_intervention(&session.id, hint_draft(Level::L3))
            .await
            .unwrap_err();
        match err {
            Error::CooldownActive { remaining_seconds } => {
                assert!(remaining_seconds >= 55, "remaining {remaining_seconds}");
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
        // Counter unchanged after the rejection.
        assert_eq!(h.manager.get(&session.id).unwrap().hint_count, 1);

        // L0-L2 bypass the gate.
        h.manager
            .record_intervention(&session.id, hint_draft(Level::L1))
            .await
            .unwrap();
        assert_eq!(h.manager.get(&session.id).unwrap().hint_count, 2);
    }

    #[tokio::test]
    async fn level_above_cap_is_forbidden() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest::default())
            .await
            .unwrap();

        // Default policy caps at L3.
        let err = h
            .manager
            .record_intervention(&session.id, hint_draft(Level::L4))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert_eq!(h.manager.get(&session.id).unwrap().hint_count, 0);
    }

    #[tokio::test]
    async fn l5_requires_substantial_justification() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest {
                policy: Some(LearningPolicy {
                    max_level: Level::L5,
                    cooldown_seconds: 0,
                    patching_enabled: true,
                    track: "mentor".into(),
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut draft = hint_draft(Level::L5);
        assert_eq!(
            h.manager
                .record_intervention(&session.id, draft.clone())
                .await
                .unwrap_err()
                .code(),
            "forbidden"
        );

        draft.justification = Some("short".into());
        assert!(h
            .manager
            .record_intervention(&session.id, draft.clone())
            .await
            .is_err());

        draft.justification = Some("learner explicitly asked for the full solution".into());
        let stored = h
            .manager
            .record_intervention(&session.id, draft)
            .await
            .unwrap();
        assert_eq!(stored.level, Level::L5);
        assert!(stored.justification.is_some());
    }

    #[tokio::test]
    async fn terminal_sessions_reject_mutations() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest::default())
            .await
            .unwrap();

        h.manager.complete(&session.id).await.unwrap();

        let err = h
            .manager
            .update_code(&session.id, CodeSnapshot::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "session-not-active");

        let err = h.manager.complete(&session.id).await.unwrap_err();
        assert_eq!(err.code(), "session-not-active");

        let err = h
            .manager
            .record_intervention(&session.id, hint_draft(Level::L1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "session-not-active");
    }

    #[tokio::test]
    async fn complete_and_abandon_emit_distinct_events() {
        let h = harness();
        let a = h.manager.create(CreateSessionRequest::default()).await.unwrap();
        let b = h.manager.create(CreateSessionRequest::default()).await.unwrap();

        h.manager.complete(&a.id).await.unwrap();
        h.manager.abandon(&b.id).await.unwrap();

        let events = h.sink.events.lock();
        let completions: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                ProfileEvent::SessionComplete { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(completions, vec![true, false]);
    }

    #[tokio::test]
    async fn delete_cascades_and_second_delete_is_not_found() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest::default())
            .await
            .unwrap();
        h.manager
            .record_intervention(&session.id, hint_draft(Level::L1))
            .await
            .unwrap();

        h.manager.delete(&session.id).await.unwrap();
        assert!(h.manager.interventions(&session.id).is_empty());
        assert_eq!(
            h.manager.delete(&session.id).await.unwrap_err().code(),
            "not-found"
        );
    }

    #[tokio::test]
    async fn format_code_requires_patching_enabled() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("go-v1/basics/hello-world".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        // Default track leaves patching off.
        let err = h
            .manager
            .format_code(&session.id, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");

        let session = h
            .manager
            .create(CreateSessionRequest {
                exercise_id: Some("go-v1/basics/hello-world".into()),
                policy: Some(LearningPolicy {
                    patching_enabled: true,
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await
            .unwrap();
        let formatted = h
            .manager
            .format_code(&session.id, &CancellationToken::new())
            .await
            .unwrap();
        assert!(formatted.code.contains_key("main.go"));
    }

    #[tokio::test]
    async fn hint_count_matches_journal_length() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest::default())
            .await
            .unwrap();

        for _ in 0..3 {
            h.manager
                .record_intervention(&session.id, hint_draft(Level::L1))
                .await
                .unwrap();
        }

        let reloaded = h.manager.get(&session.id).unwrap();
        assert_eq!(reloaded.hint_count, 3);
        assert_eq!(
            reloaded.hint_count as usize,
            h.manager.interventions(&session.id).len()
        );
    }

    #[tokio::test]
    async fn updated_at_is_monotone() {
        let h = harness();
        let session = h
            .manager
            .create(CreateSessionRequest::default())
            .await
            .unwrap();
        let t0 = session.updated_at;

        let after = h
            .manager
            .update_code(&session.id, CodeSnapshot::new())
            .await
            .unwrap();
        assert!(after.updated_at >= t0);
    }
}
