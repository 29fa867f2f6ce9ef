//! Durable session store.
//!
//! Sessions, runs, and interventions persist as one JSON document under
//! the configured state path. Every mutation rewrites the file through a
//! temp-file + rename pair, so readers never observe a partial write and
//! a crash leaves the previous generation intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pf_domain::error::{Error, Result};
use pf_domain::session::{Intervention, Run, Session};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    sessions: HashMap<String, Session>,
    runs: HashMap<String, Run>,
    interventions: HashMap<String, Intervention>,
}

/// JSON-file-backed store for the session aggregate and its records.
pub struct SessionStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl SessionStore {
    /// Load or create the store at `state_path/sessions.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("sessions.json");

        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            StoreData::default()
        };

        tracing::info!(
            sessions = data.sessions.len(),
            runs = data.runs.len(),
            interventions = data.interventions.len(),
            path = %path.display(),
            "session store loaded"
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Atomic write: serialize under the read lock, rename into place.
    fn persist(&self, data: &StoreData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }

    /// Flush the current state (used at shutdown; mutations already
    /// persist eagerly).
    pub fn flush(&self) -> Result<()> {
        let data = self.data.read();
        self.persist(&data)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn upsert_session(&self, session: Session) -> Result<()> {
        let mut data = self.data.write();
        data.sessions.insert(session.id.clone(), session);
        self.persist(&data)
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        self.data
            .read()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {id}")))
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.data.read().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Delete a session and cascade to its runs and interventions.
    /// Returns `not-found` when the session does not exist, so a second
    /// delete of the same id fails cleanly.
    pub fn delete_session(&self, id: &str) -> Result<()> {
        let mut data = self.data.write();
        if data.sessions.remove(id).is_none() {
            return Err(Error::NotFound(format!("session {id}")));
        }
        data.runs.retain(|_, run| run.session_id != id);
        data.interventions.retain(|_, iv| iv.session_id != id);
        self.persist(&data)
    }

    // ── Runs ─────────────────────────────────────────────────────────

    /// Insert a run and update its session in the same atomic write.
    pub fn insert_run(&self, run: Run, session: Session) -> Result<()> {
        let mut data = self.data.write();
        data.sessions.insert(session.id.clone(), session);
        data.runs.insert(run.id.clone(), run);
        self.persist(&data)
    }

    pub fn get_run(&self, id: &str) -> Result<Run> {
        self.data
            .read()
            .runs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("run {id}")))
    }

    pub fn runs_for_session(&self, session_id: &str) -> Vec<Run> {
        let mut runs: Vec<Run> = self
            .data
            .read()
            .runs
            .values()
            .filter(|run| run.session_id == session_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        runs
    }

    // ── Interventions ────────────────────────────────────────────────

    /// Insert an intervention and update its session in the same atomic
    /// write.
    pub fn insert_intervention(&self, intervention: Intervention, session: Session) -> Result<()> {
        let mut data = self.data.write();
        data.sessions.insert(session.id.clone(), session);
        data.interventions
            .insert(intervention.id.clone(), intervention);
        self.persist(&data)
    }

    pub fn interventions_for_session(&self, session_id: &str) -> Vec<Intervention> {
        let mut interventions: Vec<Intervention> = self
            .data
            .read()
            .interventions
            .values()
            .filter(|iv| iv.session_id == session_id)
            .cloned()
            .collect();
        interventions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        interventions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pf_domain::session::{
        CodeSnapshot, InterventionIntent, InterventionKind, LearningPolicy, Level, RunPhases,
        RunResult, SessionIntent, SessionStatus,
    };

    fn session(id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: id.into(),
            intent: SessionIntent::Greenfield,
            exercise_id: None,
            spec_path: None,
            code: CodeSnapshot::new(),
            policy: LearningPolicy::default(),
            status: SessionStatus::Active,
            run_count: 0,
            hint_count: 0,
            last_run_at: None,
            last_intervention_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn run(id: &str, session_id: &str) -> Run {
        Run {
            id: id.into(),
            session_id: session_id.into(),
            code: CodeSnapshot::new(),
            phases: RunPhases::default(),
            result: RunResult::default(),
            created_at: Utc::now(),
        }
    }

    fn intervention(id: &str, session_id: &str) -> Intervention {
        Intervention {
            id: id.into(),
            session_id: session_id.into(),
            run_id: None,
            intent: InterventionIntent::Hint,
            level: Level::L1,
            kind: InterventionKind::Hint,
            content: "think about edge cases".into(),
            justification: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        let s = session("s1");
        store.upsert_session(s.clone()).unwrap();
        let loaded = store.get_session("s1").unwrap();
        assert_eq!(loaded.id, s.id);
        assert_eq!(loaded.created_at, s.created_at);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SessionStore::open(dir.path()).unwrap();
            store.upsert_session(session("s1")).unwrap();
            store.insert_run(run("r1", "s1"), session("s1")).unwrap();
        }
        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.get_session("s1").is_ok());
        assert_eq!(store.runs_for_session("s1").len(), 1);
    }

    #[test]
    fn delete_cascades_and_is_not_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        store.upsert_session(session("s1")).unwrap();
        store.insert_run(run("r1", "s1"), session("s1")).unwrap();
        store
            .insert_intervention(intervention("i1", "s1"), session("s1"))
            .unwrap();
        // Unrelated session untouched by the cascade.
        store.upsert_session(session("s2")).unwrap();
        store.insert_run(run("r2", "s2"), session("s2")).unwrap();

        store.delete_session("s1").unwrap();
        assert!(store.get_session("s1").is_err());
        assert!(store.runs_for_session("s1").is_empty());
        assert!(store.interventions_for_session("s1").is_empty());
        assert_eq!(store.runs_for_session("s2").len(), 1);

        // Second delete: not-found.
        let err = store.delete_session("s1").unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[test]
    fn listing_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();

        let mut old = session("old");
        old.created_at = Utc::now() - chrono::Duration::hours(1);
        store.upsert_session(old).unwrap();
        store.upsert_session(session("new")).unwrap();

        let list = store.list_sessions();
        assert_eq!(list[0].id, "new");
        assert_eq!(list[1].id, "old");
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sessions.json"), "{not json").unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.list_sessions().is_empty());
    }
}
