//! Profile event fan-out.
//!
//! The session manager publishes an event after each successful journal
//! write; the profile aggregator consumes them. Events carry their own
//! identity so replays are idempotent. Publishing is infallible from the
//! caller's point of view: sink failures are logged by the sink, never
//! propagated into session operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Level, SessionIntent};

/// Session fields the profile cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub intent: SessionIntent,
    #[serde(default)]
    pub exercise_id: Option<String>,
    pub track: String,
}

/// Run fields the profile cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    /// All requested phases passed.
    pub green: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub build_output: String,
    #[serde(default)]
    pub test_output: String,
}

/// An event published by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileEvent {
    SessionStart {
        event_id: String,
        at: DateTime<Utc>,
        session: SessionInfo,
    },
    SessionComplete {
        event_id: String,
        at: DateTime<Utc>,
        session: SessionInfo,
        /// `true` for complete, `false` for abandon.
        completed: bool,
    },
    RunComplete {
        event_id: String,
        at: DateTime<Utc>,
        session: SessionInfo,
        run: RunInfo,
    },
    HintDelivered {
        event_id: String,
        at: DateTime<Utc>,
        session: SessionInfo,
        level: Level,
    },
}

impl ProfileEvent {
    /// The identity used for replay deduplication.
    pub fn event_id(&self) -> &str {
        match self {
            ProfileEvent::SessionStart { event_id, .. }
            | ProfileEvent::SessionComplete { event_id, .. }
            | ProfileEvent::RunComplete { event_id, .. }
            | ProfileEvent::HintDelivered { event_id, .. } => event_id,
        }
    }

    pub fn session(&self) -> &SessionInfo {
        match self {
            ProfileEvent::SessionStart { session, .. }
            | ProfileEvent::SessionComplete { session, .. }
            | ProfileEvent::RunComplete { session, .. }
            | ProfileEvent::HintDelivered { session, .. } => session,
        }
    }
}

/// Consumer of profile events.
#[async_trait::async_trait]
pub trait ProfileSink: Send + Sync {
    /// Apply one event. Implementations log their own failures; callers
    /// proceed regardless.
    async fn publish(&self, event: ProfileEvent);
}

/// A sink that drops everything. Useful in tests.
pub struct NullProfileSink;

#[async_trait::async_trait]
impl ProfileSink for NullProfileSink {
    async fn publish(&self, _event: ProfileEvent) {}
}
