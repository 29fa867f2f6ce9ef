//! The session aggregate and its owned records.
//!
//! Sessions are mutated exclusively through the session manager; runs and
//! interventions reference their session by ID (no back-pointers).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relative file path → file content.
pub type CodeSnapshot = BTreeMap<String, String>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Intervention levels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Intervention intensity ladder.
///
/// - `L0` clarifying question only
/// - `L1` category hint
/// - `L2` location + concept (default clamp)
/// - `L3` constrained snippet or outline
/// - `L4` partial solution with explanation (cooldown-gated)
/// - `L5` full solution (explicit opt-in, justification journaled)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Level {
    L0,
    L1,
    #[default]
    L2,
    L3,
    L4,
    L5,
}

impl Level {
    pub fn as_u8(self) -> u8 {
        match self {
            Level::L0 => 0,
            Level::L1 => 1,
            Level::L2 => 2,
            Level::L3 => 3,
            Level::L4 => 4,
            Level::L5 => 5,
        }
    }

    pub fn from_u8(n: u8) -> Option<Level> {
        match n {
            0 => Some(Level::L0),
            1 => Some(Level::L1),
            2 => Some(Level::L2),
            3 => Some(Level::L3),
            4 => Some(Level::L4),
            5 => Some(Level::L5),
            _ => None,
        }
    }

    /// One step up the ladder, saturating at L5.
    pub fn bump(self) -> Level {
        Level::from_u8(self.as_u8() + 1).unwrap_or(Level::L5)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.as_u8())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Learning policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The per-session Learning Contract: intensity clamp plus cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPolicy {
    #[serde(default = "d_max_level")]
    pub max_level: Level,
    #[serde(default = "d_cooldown")]
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub patching_enabled: bool,
    #[serde(default = "d_track")]
    pub track: String,
}

impl Default for LearningPolicy {
    fn default() -> Self {
        Self {
            max_level: Level::L3,
            cooldown_seconds: 60,
            patching_enabled: false,
            track: d_track(),
        }
    }
}

fn d_max_level() -> Level {
    Level::L3
}
fn d_cooldown() -> u64 {
    60
}
fn d_track() -> String {
    "standard".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIntent {
    Training,
    FeatureGuidance,
    Greenfield,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// The primary aggregate. Intent is fixed at creation; counters and
/// timestamps only ever move forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub intent: SessionIntent,
    /// Exercise reference (`<pack>/<category>/<slug>`), training only.
    #[serde(default)]
    pub exercise_id: Option<String>,
    /// Spec document path, feature-guidance only.
    #[serde(default)]
    pub spec_path: Option<String>,
    #[serde(default)]
    pub code: CodeSnapshot,
    pub policy: LearningPolicy,
    pub status: SessionStatus,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub hint_count: u64,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_intervention_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which phases a run should attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunPhases {
    #[serde(default = "d_true")]
    pub format: bool,
    #[serde(default = "d_true")]
    pub build: bool,
    #[serde(default = "d_true")]
    pub test: bool,
}

impl Default for RunPhases {
    fn default() -> Self {
        Self {
            format: true,
            build: true,
            test: true,
        }
    }
}

fn d_true() -> bool {
    true
}

/// One parsed per-test record from the test phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    #[serde(default)]
    pub package: String,
    pub passed: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub output: String,
}

/// A structured build diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    pub severity: DiagnosticSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// Outcome of one format/build/test pass over a snapshot.
///
/// `build_ok = false` implies `test_ok = false` and empty `test_results`:
/// tests are never attempted on a broken build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub format_ok: bool,
    pub build_ok: bool,
    pub test_ok: bool,
    #[serde(default)]
    pub format_output: String,
    #[serde(default)]
    pub build_output: String,
    #[serde(default)]
    pub test_output: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub test_results: Vec<TestRecord>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl RunResult {
    /// All requested phases passed.
    pub fn is_green(&self, phases: RunPhases) -> bool {
        (!phases.format || self.format_ok)
            && (!phases.build || self.build_ok)
            && (!phases.test || self.test_ok)
    }
}

/// A completed code-execution record. Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub session_id: String,
    #[serde(default)]
    pub code: CodeSnapshot,
    pub phases: RunPhases,
    pub result: RunResult,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interventions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionIntent {
    Hint,
    Review,
    Stuck,
    Next,
    Explain,
}

impl InterventionIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            InterventionIntent::Hint => "hint",
            InterventionIntent::Review => "review",
            InterventionIntent::Stuck => "stuck",
            InterventionIntent::Next => "next",
            InterventionIntent::Explain => "explain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Question,
    Hint,
    Nudge,
    Critique,
    Explanation,
}

impl InterventionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InterventionKind::Question => "question",
            InterventionKind::Hint => "hint",
            InterventionKind::Nudge => "nudge",
            InterventionKind::Critique => "critique",
            InterventionKind::Explanation => "explanation",
        }
    }
}

/// An AI-produced guidance record. `level` never exceeds the owning
/// session's policy cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    pub id: String,
    pub session_id: String,
    /// The run that prompted this intervention, if any.
    #[serde(default)]
    pub run_id: Option<String>,
    pub intent: InterventionIntent,
    pub level: Level,
    pub kind: InterventionKind,
    pub content: String,
    /// Required for L5; journaled verbatim and never re-checked.
    #[serde(default)]
    pub justification: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ladder_orders() {
        assert!(Level::L0 < Level::L1);
        assert!(Level::L4 < Level::L5);
        assert_eq!(Level::L5.bump(), Level::L5);
        assert_eq!(Level::L2.bump(), Level::L3);
    }

    #[test]
    fn level_roundtrips_u8() {
        for n in 0..=5u8 {
            assert_eq!(Level::from_u8(n).unwrap().as_u8(), n);
        }
        assert!(Level::from_u8(6).is_none());
    }

    #[test]
    fn level_serializes_as_name() {
        assert_eq!(serde_json::to_string(&Level::L3).unwrap(), r#""L3""#);
        let back: Level = serde_json::from_str(r#""L5""#).unwrap();
        assert_eq!(back, Level::L5);
    }

    #[test]
    fn policy_defaults() {
        let p = LearningPolicy::default();
        assert_eq!(p.max_level, Level::L3);
        assert_eq!(p.cooldown_seconds, 60);
        assert!(!p.patching_enabled);
        assert_eq!(p.track, "standard");
    }

    #[test]
    fn policy_defaults_from_empty_json() {
        let p: LearningPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(p, LearningPolicy::default());
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
    }

    #[test]
    fn run_result_green_respects_requested_phases() {
        let result = RunResult {
            format_ok: false,
            build_ok: true,
            test_ok: true,
            ..Default::default()
        };
        // Format was not requested, so its failure does not matter.
        let phases = RunPhases {
            format: false,
            build: true,
            test: true,
        };
        assert!(result.is_green(phases));
        assert!(!result.is_green(RunPhases::default()));
    }

    #[test]
    fn run_phases_default_all_on() {
        let p: RunPhases = serde_json::from_str("{}").unwrap();
        assert!(p.format && p.build && p.test);
    }
}
