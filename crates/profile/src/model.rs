//! The learning profile aggregate.
//!
//! A durable, session-independent summary of the learner's history.
//! Rings are bounded (FIFO eviction) so the profile stays constant-size
//! no matter how long the history grows.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exercise-history ring capacity.
pub const HISTORY_CAP: usize = 100;
/// Hint-dependency trend ring capacity.
pub const TREND_CAP: usize = 50;
/// Smoothing factor for the time-to-green moving average.
pub const TIME_TO_GREEN_ALPHA: f64 = 0.1;

/// Skill estimate for one topic key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSkill {
    /// Clamped to [0, 1].
    pub level: f64,
    pub attempts: u64,
    pub last_seen: DateTime<Utc>,
    /// Grows with evidence; clamped to [0, 1].
    pub confidence: f64,
}

/// One entry in the exercise-history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseAttempt {
    pub session_id: String,
    #[serde(default)]
    pub exercise_id: Option<String>,
    pub topic: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: bool,
}

/// One hint-dependency sample, taken at a 10-run boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    /// `min(1, hint_requests / total_runs)` at sample time.
    pub dependency: f64,
    pub window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningProfile {
    pub id: String,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub total_runs: u64,
    pub hint_requests: u64,
    pub exercises_completed: u64,
    pub topic_skills: BTreeMap<String, TopicSkill>,
    /// Normalized error signature → occurrence count.
    pub error_patterns: BTreeMap<String, u64>,
    pub exercise_history: VecDeque<ExerciseAttempt>,
    pub hint_trend: VecDeque<TrendPoint>,
    /// Exponential moving average over green-run durations, ms.
    pub time_to_green_ema_ms: f64,
    pub updated_at: DateTime<Utc>,
}

impl LearningProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sessions_started: 0,
            sessions_completed: 0,
            total_runs: 0,
            hint_requests: 0,
            exercises_completed: 0,
            topic_skills: BTreeMap::new(),
            error_patterns: BTreeMap::new(),
            exercise_history: VecDeque::new(),
            hint_trend: VecDeque::new(),
            time_to_green_ema_ms: 0.0,
            updated_at: Utc::now(),
        }
    }

    /// `min(1, hint_requests / total_runs)`; 0 before the first run.
    pub fn hint_dependency(&self) -> f64 {
        if self.total_runs == 0 {
            return 0.0;
        }
        (self.hint_requests as f64 / self.total_runs as f64).min(1.0)
    }

    /// Mean topic level; 0 with no evidence yet.
    pub fn overall_level(&self) -> f64 {
        if self.topic_skills.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.topic_skills.values().map(|s| s.level).sum();
        sum / self.topic_skills.len() as f64
    }

    /// Adjust a topic's skill level by `delta`, clamped to [0, 1].
    pub fn bump_topic(&mut self, topic: &str, delta: f64, at: DateTime<Utc>) {
        let skill = self
            .topic_skills
            .entry(topic.to_string())
            .or_insert(TopicSkill {
                level: 0.0,
                attempts: 0,
                last_seen: at,
                confidence: 0.0,
            });
        skill.level = (skill.level + delta).clamp(0.0, 1.0);
        skill.last_seen = at;
        skill.confidence = (skill.confidence + 0.1).clamp(0.0, 1.0);
    }

    pub fn push_attempt(&mut self, attempt: ExerciseAttempt) {
        self.exercise_history.push_back(attempt);
        while self.exercise_history.len() > HISTORY_CAP {
            self.exercise_history.pop_front();
        }
    }

    pub fn push_trend_point(&mut self, point: TrendPoint) {
        self.hint_trend.push_back(point);
        while self.hint_trend.len() > TREND_CAP {
            self.hint_trend.pop_front();
        }
    }
}
