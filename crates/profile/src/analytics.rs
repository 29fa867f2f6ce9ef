//! Read-only analytics over a profile snapshot.
//!
//! Everything here is derived - no state of its own. Progression walks
//! the exercise-history ring: each successful attempt adds the standard
//! skill gain to a running per-topic level, reduced to one value per
//! day and truncated to the last 30 days.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::assessment::{assess, SkillAssessment};
use crate::model::{LearningProfile, TrendPoint};

/// Progression window, days.
const PROGRESSION_DAYS: i64 = 30;
/// Skill gain per successful attempt when replaying history.
const REPLAY_GAIN: f64 = 0.05;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct Overview {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub exercises_completed: u64,
    pub total_runs: u64,
    pub hint_requests: u64,
    pub hint_dependency: f64,
    pub time_to_green_ema_ms: f64,
    pub overall_level: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressionPoint {
    pub date: NaiveDate,
    pub level: f64,
}

#[derive(Debug, Serialize)]
pub struct TopicBreakdown {
    pub topic: String,
    pub level: f64,
    pub attempts: u64,
    pub confidence: f64,
    pub progression: Vec<ProgressionPoint>,
}

#[derive(Debug, Serialize)]
pub struct SkillsReport {
    pub assessment: SkillAssessment,
    pub topics: Vec<TopicBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct ErrorPattern {
    pub signature: String,
    pub count: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn overview(profile: &LearningProfile) -> Overview {
    Overview {
        sessions_started: profile.sessions_started,
        sessions_completed: profile.sessions_completed,
        exercises_completed: profile.exercises_completed,
        total_runs: profile.total_runs,
        hint_requests: profile.hint_requests,
        hint_dependency: profile.hint_dependency(),
        time_to_green_ema_ms: profile.time_to_green_ema_ms,
        overall_level: profile.overall_level(),
    }
}

pub fn skills(profile: &LearningProfile) -> SkillsReport {
    let progressions = progression_by_topic(profile);
    let topics = profile
        .topic_skills
        .iter()
        .map(|(topic, skill)| TopicBreakdown {
            topic: topic.clone(),
            level: skill.level,
            attempts: skill.attempts,
            confidence: skill.confidence,
            progression: progressions.get(topic).cloned().unwrap_or_default(),
        })
        .collect();

    SkillsReport {
        assessment: assess(profile),
        topics,
    }
}

pub fn top_errors(profile: &LearningProfile, limit: usize) -> Vec<ErrorPattern> {
    let mut patterns: Vec<ErrorPattern> = profile
        .error_patterns
        .iter()
        .map(|(signature, count)| ErrorPattern {
            signature: signature.clone(),
            count: *count,
        })
        .collect();
    patterns.sort_by(|a, b| b.count.cmp(&a.count).then(a.signature.cmp(&b.signature)));
    patterns.truncate(limit);
    patterns
}

pub fn trend(profile: &LearningProfile) -> Vec<TrendPoint> {
    profile.hint_trend.iter().cloned().collect()
}

/// Replay the history ring into per-topic, per-day level series.
fn progression_by_topic(
    profile: &LearningProfile,
) -> BTreeMap<String, Vec<ProgressionPoint>> {
    let mut running: BTreeMap<String, f64> = BTreeMap::new();
    // topic → date → level at end of that day
    let mut daily: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

    for attempt in &profile.exercise_history {
        if !attempt.success {
            continue;
        }
        let Some(completed_at) = attempt.completed_at else {
            continue;
        };
        let level = running.entry(attempt.topic.clone()).or_insert(0.0);
        *level = (*level + REPLAY_GAIN).min(1.0);
        daily
            .entry(attempt.topic.clone())
            .or_default()
            .insert(completed_at.date_naive(), *level);
    }

    let cutoff = (Utc::now() - chrono::Duration::days(PROGRESSION_DAYS)).date_naive();
    daily
        .into_iter()
        .map(|(topic, days)| {
            let series = days
                .into_iter()
                .filter(|(date, _)| *date >= cutoff)
                .map(|(date, level)| ProgressionPoint { date, level })
                .collect();
            (topic, series)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExerciseAttempt;
    use chrono::Duration;

    fn attempt(topic: &str, days_ago: i64, success: bool) -> ExerciseAttempt {
        let at = Utc::now() - Duration::days(days_ago);
        ExerciseAttempt {
            session_id: format!("s-{topic}-{days_ago}"),
            exercise_id: None,
            topic: topic.into(),
            started_at: at,
            completed_at: Some(at),
            success,
        }
    }

    #[test]
    fn overview_reflects_counters() {
        let mut p = LearningProfile::new("default");
        p.total_runs = 10;
        p.hint_requests = 4;
        let o = overview(&p);
        assert_eq!(o.total_runs, 10);
        assert!((o.hint_dependency - 0.4).abs() < 1e-9);
    }

    #[test]
    fn progression_accumulates_per_success() {
        let mut p = LearningProfile::new("default");
        p.push_attempt(attempt("go/basics", 2, true));
        p.push_attempt(attempt("go/basics", 1, true));
        p.push_attempt(attempt("go/basics", 1, false)); // ignored

        let series = &progression_by_topic(&p)["go/basics"];
        assert_eq!(series.len(), 2);
        assert!((series[0].level - 0.05).abs() < 1e-9);
        assert!((series[1].level - 0.10).abs() < 1e-9);
    }

    #[test]
    fn progression_truncates_to_thirty_days() {
        let mut p = LearningProfile::new("default");
        p.push_attempt(attempt("go/basics", 45, true));
        p.push_attempt(attempt("go/basics", 3, true));

        let series = &progression_by_topic(&p)["go/basics"];
        assert_eq!(series.len(), 1);
        // The old success still contributed to the running level.
        assert!((series[0].level - 0.10).abs() < 1e-9);
    }

    #[test]
    fn top_errors_sorted_and_limited() {
        let mut p = LearningProfile::new("default");
        p.error_patterns.insert("undefined: _".into(), 7);
        p.error_patterns.insert("panic".into(), 2);
        p.error_patterns.insert("type mismatch".into(), 5);

        let top = top_errors(&p, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].signature, "undefined: _");
        assert_eq!(top[1].signature, "type mismatch");
    }

    #[test]
    fn skills_report_includes_all_topics() {
        let mut p = LearningProfile::new("default");
        p.bump_topic("go/basics", 0.1, Utc::now());
        p.bump_topic("python/strings", 0.2, Utc::now());
        let report = skills(&p);
        assert_eq!(report.topics.len(), 2);
    }
}
