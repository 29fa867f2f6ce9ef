//! Skill assessment for the pairing engine.
//!
//! A constant-time reduction of the profile into the handful of signals
//! level selection needs: overall skill, hint dependency, growth rate,
//! and a recommended intervention ceiling.

use serde::Serialize;

use pf_domain::session::Level;

use crate::model::LearningProfile;

/// How many attempts count as "many" for the slow/plateaued rules.
const MANY_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthRate {
    Rapid,
    Steady,
    Slow,
    Plateaued,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillAssessment {
    /// Mean topic skill, [0, 1].
    pub overall_level: f64,
    /// `min(1, hints / runs)`, [0, 1].
    pub hint_dependency: f64,
    pub growth_rate: GrowthRate,
    /// Up to three topics, best first.
    pub strongest_topics: Vec<String>,
    /// Up to three topics, weakest first.
    pub weakest_topics: Vec<String>,
    /// Adaptive ceiling for the pairing engine.
    pub recommended_level: Level,
}

/// Reduce a profile snapshot to an assessment.
pub fn assess(profile: &LearningProfile) -> SkillAssessment {
    let overall_level = profile.overall_level();
    let hint_dependency = profile.hint_dependency();

    let mut by_level: Vec<(&String, f64)> = profile
        .topic_skills
        .iter()
        .map(|(topic, skill)| (topic, skill.level))
        .collect();
    by_level.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let strongest_topics: Vec<String> = by_level
        .iter()
        .take(3)
        .map(|(topic, _)| (*topic).clone())
        .collect();
    let weakest_topics: Vec<String> = by_level
        .iter()
        .rev()
        .take(3)
        .map(|(topic, _)| (*topic).clone())
        .collect();

    SkillAssessment {
        overall_level,
        hint_dependency,
        growth_rate: growth_rate(profile, overall_level, hint_dependency),
        strongest_topics,
        weakest_topics,
        recommended_level: recommended_level(overall_level, hint_dependency),
    }
}

fn growth_rate(profile: &LearningProfile, overall: f64, dependency: f64) -> GrowthRate {
    let completed: Vec<bool> = profile
        .exercise_history
        .iter()
        .filter(|a| a.completed_at.is_some())
        .map(|a| a.success)
        .collect();

    // Plateaued: plenty of finished exercises, none of the recent ones
    // moved the skill needle.
    if completed.len() >= MANY_ATTEMPTS {
        let recent = &completed[completed.len() - MANY_ATTEMPTS..];
        if recent.iter().all(|success| !success) {
            return GrowthRate::Plateaued;
        }
    }

    if overall >= 0.8 && dependency <= 0.2 {
        return GrowthRate::Rapid;
    }
    if dependency >= 0.6 || (overall <= 0.25 && profile.exercise_history.len() >= MANY_ATTEMPTS) {
        return GrowthRate::Slow;
    }
    GrowthRate::Steady
}

/// The adaptive ceiling: stronger signals permit more intense
/// interventions; heavy hint dependence pulls the ceiling down a step.
fn recommended_level(overall: f64, dependency: f64) -> Level {
    let base = if overall < 0.25 {
        Level::L2
    } else if overall < 0.5 {
        Level::L3
    } else if overall < 0.75 {
        Level::L4
    } else {
        Level::L5
    };

    if dependency >= 0.6 && base > Level::L1 {
        Level::from_u8(base.as_u8() - 1).unwrap_or(Level::L1)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExerciseAttempt;
    use chrono::Utc;

    fn profile() -> LearningProfile {
        LearningProfile::new("default")
    }

    fn with_attempts(profile: &mut LearningProfile, n: usize, success: bool) {
        for i in 0..n {
            profile.push_attempt(ExerciseAttempt {
                session_id: format!("s{i}"),
                exercise_id: None,
                topic: "general".into(),
                started_at: Utc::now(),
                completed_at: Some(Utc::now()),
                success,
            });
        }
    }

    #[test]
    fn fresh_profile_is_steady_at_l2() {
        let assessment = assess(&profile());
        assert_eq!(assessment.growth_rate, GrowthRate::Steady);
        assert_eq!(assessment.recommended_level, Level::L2);
        assert_eq!(assessment.overall_level, 0.0);
    }

    #[test]
    fn rapid_when_strong_and_independent() {
        let mut p = profile();
        let now = Utc::now();
        for _ in 0..20 {
            p.bump_topic("go/basics", 0.05, now);
        }
        p.total_runs = 10;
        p.hint_requests = 1;
        let assessment = assess(&p);
        assert_eq!(assessment.growth_rate, GrowthRate::Rapid);
        assert_eq!(assessment.recommended_level, Level::L5);
    }

    #[test]
    fn slow_when_hint_dependent() {
        let mut p = profile();
        p.total_runs = 10;
        p.hint_requests = 8;
        let assessment = assess(&p);
        assert_eq!(assessment.growth_rate, GrowthRate::Slow);
    }

    #[test]
    fn slow_when_weak_after_many_attempts() {
        let mut p = profile();
        with_attempts(&mut p, MANY_ATTEMPTS, true);
        // overall stays 0 (no topic skills), attempts are many.
        let assessment = assess(&p);
        assert_eq!(assessment.growth_rate, GrowthRate::Slow);
    }

    #[test]
    fn plateaued_beats_other_classifications() {
        let mut p = profile();
        with_attempts(&mut p, MANY_ATTEMPTS, false);
        p.total_runs = 10;
        p.hint_requests = 8; // would otherwise be slow
        let assessment = assess(&p);
        assert_eq!(assessment.growth_rate, GrowthRate::Plateaued);
    }

    #[test]
    fn dependency_pulls_ceiling_down() {
        let mut p = profile();
        let now = Utc::now();
        for _ in 0..12 {
            p.bump_topic("go/basics", 0.05, now); // 0.6
        }
        p.total_runs = 10;
        p.hint_requests = 7;
        let assessment = assess(&p);
        // base L4 for overall 0.6, minus one for dependency.
        assert_eq!(assessment.recommended_level, Level::L3);
    }

    #[test]
    fn topic_extremes_listed() {
        let mut p = profile();
        let now = Utc::now();
        for (topic, bumps) in [("a", 1), ("b", 5), ("c", 10), ("d", 15)] {
            for _ in 0..bumps {
                p.bump_topic(topic, 0.05, now);
            }
        }
        let assessment = assess(&p);
        assert_eq!(assessment.strongest_topics[0], "d");
        assert_eq!(assessment.weakest_topics[0], "a");
        assert_eq!(assessment.strongest_topics.len(), 3);
        assert_eq!(assessment.weakest_topics.len(), 3);
    }
}
