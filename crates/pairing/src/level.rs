//! Intervention level selection.
//!
//! The recommended level is the minimum of three clamps: the policy
//! cap, the intent's characteristic level, and the adaptive ceiling
//! from the learner's skill assessment. Stuck is the adaptive intent
//! and supplies its own escalation, so only the policy cap applies to
//! it: it starts at L2 on a cold session, at L3 once help was already
//! delivered, and climbs one step per recent failed run.

use chrono::{DateTime, Utc};

use pf_domain::session::{
    InterventionIntent, InterventionKind, LearningPolicy, Level, Run,
};
use pf_profile::SkillAssessment;

/// How far back a failed run still counts toward stuck escalation.
const STUCK_WINDOW_MINUTES: i64 = 10;
/// Where stuck escalation starts on a session with no prior help.
const STUCK_BASE: Level = Level::L2;
/// Where it starts once an intervention was already delivered.
const STUCK_REPEAT_BASE: Level = Level::L3;

/// Count the session's recent runs whose tests failed.
pub fn recent_failed_runs(runs: &[Run], now: DateTime<Utc>) -> u32 {
    runs.iter()
        .filter(|run| {
            !run.result.test_ok
                && now.signed_duration_since(run.created_at).num_minutes() < STUCK_WINDOW_MINUTES
        })
        .count() as u32
}

fn stuck_level(policy: &LearningPolicy, failed_runs: u32, prior_interventions: u64) -> Level {
    let mut level = if prior_interventions > 0 {
        STUCK_REPEAT_BASE
    } else {
        STUCK_BASE
    };
    for _ in 0..failed_runs {
        if level >= policy.max_level {
            break;
        }
        level = level.bump();
    }
    level.min(policy.max_level)
}

/// Select the level for an intervention.
pub fn select_level(
    intent: InterventionIntent,
    policy: &LearningPolicy,
    assessment: &SkillAssessment,
    failed_runs: u32,
    prior_interventions: u64,
) -> Level {
    match intent {
        // Stuck is already adaptive; only the policy cap applies.
        InterventionIntent::Stuck => stuck_level(policy, failed_runs, prior_interventions),
        InterventionIntent::Hint | InterventionIntent::Next => policy
            .max_level
            .min(Level::L1)
            .min(assessment.recommended_level),
        InterventionIntent::Review | InterventionIntent::Explain => policy
            .max_level
            .min(Level::L2)
            .min(assessment.recommended_level),
    }
}

/// Pick the intervention type for an (intent, level) pair.
pub fn kind_for(intent: InterventionIntent, level: Level) -> InterventionKind {
    match intent {
        InterventionIntent::Review => InterventionKind::Critique,
        InterventionIntent::Explain => InterventionKind::Explanation,
        InterventionIntent::Hint | InterventionIntent::Next | InterventionIntent::Stuck => {
            match level {
                Level::L0 => InterventionKind::Question,
                Level::L1 | Level::L2 => InterventionKind::Hint,
                _ => InterventionKind::Nudge,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pf_domain::session::{CodeSnapshot, RunPhases, RunResult};
    use pf_profile::{GrowthRate, LearningProfile};

    fn assessment_with_ceiling(level: Level) -> SkillAssessment {
        SkillAssessment {
            overall_level: 0.5,
            hint_dependency: 0.1,
            growth_rate: GrowthRate::Steady,
            strongest_topics: vec![],
            weakest_topics: vec![],
            recommended_level: level,
        }
    }

    fn policy(max: Level) -> LearningPolicy {
        LearningPolicy {
            max_level: max,
            ..Default::default()
        }
    }

    fn failed_run(minutes_ago: i64) -> Run {
        Run {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "s".into(),
            code: CodeSnapshot::new(),
            phases: RunPhases::default(),
            result: RunResult {
                format_ok: true,
                build_ok: true,
                test_ok: false,
                ..Default::default()
            },
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn hint_lands_at_l1_under_generous_clamps() {
        let level = select_level(
            InterventionIntent::Hint,
            &policy(Level::L3),
            &assessment_with_ceiling(Level::L4),
            0,
            0,
        );
        assert_eq!(level, Level::L1);
    }

    #[test]
    fn policy_cap_wins_over_everything() {
        let level = select_level(
            InterventionIntent::Stuck,
            &policy(Level::L1),
            &assessment_with_ceiling(Level::L5),
            7,
            3,
        );
        assert_eq!(level, Level::L1);
    }

    #[test]
    fn adaptive_ceiling_clamps_weak_learners() {
        let level = select_level(
            InterventionIntent::Explain,
            &policy(Level::L5),
            &assessment_with_ceiling(Level::L1),
            0,
            0,
        );
        assert_eq!(level, Level::L1);
    }

    #[test]
    fn cold_stuck_starts_at_l2_and_escalates_per_failed_run() {
        let assessment = assessment_with_ceiling(Level::L5);
        let p = policy(Level::L5);
        assert_eq!(
            select_level(InterventionIntent::Stuck, &p, &assessment, 0, 0),
            Level::L2
        );
        assert_eq!(
            select_level(InterventionIntent::Stuck, &p, &assessment, 1, 0),
            Level::L3
        );
        assert_eq!(
            select_level(InterventionIntent::Stuck, &p, &assessment, 2, 0),
            Level::L4
        );
        // Escalation saturates at the policy cap.
        assert_eq!(
            select_level(InterventionIntent::Stuck, &p, &assessment, 9, 0),
            Level::L5
        );
    }

    #[test]
    fn stuck_after_prior_help_starts_at_l3() {
        let level = select_level(
            InterventionIntent::Stuck,
            &policy(Level::L3),
            &assessment_with_ceiling(Level::L2),
            0,
            1,
        );
        // The adaptive ceiling does not apply to the adaptive intent.
        assert_eq!(level, Level::L3);
    }

    #[test]
    fn stuck_escalation_bounded_by_policy() {
        let level = select_level(
            InterventionIntent::Stuck,
            &policy(Level::L3),
            &assessment_with_ceiling(Level::L5),
            6,
            0,
        );
        assert_eq!(level, Level::L3);
    }

    #[test]
    fn recent_failed_runs_respects_window() {
        let runs = vec![failed_run(2), failed_run(5), failed_run(30)];
        assert_eq!(recent_failed_runs(&runs, Utc::now()), 2);
    }

    #[test]
    fn green_runs_do_not_escalate() {
        let mut run = failed_run(1);
        run.result.test_ok = true;
        assert_eq!(recent_failed_runs(&[run], Utc::now()), 0);
    }

    #[test]
    fn kinds_match_intent_and_level() {
        assert_eq!(
            kind_for(InterventionIntent::Review, Level::L2),
            InterventionKind::Critique
        );
        assert_eq!(
            kind_for(InterventionIntent::Explain, Level::L2),
            InterventionKind::Explanation
        );
        assert_eq!(
            kind_for(InterventionIntent::Hint, Level::L0),
            InterventionKind::Question
        );
        assert_eq!(
            kind_for(InterventionIntent::Hint, Level::L1),
            InterventionKind::Hint
        );
        assert_eq!(
            kind_for(InterventionIntent::Stuck, Level::L4),
            InterventionKind::Nudge
        );
    }

    #[test]
    fn fresh_profile_assessment_keeps_hints_gentle() {
        // End-to-end sanity: default profile → ceiling L2 → hint at L1.
        let assessment = pf_profile::assess(&LearningProfile::new("default"));
        let level = select_level(
            InterventionIntent::Hint,
            &policy(Level::L3),
            &assessment,
            0,
            0,
        );
        assert!(level <= Level::L2);
    }
}
