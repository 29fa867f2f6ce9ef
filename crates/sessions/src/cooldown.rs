//! The cooldown gate as a pure predicate.
//!
//! High-intensity interventions (L3+) must be spaced by the session's
//! cooldown; L0–L2 always pass. Keeping this a pure function over
//! `(now, last, cooldown, level)` makes the gate trivially testable.

use chrono::{DateTime, Utc};

use pf_domain::session::Level;

/// Lowest level subject to the cooldown.
pub const COOLDOWN_FLOOR: Level = Level::L3;

/// Check the cooldown gate.
///
/// Returns `None` when the intervention may proceed, or
/// `Some(remaining_seconds)` when the gate is closed.
pub fn cooldown_remaining(
    now: DateTime<Utc>,
    last_intervention_at: Option<DateTime<Utc>>,
    cooldown_seconds: u64,
    level: Level,
) -> Option<u64> {
    if level < COOLDOWN_FLOOR || cooldown_seconds == 0 {
        return None;
    }
    let last = last_intervention_at?;

    let elapsed = now.signed_duration_since(last).num_seconds().max(0) as u64;
    if elapsed >= cooldown_seconds {
        None
    } else {
        Some(cooldown_seconds - elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn low_levels_bypass() {
        for level in [Level::L0, Level::L1, Level::L2] {
            assert_eq!(cooldown_remaining(t0(), Some(t0()), 60, level), None);
        }
    }

    #[test]
    fn first_intervention_always_passes() {
        assert_eq!(cooldown_remaining(t0(), None, 60, Level::L5), None);
    }

    #[test]
    fn gate_closed_inside_window() {
        let last = t0();
        let now = last + Duration::seconds(5);
        assert_eq!(cooldown_remaining(now, Some(last), 60, Level::L3), Some(55));
    }

    #[test]
    fn gate_opens_exactly_at_boundary() {
        let last = t0();
        let now = last + Duration::seconds(60);
        assert_eq!(cooldown_remaining(now, Some(last), 60, Level::L3), None);
    }

    #[test]
    fn zero_cooldown_disables_gate() {
        assert_eq!(cooldown_remaining(t0(), Some(t0()), 0, Level::L5), None);
    }

    #[test]
    fn clock_skew_clamps_to_full_window() {
        // last timestamp in the "future" must not underflow.
        let last = t0() + Duration::seconds(30);
        assert_eq!(
            cooldown_remaining(t0(), Some(last), 60, Level::L4),
            Some(60)
        );
    }
}
