//! Operational-neglect risk scoring.
//!
//! A single 0–100 early-warning signal for human operators: how likely is
//! this lead to stall or be lost because nobody is acting on it. Five
//! independent time-decay rules fire additively and the sum is clamped to
//! 100. A missing timestamp means the rule does not fire — absence is "no
//! age", never "infinite age".

use chrono::{DateTime, Utc};

const MS_PER_DAY: f64 = 86_400_000.0;

/// +30 when nothing on the lead has changed for over a week.
const INACTIVITY_POINTS: u32 = 30;
const INACTIVITY_DAYS: f64 = 7.0;

/// +20 when a high-probability lead is still sitting in qualification.
const STUCK_EARLY_POINTS: u32 = 20;
const STUCK_EARLY_PROBABILITY: f64 = 0.6;

/// +20 when the lead is assigned but the operator has not acted in 5 days.
const IDLE_ASSIGNMENT_POINTS: u32 = 20;
const IDLE_ASSIGNMENT_DAYS: f64 = 5.0;

/// +30 when an invitation went out over a week ago with no follow-through.
const UNANSWERED_INVITE_POINTS: u32 = 30;
const UNANSWERED_INVITE_DAYS: f64 = 7.0;

/// +20 when a human escalated priority but the deal has not moved stage.
const STALE_OVERRIDE_POINTS: u32 = 20;
const STALE_OVERRIDE_DAYS: f64 = 7.0;

/// Snapshot of the lead fields the risk rules look at. Everything is
/// optional; a rule whose inputs are absent simply does not fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskInputs<'a> {
    pub stage: Option<&'a str>,
    /// Win probability as a 0.0–1.0 fraction.
    pub probability: Option<f64>,
    pub assigned_to: Option<&'a str>,
    pub invited_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub priority_overridden: bool,
    pub stage_entered_at: Option<DateTime<Utc>>,
}

/// Fractional days between `ts` and `now`, via millisecond arithmetic.
/// Not calendar-day boundaries: 6.9 days old is under a 7-day threshold.
fn days_since(now: DateTime<Utc>, ts: DateTime<Utc>) -> f64 {
    (now - ts).num_milliseconds() as f64 / MS_PER_DAY
}

fn older_than(now: DateTime<Utc>, ts: Option<DateTime<Utc>>, days: f64) -> bool {
    match ts {
        Some(ts) => days_since(now, ts) > days,
        None => false,
    }
}

/// Compute the risk score for a lead at `now`. Pure; callers pass the clock.
pub fn risk_score(inputs: &RiskInputs, now: DateTime<Utc>) -> u8 {
    let mut points: u32 = 0;

    // General inactivity decay
    if older_than(now, inputs.updated_at, INACTIVITY_DAYS) {
        points += INACTIVITY_POINTS;
    }

    // High intent stuck in the early stage
    if inputs.stage == Some("qualification")
        && inputs.probability.is_some_and(|p| p > STUCK_EARLY_PROBABILITY)
    {
        points += STUCK_EARLY_POINTS;
    }

    // Assigned but the operator has not acted
    if inputs.assigned_to.is_some()
        && older_than(now, inputs.assigned_at, IDLE_ASSIGNMENT_DAYS)
    {
        points += IDLE_ASSIGNMENT_POINTS;
    }

    // Invitation sent, no follow-through
    if inputs.stage == Some("invited")
        && older_than(now, inputs.invited_at, UNANSWERED_INVITE_DAYS)
    {
        points += UNANSWERED_INVITE_POINTS;
    }

    // Priority escalated by hand but the deal has not progressed
    if inputs.priority_overridden
        && older_than(now, inputs.stage_entered_at, STALE_OVERRIDE_DAYS)
    {
        points += STALE_OVERRIDE_POINTS;
    }

    points.min(100) as u8
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-06-15T12:00:00Z".parse().expect("fixed clock")
    }

    fn days_ago(d: i64) -> Option<DateTime<Utc>> {
        Some(now() - Duration::days(d))
    }

    #[test]
    fn test_all_absent_is_zero() {
        let score = risk_score(&RiskInputs::default(), now());
        assert_eq!(score, 0);
    }

    #[test]
    fn test_scenario_high_intent_stuck_in_qualification() {
        // stage=qualification, probability=0.8, updated 3 days ago, nothing
        // else set: only the stuck-early rule fires.
        let inputs = RiskInputs {
            stage: Some("qualification"),
            probability: Some(0.8),
            updated_at: days_ago(3),
            ..Default::default()
        };
        assert_eq!(risk_score(&inputs, now()), 20);
    }

    #[test]
    fn test_scenario_unanswered_invitation() {
        // invited 10 days ago, untouched for 10 days, unassigned: inactivity
        // (30) + unanswered invite (30).
        let inputs = RiskInputs {
            stage: Some("invited"),
            invited_at: days_ago(10),
            updated_at: days_ago(10),
            ..Default::default()
        };
        assert_eq!(risk_score(&inputs, now()), 60);
    }

    #[test]
    fn test_scenario_fresh_new_lead() {
        let inputs = RiskInputs {
            stage: Some("new"),
            ..Default::default()
        };
        assert_eq!(risk_score(&inputs, now()), 0);
    }

    #[test]
    fn test_maximum_is_clamped_to_100() {
        // Everything that can fire together on an invited lead: inactivity
        // (30) + idle assignment (20) + unanswered invite (30) + stale
        // override (20) = 100 exactly.
        let inputs = RiskInputs {
            stage: Some("invited"),
            probability: Some(0.65),
            assigned_to: Some("op-7"),
            invited_at: days_ago(12),
            updated_at: days_ago(12),
            assigned_at: days_ago(9),
            priority_overridden: true,
            stage_entered_at: days_ago(12),
        };
        let score = risk_score(&inputs, now());
        assert_eq!(score, 100);
        assert!(score <= 100);
    }

    #[test]
    fn test_monotone_across_inactivity_boundary() {
        let fresh = RiskInputs {
            updated_at: days_ago(6),
            ..Default::default()
        };
        let stale = RiskInputs {
            updated_at: days_ago(8),
            ..Default::default()
        };
        assert!(risk_score(&stale, now()) >= risk_score(&fresh, now()));
        assert_eq!(risk_score(&fresh, now()), 0);
        assert_eq!(risk_score(&stale, now()), 30);
    }

    #[test]
    fn test_fractional_days_not_calendar_days() {
        // 6 days 23 hours old is NOT "more than 7 days"
        let almost = RiskInputs {
            updated_at: Some(now() - Duration::hours(7 * 24 - 1)),
            ..Default::default()
        };
        assert_eq!(risk_score(&almost, now()), 0);

        let past = RiskInputs {
            updated_at: Some(now() - Duration::hours(7 * 24 + 1)),
            ..Default::default()
        };
        assert_eq!(risk_score(&past, now()), 30);
    }

    #[test]
    fn test_assignment_rule_needs_both_fields() {
        // assigned_at old but assigned_to missing: rule does not fire
        let unassigned = RiskInputs {
            assigned_at: days_ago(30),
            ..Default::default()
        };
        assert_eq!(risk_score(&unassigned, now()), 0);

        // assigned_to set but assigned_at missing: rule does not fire
        let no_timestamp = RiskInputs {
            assigned_to: Some("op-1"),
            ..Default::default()
        };
        assert_eq!(risk_score(&no_timestamp, now()), 0);

        let both = RiskInputs {
            assigned_to: Some("op-1"),
            assigned_at: days_ago(6),
            ..Default::default()
        };
        assert_eq!(risk_score(&both, now()), 20);
    }

    #[test]
    fn test_stuck_early_requires_probability_above_threshold() {
        let at_threshold = RiskInputs {
            stage: Some("qualification"),
            probability: Some(0.6),
            ..Default::default()
        };
        // Strictly greater than 0.6
        assert_eq!(risk_score(&at_threshold, now()), 0);

        let above = RiskInputs {
            stage: Some("qualification"),
            probability: Some(0.61),
            ..Default::default()
        };
        assert_eq!(risk_score(&above, now()), 20);
    }

    #[test]
    fn test_idempotent() {
        let inputs = RiskInputs {
            stage: Some("invited"),
            invited_at: days_ago(10),
            updated_at: days_ago(10),
            ..Default::default()
        };
        let t = now();
        assert_eq!(risk_score(&inputs, t), risk_score(&inputs, t));
    }

    #[test]
    fn test_terminal_stages_still_accrue_inactivity() {
        // Known product oddity, preserved: a won deal with a stale
        // updated_at still scores inactivity points.
        let inputs = RiskInputs {
            stage: Some("won"),
            updated_at: days_ago(30),
            ..Default::default()
        };
        assert_eq!(risk_score(&inputs, now()), 30);
    }
}
