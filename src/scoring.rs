//! Stage-driven pipeline scoring.
//!
//! Three small pure functions: the stage→probability lookup, the deal
//! probability calculator, and the probability-weighted forecast. All three
//! are total — an unrecognized stage yields zero, never an error, because
//! rows written by older back-office builds can carry labels this build has
//! never heard of.

/// Default win probability (percent) for each pipeline stage.
pub fn stage_probability(stage: &str) -> u8 {
    match stage {
        "new" => 10,
        "qualification" => 25,
        "intent" => 45,
        "invited" => 65,
        "negotiation" => 85,
        "won" => 100,
        "lost" => 0,
        _ => 0,
    }
}

/// The seven stages the pipeline knows about, in funnel order.
pub const KNOWN_STAGES: [&str; 7] = [
    "new",
    "qualification",
    "intent",
    "invited",
    "negotiation",
    "won",
    "lost",
];

/// Inputs to the deal probability calculator.
///
/// Priority and the override flag are part of the input shape but do not
/// influence the result — probability is stage-only. Do not add a
/// priority-weighting term here without a product decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbabilityInputs<'a> {
    pub stage: &'a str,
    pub priority: Option<&'a str>,
    pub priority_overridden: bool,
}

/// Win probability for a lead, as an integer percentage 0–100.
/// Callers divide by 100 before storing.
pub fn deal_probability(inputs: &ProbabilityInputs) -> u8 {
    stage_probability(inputs.stage)
}

/// Probability-weighted monetary value of a deal, for pipeline roll-ups.
/// Unknown stage yields 0, not an error.
pub fn forecast(deal_value: f64, stage: &str) -> f64 {
    deal_value * f64::from(stage_probability(stage)) / 100.0
}

/// Derive a priority tag from a qualification score.
///
/// Applied only while no human override is recorded.
pub fn priority_from_score(score: i64) -> &'static str {
    if score >= 70 {
        "HOT"
    } else if score >= 40 {
        "WARM"
    } else {
        "COLD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_probability_fixed_values() {
        assert_eq!(stage_probability("new"), 10);
        assert_eq!(stage_probability("qualification"), 25);
        assert_eq!(stage_probability("intent"), 45);
        assert_eq!(stage_probability("invited"), 65);
        assert_eq!(stage_probability("negotiation"), 85);
        assert_eq!(stage_probability("won"), 100);
        assert_eq!(stage_probability("lost"), 0);
    }

    #[test]
    fn test_stage_probability_unknown_is_zero() {
        assert_eq!(stage_probability(""), 0);
        assert_eq!(stage_probability("archived"), 0);
        assert_eq!(stage_probability("NEW"), 0); // case-sensitive on purpose
    }

    #[test]
    fn test_deal_probability_ignores_priority() {
        let base = ProbabilityInputs {
            stage: "intent",
            priority: None,
            priority_overridden: false,
        };
        let hot_overridden = ProbabilityInputs {
            stage: "intent",
            priority: Some("HOT"),
            priority_overridden: true,
        };
        assert_eq!(deal_probability(&base), 45);
        assert_eq!(deal_probability(&base), deal_probability(&hot_overridden));
    }

    #[test]
    fn test_forecast_identity() {
        for stage in KNOWN_STAGES {
            let expected = 40_000.0 * f64::from(stage_probability(stage)) / 100.0;
            assert!((forecast(40_000.0, stage) - expected).abs() < 1e-9);
        }
        assert_eq!(forecast(40_000.0, "won"), 40_000.0);
        assert_eq!(forecast(40_000.0, "lost"), 0.0);
    }

    #[test]
    fn test_forecast_unknown_stage_is_zero() {
        assert_eq!(forecast(99_000.0, "mystery"), 0.0);
        assert_eq!(forecast(0.0, "won"), 0.0);
    }

    #[test]
    fn test_priority_from_score_thresholds() {
        assert_eq!(priority_from_score(100), "HOT");
        assert_eq!(priority_from_score(70), "HOT");
        assert_eq!(priority_from_score(69), "WARM");
        assert_eq!(priority_from_score(40), "WARM");
        assert_eq!(priority_from_score(39), "COLD");
        assert_eq!(priority_from_score(0), "COLD");
    }
}
