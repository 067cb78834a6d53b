//! Computes an integer queue priority from a scored job and a strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityStrategy {
    DecisionThenNewest,
    Newest,
    HighestScore,
}

/// Inputs the calculator needs from a scored job; callers assemble this from
/// whatever storage row or in-memory record they hold.
#[derive(Debug, Clone, Copy)]
pub struct PriorityInput {
    pub decision: Option<Decision>,
    pub authenticity_score: Option<f64>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Deterministic, pure: computes a priority in `[0, 1099]`, higher first.
pub struct PriorityCalculator;

impl PriorityCalculator {
    pub fn calculate(input: &PriorityInput, strategy: PriorityStrategy, now: DateTime<Utc>) -> i64 {
        match strategy {
            PriorityStrategy::DecisionThenNewest => Self::decision_then_newest(input, now),
            PriorityStrategy::Newest => Self::newest(input, now),
            PriorityStrategy::HighestScore => Self::highest_score(input),
        }
    }

    fn decision_then_newest(input: &PriorityInput, now: DateTime<Utc>) -> i64 {
        let base = match input.decision {
            Some(Decision::Recommend) => 1000,
            Some(Decision::Avoid) => 100,
            Some(Decision::Caution) | None => 500,
        };
        match input.posted_at {
            Some(posted_at) => {
                let days_since_posted = days_since(posted_at, now);
                let bonus = (99 - days_since_posted.min(99)).max(0);
                base + bonus
            }
            None => base,
        }
    }

    fn newest(input: &PriorityInput, now: DateTime<Utc>) -> i64 {
        match input.posted_at {
            Some(posted_at) => 1000 - days_since(posted_at, now).min(999),
            None => 500,
        }
    }

    fn highest_score(input: &PriorityInput) -> i64 {
        input
            .authenticity_score
            .map(|score| (score * 10.0).round() as i64)
            .unwrap_or(0)
    }
}

fn days_since(posted_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - posted_at).num_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn decision_then_newest_combines_base_and_recency() {
        let input = PriorityInput {
            decision: Some(Decision::Recommend),
            authenticity_score: None,
            posted_at: Some(now() - Duration::days(2)),
        };
        let priority = PriorityCalculator::calculate(&input, PriorityStrategy::DecisionThenNewest, now());
        assert_eq!(priority, 1000 + 97);
    }

    #[test]
    fn decision_then_newest_defaults_decision_to_caution() {
        let input = PriorityInput {
            decision: None,
            authenticity_score: None,
            posted_at: None,
        };
        let priority = PriorityCalculator::calculate(&input, PriorityStrategy::DecisionThenNewest, now());
        assert_eq!(priority, 500);
    }

    #[test]
    fn newest_caps_bonus_at_999() {
        let input = PriorityInput {
            decision: None,
            authenticity_score: None,
            posted_at: Some(now() - Duration::days(5000)),
        };
        let priority = PriorityCalculator::calculate(&input, PriorityStrategy::Newest, now());
        assert_eq!(priority, 1);
    }

    #[test]
    fn newest_defaults_to_500_without_posted_at() {
        let input = PriorityInput {
            decision: None,
            authenticity_score: None,
            posted_at: None,
        };
        let priority = PriorityCalculator::calculate(&input, PriorityStrategy::Newest, now());
        assert_eq!(priority, 500);
    }

    #[test]
    fn highest_score_rounds_to_integer() {
        let input = PriorityInput {
            decision: None,
            authenticity_score: Some(87.4),
            posted_at: None,
        };
        let priority = PriorityCalculator::calculate(&input, PriorityStrategy::HighestScore, now());
        assert_eq!(priority, 874);
    }

    #[test]
    fn highest_score_defaults_to_zero_when_absent() {
        let input = PriorityInput {
            decision: None,
            authenticity_score: None,
            posted_at: None,
        };
        let priority = PriorityCalculator::calculate(&input, PriorityStrategy::HighestScore, now());
        assert_eq!(priority, 0);
    }
}
