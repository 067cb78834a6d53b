//! Deterministic fusion of activated rules into a single authenticity score.

use serde::{Deserialize, Serialize};

use crate::rule::Signal;
use crate::rule_engine::ActivatedRule;

/// Multiplies accumulated negative weight before it is folded into the decay
/// exponent: negative signals are weighted more heavily than positive ones.
const PENALTY_FACTOR: f64 = 1.8;

/// Upper bound on the multiplicative boost positive weight can apply to the
/// base score, regardless of how many positive rules fire.
const MAX_GAIN: f64 = 1.15;

/// An activated rule's effective weight above this threshold counts as
/// "strong" toward the confidence calculation.
const STRONG_RULE_THRESHOLD: f64 = 0.18;

pub const LEVEL_LIKELY_REAL: f64 = 80.0;
pub const LEVEL_UNCERTAIN: f64 = 55.0;

/// Fields whose presence on the source record feeds the coverage term of the
/// confidence calculation.
const REQUIRED_FIELDS: &[&str] = &[
    "jd_text",
    "poster_info",
    "platform_metadata.posted_days_ago",
    "company_name",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticityLevel {
    LikelyReal,
    Uncertain,
    LikelyFake,
}

impl AuthenticityLevel {
    fn from_score(score: f64) -> Self {
        if score >= LEVEL_LIKELY_REAL {
            Self::LikelyReal
        } else if score >= LEVEL_UNCERTAIN {
            Self::Uncertain
        } else {
            Self::LikelyFake
        }
    }
}

/// Qualifies how much input data and strong-rule signal backed a score.
/// Kept opaque downstream, per the convention the decision explainer already
/// follows when it forwards this value unmodified as `confidence_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct FusedScore {
    pub score: f64,
    pub level: AuthenticityLevel,
    pub confidence: Confidence,
    pub negative_weight: f64,
    pub positive_weight: f64,
}

/// Combines activated rules into a bounded `0..=100` score.
///
/// The base score decays exponentially with accumulated negative weight,
/// then a bounded multiplicative gain from positive weight is applied on top.
/// This keeps any single rule from dominating the result while still letting
/// a dense cluster of strong negatives drive the score arbitrarily close to
/// zero.
pub struct ScoreFusion;

impl ScoreFusion {
    pub fn fuse(activated: &[ActivatedRule], field_presence: &[bool; 4]) -> FusedScore {
        let negative_weight: f64 = activated
            .iter()
            .filter(|r| r.signal == Signal::Negative)
            .map(|r| r.effective_weight)
            .sum();
        let positive_weight: f64 = activated
            .iter()
            .filter(|r| r.signal == Signal::Positive)
            .map(|r| r.effective_weight)
            .sum();

        let base_score = 100.0 * (-negative_weight * PENALTY_FACTOR).exp();
        let gain = (1.0 + positive_weight).powf(0.25).min(MAX_GAIN);
        let score = ((base_score * gain).clamp(0.0, 100.0) * 10.0).round() / 10.0;

        let level = AuthenticityLevel::from_score(score);
        let confidence = Self::confidence(activated, field_presence);

        FusedScore {
            score,
            level,
            confidence,
            negative_weight,
            positive_weight,
        }
    }

    fn confidence(activated: &[ActivatedRule], field_presence: &[bool; 4]) -> Confidence {
        let strong_count = activated
            .iter()
            .filter(|r| r.effective_weight >= STRONG_RULE_THRESHOLD)
            .count();
        let coverage = field_presence.iter().filter(|present| **present).count() as f64
            / REQUIRED_FIELDS.len() as f64;

        let score = 0.5 * (strong_count as f64 / 3.0).min(1.0) + 0.5 * coverage;

        if strong_count == 0 && coverage >= 0.75 {
            let max_weight = activated
                .iter()
                .map(|r| r.effective_weight)
                .fold(0.0_f64, f64::max);
            if activated.is_empty() || max_weight < 0.05 {
                return Confidence::High;
            }
            if activated.len() >= 5 && max_weight < 0.2 {
                return Confidence::High;
            }
        }

        if score >= 0.66 {
            Confidence::High
        } else if score >= 0.33 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}
