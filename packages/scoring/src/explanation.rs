//! Turns a fused score and its activated rules into a human-readable explanation.

use crate::fusion::{AuthenticityLevel, FusedScore};
use crate::rule::Signal;
use crate::rule_engine::ActivatedRule;

const MAX_RED_FLAGS: usize = 5;

#[derive(Debug, Clone)]
pub struct Explanation {
    pub summary: String,
    pub red_flags: Vec<String>,
    pub positive_signals: Vec<String>,
}

pub struct ExplanationEngine;

impl ExplanationEngine {
    pub fn explain(fused: &FusedScore, activated: &[ActivatedRule]) -> Explanation {
        let summary = Self::summary(fused);

        let mut negatives: Vec<&ActivatedRule> = activated
            .iter()
            .filter(|r| r.signal == Signal::Negative)
            .collect();
        negatives.sort_by(|a, b| {
            b.effective_weight
                .partial_cmp(&a.effective_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let red_flags = negatives
            .into_iter()
            .take(MAX_RED_FLAGS)
            .map(|r| r.description.clone())
            .collect();

        // Positive signals are reported in rule-table order rather than by
        // weight: they read as a checklist, not a ranking.
        let positive_signals = activated
            .iter()
            .filter(|r| r.signal == Signal::Positive)
            .map(|r| r.description.clone())
            .collect();

        Explanation {
            summary,
            red_flags,
            positive_signals,
        }
    }

    fn summary(fused: &FusedScore) -> String {
        match fused.level {
            AuthenticityLevel::LikelyReal => format!(
                "This posting looks legitimate (score {:.0}/100). No significant authenticity concerns found.",
                fused.score
            ),
            AuthenticityLevel::Uncertain => format!(
                "This posting has some inconsistencies (score {:.0}/100). Review the flags below before applying.",
                fused.score
            ),
            AuthenticityLevel::LikelyFake => format!(
                "This posting shows multiple signs of being inauthentic (score {:.0}/100). Proceed with caution.",
                fused.score
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::Confidence;
    use crate::rule::RuleConfidence;

    fn rule(id: &str, weight: f64, signal: Signal, description: &str) -> ActivatedRule {
        ActivatedRule {
            id: id.to_string(),
            effective_weight: weight,
            confidence: RuleConfidence::High,
            signal,
            description: description.to_string(),
        }
    }

    #[test]
    fn red_flags_are_capped_and_sorted_by_weight() {
        let fused = FusedScore {
            score: 40.0,
            level: AuthenticityLevel::LikelyFake,
            confidence: Confidence::High,
            negative_weight: 1.0,
            positive_weight: 0.0,
        };
        let activated = vec![
            rule("A1", 0.1, Signal::Negative, "weak flag"),
            rule("A2", 0.5, Signal::Negative, "strong flag"),
            rule("A3", 0.3, Signal::Negative, "mid flag"),
            rule("A4", 0.2, Signal::Negative, "low flag"),
            rule("A5", 0.15, Signal::Negative, "lower flag"),
            rule("A6", 0.05, Signal::Negative, "dropped flag"),
        ];
        let explanation = ExplanationEngine::explain(&fused, &activated);
        assert_eq!(explanation.red_flags.len(), 5);
        assert_eq!(explanation.red_flags[0], "strong flag");
        assert!(!explanation.red_flags.contains(&"dropped flag".to_string()));
    }

    #[test]
    fn positive_signals_preserve_table_order() {
        let fused = FusedScore {
            score: 95.0,
            level: AuthenticityLevel::LikelyReal,
            confidence: Confidence::High,
            negative_weight: 0.0,
            positive_weight: 0.4,
        };
        let activated = vec![
            rule("P2", 0.1, Signal::Positive, "second"),
            rule("P1", 0.3, Signal::Positive, "first"),
        ];
        let explanation = ExplanationEngine::explain(&fused, &activated);
        assert_eq!(explanation.positive_signals, vec!["second", "first"]);
    }

    #[test]
    fn summary_reflects_level() {
        let fused = FusedScore {
            score: 90.0,
            level: AuthenticityLevel::LikelyReal,
            confidence: Confidence::High,
            negative_weight: 0.0,
            positive_weight: 0.0,
        };
        assert!(ExplanationEngine::explain(&fused, &[]).summary.contains("legitimate"));
    }
}
