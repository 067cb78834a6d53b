//! Turns a scored job plus its derived signals into an apply/skip recommendation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::fusion::Confidence;
use crate::record::DerivedSignals;
use crate::scorer::ScoredJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Recommend,
    Caution,
    Avoid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDecision {
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub risks: Vec<String>,
    pub signals_used: Value,
    pub confidence_level: String,
}

/// Explains, in plain language, whether a scored job is worth applying to.
///
/// Pure and deterministic: the same `(scored_job, derived)` pair always
/// yields the same decision.
pub struct DecisionExplainer;

impl DecisionExplainer {
    pub fn explain(scored_job: &ScoredJob, derived: &DerivedSignals) -> JobDecision {
        let score = scored_job.authenticity_score;
        let confidence_level = format!("{:?}", scored_job.confidence);

        let mut reasons = Vec::new();
        let mut risks = Vec::new();

        let mut decision = if score >= 80.0 {
            reasons.push(format!("High authenticity score ({score:.0}/100)"));
            Decision::Recommend
        } else if score >= 60.0 {
            reasons.push(format!("Moderate authenticity score ({score:.0}/100)"));
            Decision::Caution
        } else if score >= 40.0 {
            risks.push(format!("Below-average score ({score:.0}/100)"));
            Decision::Caution
        } else {
            risks.push(format!("Low authenticity score ({score:.0}/100)"));
            Decision::Avoid
        };

        if scored_job.confidence == Confidence::High && score >= 70.0 {
            reasons.push("High confidence in this assessment".to_string());
        } else if scored_job.confidence == Confidence::Low {
            risks.push("Low confidence in this assessment".to_string());
        }

        if let Some(level) = derived.job_level.as_deref() {
            match level {
                "intern" | "new_grad" | "junior" => {
                    reasons.push(format!("Entry-level role ({level})"))
                }
                "senior" | "staff" => reasons.push(format!("Senior-level role ({level})")),
                _ => {}
            }
        }

        match derived.work_mode.as_deref() {
            Some("remote") => reasons.push("Remote work available".to_string()),
            Some("hybrid") => reasons.push("Hybrid work available".to_string()),
            _ => {}
        }

        match derived.visa_signal.as_deref() {
            Some("explicit_yes") => reasons.push("Visa sponsorship explicitly offered".to_string()),
            Some("explicit_no") => risks.push("Visa sponsorship explicitly unavailable".to_string()),
            Some("unclear") | None => risks.push("Visa sponsorship status unclear".to_string()),
            _ => {}
        }

        let salary_present = derived
            .salary
            .as_ref()
            .is_some_and(|s| s.min.is_some() || s.max.is_some());
        if salary_present {
            reasons.push("Salary range disclosed".to_string());
        } else {
            risks.push("No salary information disclosed".to_string());
        }

        let red_flag_count = scored_job.red_flags.len();
        let positive_signal_count = scored_job.positive_signals.len();

        if red_flag_count > 3 && decision == Decision::Recommend {
            decision = Decision::Caution;
            risks.push(format!("{red_flag_count} red flags found despite high score"));
        }

        if positive_signal_count > 5 && decision == Decision::Caution && score >= 65.0 {
            decision = Decision::Recommend;
            reasons.push(format!("{positive_signal_count} positive signals found"));
        }

        if risks.len() > reasons.len() && decision == Decision::Recommend {
            decision = Decision::Caution;
        }

        if reasons.is_empty() {
            reasons.push("Basic job information available".to_string());
        }

        let signals_used = json!({
            "score": score,
            "level": scored_job.level,
            "confidence": confidence_level,
            "red_flag_count": red_flag_count,
            "positive_signal_count": positive_signal_count,
        });

        JobDecision {
            decision,
            reasons,
            risks,
            signals_used,
            confidence_level,
        }
    }
}
