//! Ties the rule engine, score fusion, and explanation engine into one call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::explanation::ExplanationEngine;
use crate::fusion::{AuthenticityLevel, Confidence, ScoreFusion};
use crate::record::JobRecord;
use crate::rule_engine::RuleEngine;
use crate::rule_table::RuleTable;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivatedRuleSummary {
    pub id: String,
    pub weight: f64,
    pub confidence: crate::rule::RuleConfidence,
}

/// The complete authenticity result for a single job posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredJob {
    pub authenticity_score: f64,
    pub level: AuthenticityLevel,
    pub confidence: Confidence,
    pub summary: String,
    pub red_flags: Vec<String>,
    pub positive_signals: Vec<String>,
    pub activated_rules: Vec<ActivatedRuleSummary>,
    pub computed_at: DateTime<Utc>,
}

/// The fixed field list the confidence coverage term checks for presence,
/// in the order `ScoreFusion::fuse` expects its bitmap.
fn field_presence(record: &JobRecord) -> [bool; 4] {
    [
        record.jd_text.as_ref().is_some_and(|s| !s.trim().is_empty()),
        record.poster_info.is_some(),
        record
            .platform_metadata
            .as_ref()
            .and_then(|m| m.posted_days_ago)
            .is_some(),
        record
            .company_name
            .as_ref()
            .is_some_and(|s| !s.trim().is_empty()),
    ]
}

/// The scoring pipeline façade: one call per job record.
pub struct Scorer<C: Clock = SystemClock> {
    rule_table: RuleTable,
    clock: C,
}

impl Scorer<SystemClock> {
    pub fn new(rule_table: RuleTable) -> Self {
        Self {
            rule_table,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> Scorer<C> {
    pub fn with_clock(rule_table: RuleTable, clock: C) -> Self {
        Self { rule_table, clock }
    }

    pub fn score(&self, record: &JobRecord) -> ScoredJob {
        let jd_text_present = record
            .jd_text
            .as_ref()
            .is_some_and(|text| !text.trim().is_empty());

        if !jd_text_present {
            tracing::warn!(job_id = ?record.job_id, "missing jd_text, returning insufficient-data result");
            return self.insufficient_data_result();
        }

        let engine = RuleEngine::new(&self.rule_table);
        let activated = engine.evaluate(record);

        tracing::debug!(
            job_id = ?record.job_id,
            activated_count = activated.len(),
            "activated rules for job"
        );

        let fused = ScoreFusion::fuse(&activated, &field_presence(record));
        let explanation = ExplanationEngine::explain(&fused, &activated);

        let result = ScoredJob {
            authenticity_score: fused.score,
            level: fused.level,
            confidence: fused.confidence,
            summary: explanation.summary,
            red_flags: explanation.red_flags,
            positive_signals: explanation.positive_signals,
            activated_rules: activated
                .iter()
                .map(|r| ActivatedRuleSummary {
                    id: r.id.clone(),
                    weight: r.effective_weight,
                    confidence: r.confidence,
                })
                .collect(),
            computed_at: self.clock.now(),
        };

        tracing::info!(
            job_id = ?record.job_id,
            score = result.authenticity_score,
            level = ?result.level,
            confidence = ?result.confidence,
            "scored job"
        );

        result
    }

    fn insufficient_data_result(&self) -> ScoredJob {
        ScoredJob {
            authenticity_score: 50.0,
            level: AuthenticityLevel::Uncertain,
            confidence: Confidence::Low,
            summary: "Insufficient data to evaluate authenticity".to_string(),
            red_flags: vec!["Missing job description text".to_string()],
            positive_signals: Vec::new(),
            activated_rules: Vec::new(),
            computed_at: self.clock.now(),
        }
    }
}
