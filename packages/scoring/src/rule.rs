//! The declarative rule type and the tagged pattern variants it dispatches on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How much an activated rule should be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleConfidence {
    Low,
    Medium,
    High,
}

/// Whether a rule, once activated, counts against or for authenticity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Negative,
    Positive,
}

/// The tag a rule dispatches on. `pattern_value`'s shape depends on the tag,
/// so it stays as a raw [`Value`] on [`Rule`] and each evaluator in
/// [`crate::rule_engine`] parses the shape it expects.
///
/// Unknown tags are kept (not rejected) at load time so a rule table can be
/// rolled forward onto an older engine; [`crate::rule_engine::RuleEngine`]
/// simply never activates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternType {
    FieldExists,
    Regex,
    StringContains,
    StringContainsAny,
    StringEqualsAny,
    NumericThreshold,
    NumericLessThan,
    Boolean,
    JdLengthCheck,
    JdLengthCheckMin,
    ActionVerbCheck,
    ExtremeFormattingCheck,
    BodyShopPatternCheck,
    Unknown(String),
}

impl PatternType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "field_exists" => Self::FieldExists,
            "regex" => Self::Regex,
            "string_contains" => Self::StringContains,
            "string_contains_any" => Self::StringContainsAny,
            "string_equals_any" => Self::StringEqualsAny,
            "numeric_threshold" => Self::NumericThreshold,
            "numeric_less_than" => Self::NumericLessThan,
            "boolean" => Self::Boolean,
            "jd_length_check" => Self::JdLengthCheck,
            "jd_length_check_min" => Self::JdLengthCheckMin,
            "action_verb_check" => Self::ActionVerbCheck,
            "extreme_formatting_check" => Self::ExtremeFormattingCheck,
            "body_shop_pattern_check" => Self::BodyShopPatternCheck,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A single declarative rule, immutable once loaded.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub weight: f64,
    pub confidence: RuleConfidence,
    pub signal: Signal,
    pub description: String,
    pub data_source: String,
    pub pattern_type: PatternType,
    pub pattern_value: Value,
}

impl Rule {
    /// Rules in the recruiter-signal cluster (`A`-prefixed ids) are conditioned
    /// on platform capability: their weight is adjusted or zeroed depending on
    /// whether the collecting platform surfaces poster identity at all.
    pub fn is_recruiter_cluster(&self) -> bool {
        self.id.starts_with('A')
    }
}
