//! Evaluates a [`RuleTable`] against a single [`JobRecord`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use regex::RegexBuilder;
use serde_json::Value;

use crate::record::JobRecord;
use crate::rule::{PatternType, Rule, RuleConfidence, Signal};
use crate::rule_table::RuleTable;

/// A rule whose pattern matched, carrying the weight it should count with
/// after platform-aware adjustment.
#[derive(Debug, Clone)]
pub struct ActivatedRule {
    pub id: String,
    pub effective_weight: f64,
    pub confidence: RuleConfidence,
    pub signal: Signal,
    pub description: String,
}

/// Evaluates every rule in a [`RuleTable`] against a record.
///
/// Stateless and fully re-entrant: holds only a reference to the (immutable,
/// load-once) rule table, so an arbitrary number of evaluations may run
/// concurrently.
pub struct RuleEngine<'a> {
    table: &'a RuleTable,
}

impl<'a> RuleEngine<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    pub fn evaluate(&self, record: &JobRecord) -> Vec<ActivatedRule> {
        let mut activated = Vec::new();

        for rule in self.table.rules() {
            let fired = match catch_unwind(AssertUnwindSafe(|| evaluate_rule(rule, record))) {
                Ok(fired) => fired,
                Err(_) => {
                    tracing::warn!(rule_id = %rule.id, "rule evaluation panicked, treating as not activated");
                    false
                }
            };

            if fired {
                activated.push(ActivatedRule {
                    id: rule.id.clone(),
                    effective_weight: effective_weight(rule, record),
                    confidence: rule.confidence,
                    signal: rule.signal,
                    description: rule.description.clone(),
                });
            }
        }

        activated
    }
}

/// Platform-aware weight adjustment for the recruiter-signal cluster.
fn effective_weight(rule: &Rule, record: &JobRecord) -> f64 {
    if !rule.is_recruiter_cluster() {
        return rule.weight;
    }

    let poster_expected = record
        .collection_metadata
        .as_ref()
        .and_then(|m| m.poster_expected)
        .unwrap_or(false);
    if !poster_expected {
        return 0.0;
    }

    let poster_present = record
        .collection_metadata
        .as_ref()
        .and_then(|m| m.poster_present)
        .unwrap_or(false);
    if !poster_present {
        return rule.weight * 0.5;
    }

    rule.weight
}

fn evaluate_rule(rule: &Rule, record: &JobRecord) -> bool {
    let value = record.lookup(&rule.data_source);

    if matches!(rule.pattern_type, PatternType::FieldExists) {
        return value.as_ref().is_some_and(field_is_present);
    }

    let value = match value {
        Some(v) => v,
        None => return false,
    };

    match &rule.pattern_type {
        PatternType::Regex => match_regex(&value, &rule.pattern_value),
        PatternType::StringContains => string_contains(&value, &rule.pattern_value),
        PatternType::StringContainsAny => string_contains_any(&value, &rule.pattern_value),
        PatternType::StringEqualsAny => string_equals_any(&value, &rule.pattern_value),
        PatternType::NumericThreshold => numeric_threshold(&value, &rule.pattern_value),
        PatternType::NumericLessThan => numeric_less_than(&value, &rule.pattern_value),
        PatternType::Boolean => boolean_match(&value, &rule.pattern_value),
        PatternType::JdLengthCheck => jd_length_short(&value, &rule.pattern_value),
        PatternType::JdLengthCheckMin => jd_length_long(&value, &rule.pattern_value),
        PatternType::ActionVerbCheck => missing_action_verbs(&value),
        PatternType::ExtremeFormattingCheck => extreme_formatting(&value),
        PatternType::BodyShopPatternCheck => body_shop_pattern(&value, record),
        PatternType::FieldExists => unreachable!("handled above"),
        PatternType::Unknown(_) => false,
    }
}

fn field_is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pattern_strings(pattern_value: &Value) -> Vec<String> {
    match pattern_value {
        Value::Array(items) => items.iter().map(value_as_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_as_text(other)],
    }
}

fn match_regex(value: &Value, pattern_value: &Value) -> bool {
    let text = value_as_text(value);
    pattern_strings(pattern_value).iter().any(|pattern| {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(&text))
            .unwrap_or_else(|_| {
                tracing::warn!(%pattern, "invalid regex pattern skipped");
                false
            })
    })
}

fn string_contains(value: &Value, pattern_value: &Value) -> bool {
    if pattern_value.is_null() {
        return false;
    }
    value_as_text(value)
        .to_lowercase()
        .contains(&value_as_text(pattern_value).to_lowercase())
}

fn string_contains_any(value: &Value, pattern_value: &Value) -> bool {
    let haystack = value_as_text(value).to_lowercase();
    pattern_strings(pattern_value)
        .iter()
        .any(|p| haystack.contains(&p.to_lowercase()))
}

fn string_equals_any(value: &Value, pattern_value: &Value) -> bool {
    let haystack = value_as_text(value).to_lowercase();
    pattern_strings(pattern_value)
        .iter()
        .any(|p| haystack == p.to_lowercase())
}

fn as_f64_loose(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn numeric_threshold(value: &Value, pattern_value: &Value) -> bool {
    match (as_f64_loose(value), as_f64_loose(pattern_value)) {
        (Some(v), Some(t)) => v > t,
        _ => false,
    }
}

fn numeric_less_than(value: &Value, pattern_value: &Value) -> bool {
    match (as_f64_loose(value), as_f64_loose(pattern_value)) {
        (Some(v), Some(t)) => v < t,
        _ => false,
    }
}

/// Only real JSON booleans match; numbers and strings never coerce here,
/// which keeps this pattern from misfiring on unrelated truthy values.
fn boolean_match(value: &Value, pattern_value: &Value) -> bool {
    match (value, pattern_value) {
        (Value::Bool(v), Value::Bool(expected)) => v == expected,
        _ => false,
    }
}

fn jd_length_short(value: &Value, pattern_value: &Value) -> bool {
    let threshold = as_f64_loose(pattern_value).unwrap_or(500.0) as usize;
    value_as_text(value).len() < threshold
}

fn jd_length_long(value: &Value, pattern_value: &Value) -> bool {
    let threshold = as_f64_loose(pattern_value).unwrap_or(3000.0) as usize;
    value_as_text(value).len() > threshold
}

const ACTION_VERBS: &[&str] = &[
    "build", "develop", "create", "design", "implement", "architect", "construct", "code",
    "write", "program", "work", "collaborate", "partner", "coordinate", "contribute",
    "participate", "engage", "join", "support", "lead", "manage", "direct", "oversee",
    "supervise", "guide", "mentor", "coach", "drive", "own", "improve", "optimize", "enhance",
    "refine", "streamline", "scale", "upgrade", "modernize", "analyze", "solve", "troubleshoot",
    "debug", "investigate", "research", "evaluate", "assess", "maintain", "operate", "monitor",
    "ensure", "deploy", "run", "execute", "perform", "communicate", "document", "present",
    "report", "share", "explain", "demonstrate",
];

const RESPONSIBILITY_PHRASES: &[&str] = &[
    "responsibilities",
    "you will",
    "you'll",
    "your role",
    "what you'll do",
    "day-to-day",
    "in this role",
];

fn missing_action_verbs(value: &Value) -> bool {
    let text = value_as_text(value).to_lowercase();
    let has_action_verb = ACTION_VERBS.iter().any(|verb| text.contains(verb));
    let has_responsibility_section = RESPONSIBILITY_PHRASES.iter().any(|p| text.contains(p));
    !(has_action_verb || has_responsibility_section)
}

fn extreme_formatting(value: &Value) -> bool {
    lazy_static::lazy_static! {
        static ref LONG_SPACES: regex::Regex = regex::Regex::new(r" {10,}").unwrap();
        static ref LONG_TABS: regex::Regex = regex::Regex::new(r"\t{5,}").unwrap();
        static ref BULLET_RUN: regex::Regex = regex::Regex::new(r"[•●○■□▪▫]{3,}").unwrap();
        static ref BLANK_RUN: regex::Regex = regex::Regex::new(r"\n{5,}").unwrap();
        static ref TAB_SPACE_RUN: regex::Regex = regex::Regex::new(r"\t\s{6,}").unwrap();
        static ref SEPARATOR_RUN: regex::Regex = regex::Regex::new(r"[=\-_]{10,}").unwrap();
    }

    let text = value_as_text(value);
    [
        &*LONG_SPACES,
        &*LONG_TABS,
        &*BULLET_RUN,
        &*BLANK_RUN,
        &*TAB_SPACE_RUN,
        &*SEPARATOR_RUN,
    ]
    .iter()
    .any(|re| re.is_match(&text))
}

const GENERIC_KEYWORDS: &[&str] = &[
    "consulting",
    "solutions",
    "systems",
    "technologies",
    "staffing",
    "recruiting",
    "talent",
    "services",
    "global",
];

const LEGAL_SUFFIXES: &[&str] = &["llc", "inc", "corp", "ltd", "limited", "incorporated"];

/// Flags generic-sounding company names that also carry a suspicious
/// combination of size, domain mismatch, or rating (body-shop
/// heuristic). Large, well-rated companies with a matching domain are
/// never flagged regardless of how generic their name reads.
fn body_shop_pattern(company_name: &Value, record: &JobRecord) -> bool {
    let name = value_as_text(company_name).to_lowercase();

    let generic_count = GENERIC_KEYWORDS.iter().filter(|kw| name.contains(*kw)).count();
    if generic_count == 0 {
        return false;
    }
    let has_legal_suffix = LEGAL_SUFFIXES.iter().any(|suffix| name.contains(suffix));

    let company_info = record.company_info.as_ref();
    let domain_matches = company_info.and_then(|c| c.domain_matches_name);
    let size = company_info.and_then(|c| c.size_employees);
    let glassdoor = company_info.and_then(|c| c.glassdoor_rating);

    if !has_legal_suffix && generic_count < 2 {
        return domain_matches == Some(false) && size.is_some_and(|s| s < 100.0);
    }

    if domain_matches == Some(true) && size.is_some_and(|s| s >= 500.0) {
        return false;
    }
    if domain_matches == Some(true)
        && size.is_some_and(|s| s >= 100.0)
        && glassdoor.is_some_and(|g| g >= 3.5)
    {
        return false;
    }

    if domain_matches == Some(false) {
        return true;
    }
    if size.is_some_and(|s| s < 50.0) {
        return true;
    }

    let word_count = name.split_whitespace().count();
    word_count <= 3 && generic_count >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CollectionMetadata, CompanyInfo, PosterInfo};
    use crate::rule_table::RuleTable;

    fn table(json: &str) -> RuleTable {
        RuleTable::from_str(json).unwrap()
    }

    #[test]
    fn regex_rule_activates_on_match() {
        let rules = table(
            r#"{"rules": [{"id":"A1","weight":0.25,"confidence":"high","signal":"negative",
            "description":"recruiter","data_source":"jd_text","pattern_type":"regex",
            "pattern_value":["our\\s+client"]}]}"#,
        );
        let record = JobRecord {
            jd_text: Some("This role is posted on behalf of our client.".to_string()),
            collection_metadata: Some(CollectionMetadata {
                poster_expected: Some(true),
                poster_present: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let activated = RuleEngine::new(&rules).evaluate(&record);
        assert_eq!(activated.len(), 1);
        assert_eq!(activated[0].effective_weight, 0.25);
    }

    #[test]
    fn recruiter_rule_suppressed_when_poster_not_expected() {
        let rules = table(
            r#"{"rules": [{"id":"A1","weight":0.25,"confidence":"high","signal":"negative",
            "description":"recruiter","data_source":"jd_text","pattern_type":"regex",
            "pattern_value":["our client"]}]}"#,
        );
        let record = JobRecord {
            jd_text: Some("our client is hiring".to_string()),
            collection_metadata: Some(CollectionMetadata {
                poster_expected: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let activated = RuleEngine::new(&rules).evaluate(&record);
        assert_eq!(activated.len(), 1);
        assert_eq!(activated[0].effective_weight, 0.0);
    }

    #[test]
    fn recruiter_rule_halved_when_poster_expected_but_absent() {
        let rules = table(
            r#"{"rules": [{"id":"A2","weight":0.2,"confidence":"high","signal":"negative",
            "description":"recruiter","data_source":"jd_text","pattern_type":"regex",
            "pattern_value":["our client"]}]}"#,
        );
        let record = JobRecord {
            jd_text: Some("our client is hiring".to_string()),
            collection_metadata: Some(CollectionMetadata {
                poster_expected: Some(true),
                poster_present: Some(false),
            }),
            ..Default::default()
        };
        let activated = RuleEngine::new(&rules).evaluate(&record);
        assert_eq!(activated[0].effective_weight, 0.1);
    }

    #[test]
    fn unknown_pattern_type_never_activates() {
        let rules = table(
            r#"{"rules": [{"id":"Z1","weight":0.1,"confidence":"low","signal":"negative",
            "description":"future","data_source":"jd_text","pattern_type":"vibe_check",
            "pattern_value":null}]}"#,
        );
        let record = JobRecord {
            jd_text: Some("anything".to_string()),
            ..Default::default()
        };
        assert!(RuleEngine::new(&rules).evaluate(&record).is_empty());
    }

    #[test]
    fn body_shop_flags_small_mismatched_generic_name() {
        let record = JobRecord {
            company_name: Some("Apex Staffing Solutions LLC".to_string()),
            company_info: Some(CompanyInfo {
                domain_matches_name: Some(false),
                size_employees: Some(20.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(body_shop_pattern(&Value::String(
            record.company_name.clone().unwrap()
        ), &record));
    }

    #[test]
    fn body_shop_never_flags_large_matching_well_rated_company() {
        let record = JobRecord {
            company_name: Some("Global Systems Inc".to_string()),
            company_info: Some(CompanyInfo {
                domain_matches_name: Some(true),
                size_employees: Some(150_000.0),
                glassdoor_rating: Some(4.4),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!body_shop_pattern(
            &Value::String(record.company_name.clone().unwrap()),
            &record
        ));
    }

    #[test]
    fn field_exists_rejects_blank_string() {
        let rules = table(
            r#"{"rules": [{"id":"B1","weight":0.1,"confidence":"low","signal":"negative",
            "description":"no company","data_source":"company_name","pattern_type":"field_exists",
            "pattern_value":null}]}"#,
        );
        let record = JobRecord {
            company_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(RuleEngine::new(&rules).evaluate(&record).is_empty());
    }

    #[test]
    fn poster_info_struct_is_exercised() {
        let record = JobRecord {
            poster_info: Some(PosterInfo {
                account_age_months: Some(1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            record.lookup("poster_info.account_age_months"),
            Some(serde_json::json!(1.0))
        );
    }
}
