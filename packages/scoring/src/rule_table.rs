//! Loads and validates the declarative rule table.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, RuleTableError};
use crate::rule::{PatternType, Rule, RuleConfidence, Signal};

#[derive(Debug, Deserialize)]
struct RawDocument {
    rules: Vec<Value>,
}

/// An ordered, immutable collection of rules, loaded once at startup.
///
/// Order is preserved from the source document: downstream stages (red-flag
/// ranking ties, positive-signal ordering) assume stable table order.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Load and validate a rule table from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RuleTableError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                RuleTableError::Io(err)
            }
        })?;
        Self::from_str(&contents)
    }

    /// Parse and validate a rule table from an in-memory JSON document.
    pub fn from_str(contents: &str) -> Result<Self> {
        let doc: RawDocument = serde_json::from_str(contents).map_err(|err| {
            RuleTableError::Malformed {
                reason: err.to_string(),
            }
        })?;

        let mut rules = Vec::with_capacity(doc.rules.len());
        let mut seen_ids = std::collections::HashSet::new();

        for (index, raw) in doc.rules.into_iter().enumerate() {
            let rule = parse_rule(index, raw)?;
            if !seen_ids.insert(rule.id.clone()) {
                return Err(RuleTableError::DuplicateId { id: rule.id });
            }
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    /// The rules in source-document order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule(index: usize, raw: Value) -> Result<Rule> {
    let obj = raw.as_object().ok_or_else(|| RuleTableError::Malformed {
        reason: format!("rule at index {index} is not an object"),
    })?;

    let id = required_str(obj, index, "id")?;
    let weight = required_f64(obj, index, "weight")?;
    let confidence_raw = required_str(obj, index, "confidence")?;
    let signal_raw = required_str(obj, index, "signal")?;
    let description = required_str(obj, index, "description")?;
    let data_source = required_str(obj, index, "data_source")?;
    let pattern_type_raw = required_str(obj, index, "pattern_type")?;

    let confidence = match confidence_raw.as_str() {
        "low" => RuleConfidence::Low,
        "medium" => RuleConfidence::Medium,
        "high" => RuleConfidence::High,
        other => {
            return Err(RuleTableError::Malformed {
                reason: format!("rule at index {index} has unknown confidence `{other}`"),
            })
        }
    };

    let signal = match signal_raw.as_str() {
        "negative" => Signal::Negative,
        "positive" => Signal::Positive,
        other => {
            return Err(RuleTableError::Malformed {
                reason: format!("rule at index {index} has unknown signal `{other}`"),
            })
        }
    };

    // Forward-compat: unknown pattern_type is permitted at load time and
    // simply never activates at evaluate time.
    let pattern_type = PatternType::parse(&pattern_type_raw);
    let pattern_value = obj.get("pattern_value").cloned().unwrap_or(Value::Null);

    Ok(Rule {
        id,
        weight,
        confidence,
        signal,
        description,
        data_source,
        pattern_type,
        pattern_value,
    })
}

fn required_str(obj: &serde_json::Map<String, Value>, index: usize, field: &'static str) -> Result<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(RuleTableError::MissingField { index, field })
}

fn required_f64(obj: &serde_json::Map<String, Value>, index: usize, field: &'static str) -> Result<f64> {
    obj.get(field)
        .and_then(Value::as_f64)
        .ok_or(RuleTableError::MissingField { index, field })
}
