//! Domain-agnostic authenticity scoring for job postings.
//!
//! Data flows: a raw [`record::JobRecord`] is normalized by [`enrich::JobEnricher`],
//! then scored by [`scorer::Scorer`] (which composes [`rule_engine::RuleEngine`],
//! [`fusion::ScoreFusion`], and [`explanation::ExplanationEngine`]). The result
//! can be turned into an apply/skip recommendation via
//! [`decision::DecisionExplainer`] and a queue priority via
//! [`priority::PriorityCalculator`].

pub mod clock;
pub mod decision;
pub mod enrich;
pub mod error;
pub mod explanation;
pub mod fusion;
pub mod priority;
pub mod record;
pub mod rule;
pub mod rule_engine;
pub mod rule_table;
pub mod scorer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decision::{Decision, DecisionExplainer, JobDecision};
pub use enrich::JobEnricher;
pub use error::{Result, RuleTableError};
pub use explanation::{Explanation, ExplanationEngine};
pub use fusion::{AuthenticityLevel, Confidence, FusedScore, ScoreFusion};
pub use priority::{PriorityCalculator, PriorityInput, PriorityStrategy};
pub use record::JobRecord;
pub use rule::{PatternType, Rule, RuleConfidence, Signal};
pub use rule_engine::{ActivatedRule, RuleEngine};
pub use rule_table::RuleTable;
pub use scorer::{ActivatedRuleSummary, Scorer, ScoredJob};
