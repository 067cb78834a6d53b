//! Typed errors for the scoring library.
//!
//! Uses `thiserror` for library errors, not `anyhow`: callers outside this
//! crate need to match on the kind, not just print a message.

use thiserror::Error;

/// Errors that can occur while loading or validating a rule table.
#[derive(Debug, Error)]
pub enum RuleTableError {
    #[error("rule table not found at {path}")]
    NotFound { path: String },

    #[error("rule table is malformed: {reason}")]
    Malformed { reason: String },

    #[error("rule at index {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("duplicate rule id `{id}`")]
    DuplicateId { id: String },

    #[error("io error reading rule table: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error parsing rule table: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleTableError>;
