//! Typed errors for the apply orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("user {user_id} not found")]
    UnknownUser { user_id: String },

    #[error("no jobs found for the provided job ids")]
    UnknownJobs,

    #[error("task {task_id} not found")]
    TaskNotFound { task_id: uuid::Uuid },

    #[error("run {run_id} not found")]
    RunNotFound { run_id: uuid::Uuid },

    #[error("invalid transition {from} -> {to}, legal transitions from {from}: {legal:?}")]
    InvalidTransition {
        from: String,
        to: String,
        legal: Vec<&'static str>,
    },

    #[error("a reason is required when transitioning to `failed`")]
    ReasonRequired,

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
