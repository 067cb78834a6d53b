//! The queued unit of apply work and the state machine that governs it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    NeedsUser,
    Success,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::NeedsUser => "needs_user",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Status values this one may transition into. Terminal states return
    /// an empty slice.
    pub fn legal_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Queued => &[Self::InProgress, Self::Canceled],
            Self::InProgress => &[Self::NeedsUser, Self::Failed, Self::Canceled],
            Self::NeedsUser => &[Self::Success, Self::Failed, Self::InProgress],
            Self::Failed => &[Self::Queued],
            Self::Success => &[],
            Self::Canceled => &[],
        }
    }

    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        self.legal_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.legal_transitions().is_empty()
    }
}

/// A single unit of apply work queued on behalf of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub job_id: String,
    pub status: TaskStatus,
    pub priority: i64,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub task_metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: impl Into<String>, job_id: impl Into<String>, priority: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            job_id: job_id.into(),
            status: TaskStatus::Queued,
            priority,
            attempt_count: 0,
            last_error: None,
            task_metadata: Value::Null,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An append-only record of one transition (or the synthetic initial entry
/// with `from_status = "none"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub task_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub reason: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl TaskEvent {
    pub fn initial(task_id: Uuid, to_status: TaskStatus, details: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id,
            from_status: "none".to_string(),
            to_status: to_status.as_str().to_string(),
            reason: None,
            details,
            created_at: now,
        }
    }

    pub fn transition(
        task_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
        reason: Option<String>,
        details: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id,
            from_status: from.as_str().to_string(),
            to_status: to.as_str().to_string(),
            reason,
            details,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_transitions_to_in_progress_or_canceled_only() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Canceled));
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Success));
    }

    #[test]
    fn failed_allows_retry_to_queued() {
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Queued));
    }

    #[test]
    fn success_and_canceled_are_terminal() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn needs_user_can_loop_back_to_in_progress() {
        assert!(TaskStatus::NeedsUser.can_transition_to(TaskStatus::InProgress));
    }
}
