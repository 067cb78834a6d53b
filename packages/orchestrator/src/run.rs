//! Apply runs, their observability trail, and the per-user active-session handoff.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    Failed,
    Abandoned,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Extension,
    Backend,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// One end-to-end attempt at applying to a job on a user's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRun {
    pub id: Uuid,
    pub user_id: String,
    pub job_id: Option<String>,
    pub task_id: Option<Uuid>,
    pub initial_url: String,
    pub current_url: String,
    pub ats_kind: Option<String>,
    pub intent: Option<String>,
    pub stage: Option<String>,
    pub status: RunStatus,
    pub fill_rate: Option<f64>,
    pub fields_attempted: i64,
    pub fields_filled: i64,
    pub fields_skipped: i64,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ApplyRun {
    pub fn start(
        user_id: impl Into<String>,
        task_id: Option<Uuid>,
        job_id: Option<String>,
        initial_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let initial_url = initial_url.into();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            job_id,
            task_id,
            current_url: initial_url.clone(),
            initial_url,
            ats_kind: None,
            intent: None,
            stage: None,
            status: RunStatus::InProgress,
            fill_rate: None,
            fields_attempted: 0,
            fields_filled: 0,
            fields_skipped: 0,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }
}

/// A field-level patch applied by [`crate::store::RunStore::update_run`].
/// `None` leaves a field untouched; only `status` can move the run to a
/// terminal state.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub current_url: Option<String>,
    pub stage: Option<String>,
    pub intent: Option<String>,
    pub ats_kind: Option<String>,
    pub fill_rate: Option<f64>,
    pub fields_attempted: Option<i64>,
    pub fields_filled: Option<i64>,
    pub fields_skipped: Option<i64>,
    pub failure_reason: Option<String>,
    pub status: Option<RunStatus>,
}

/// A single observed event during a run, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub user_id: String,
    pub source: Source,
    pub severity: Severity,
    pub event_name: String,
    pub event_version: i32,
    pub ts: DateTime<Utc>,
    pub url: Option<String>,
    pub payload: Value,
    pub dedup_key: Option<String>,
    pub request_id: Option<String>,
    pub detection_id: Option<String>,
    pub page_id: Option<String>,
}

/// `expires_at` is always derived from this, never passed in directly, so
/// every session has a uniform two-hour TTL.
pub fn active_session_ttl() -> Duration {
    Duration::hours(2)
}

/// The per-user pointer to the currently in-flight run. Unique per `user_id`;
/// [`crate::store::RunStore::set_active_session`] replaces any prior row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveApplySession {
    pub user_id: String,
    pub task_id: Uuid,
    pub run_id: Uuid,
    pub job_url: String,
    pub ats_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActiveApplySession {
    pub fn new(
        user_id: impl Into<String>,
        task_id: Uuid,
        run_id: Uuid,
        job_url: impl Into<String>,
        ats_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            task_id,
            run_id,
            job_url: job_url.into(),
            ats_type,
            created_at: now,
            expires_at: now + active_session_ttl(),
            updated_at: now,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_expires_two_hours_out() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let session = ActiveApplySession::new("u1", Uuid::now_v7(), Uuid::now_v7(), "https://x", None, now);
        assert_eq!(session.expires_at, now + Duration::hours(2));
        assert!(session.is_live(now));
        assert!(!session.is_live(now + Duration::hours(3)));
    }

    #[test]
    fn run_starts_in_progress_with_current_url_matching_initial() {
        let now = Utc::now();
        let run = ApplyRun::start("u1", None, None, "https://x/apply", now);
        assert_eq!(run.status, RunStatus::InProgress);
        assert_eq!(run.current_url, run.initial_url);
    }
}
