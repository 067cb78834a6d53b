//! Storage traits for the task queue/FSM and the run/session bookkeeping.
//!
//! Split into two focused traits, mirroring how the scoring side keeps
//! concerns separate: `TaskStore` owns the queue and its state machine,
//! `RunStore` owns apply runs, their observability trail, and the per-user
//! active session handoff.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::run::{ActiveApplySession, ApplyRun, ObservabilityEvent, RunPatch};
use crate::task::{Task, TaskEvent, TaskStatus};

/// One page of a task listing together with the unfiltered total for the
/// same `user_id` + `status` combination.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: i64,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a queued task and its synthetic initial event, atomically.
    async fn insert_queued(&self, task: Task, initial_event: TaskEvent) -> Result<Task>;

    /// Tasks for `user_id` currently in one of `{queued, in_progress, needs_user}`,
    /// restricted to the given `job_id`s — used by `enqueue` to honor
    /// the no-duplicate-active-task invariant.
    async fn active_job_ids(&self, user_id: &str, job_ids: &[String]) -> Result<Vec<String>>;

    async fn list(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<TaskPage>;

    async fn get(&self, task_id: Uuid) -> Result<Option<Task>>;

    /// Atomically persist `updated` (the task after the transition) and
    /// `event`, but only if the task's status still matches `expected_status`
    /// — a compare-and-swap on `(task_id, status)`, so a losing racer's
    /// update is rejected rather than silently overwritten. Returns
    /// `Ok(None)` if the CAS lost the race.
    async fn apply_transition(
        &self,
        expected_status: TaskStatus,
        updated: Task,
        event: TaskEvent,
    ) -> Result<Option<(Task, TaskEvent)>>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn start_run(
        &self,
        user_id: &str,
        task_id: Option<Uuid>,
        job_id: Option<String>,
        initial_url: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyRun>;

    async fn update_run(&self, run_id: Uuid, patch: RunPatch, now: DateTime<Utc>) -> Result<ApplyRun>;

    async fn append_event(&self, event: ObservabilityEvent) -> Result<()>;

    async fn list_events(&self, run_id: Uuid) -> Result<Vec<ObservabilityEvent>>;

    async fn set_active_session(
        &self,
        user_id: &str,
        task_id: Uuid,
        run_id: Uuid,
        job_url: &str,
        ats_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ActiveApplySession>;

    async fn get_active_session(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<ActiveApplySession>>;

    async fn clear_active_session(&self, user_id: &str) -> Result<()>;
}

/// Opaque per-transition metadata, kept as raw JSON since its shape is
/// caller-defined (mirrors `task_metadata` and `payload` elsewhere).
pub type Details = Value;
