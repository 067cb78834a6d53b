//! In-memory storage for testing and local development.
//!
//! Not suitable for production: all data is lost on restart and the "atomic"
//! guarantees rely on a single process-wide lock rather than real
//! transactions.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RunStore, TaskPage, TaskStore};
use crate::error::Result;
use crate::run::{ActiveApplySession, ApplyRun, ObservabilityEvent, RunPatch};
use crate::task::{Task, TaskEvent, TaskStatus};

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
    events: RwLock<Vec<TaskEvent>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert_queued(&self, task: Task, initial_event: TaskEvent) -> Result<Task> {
        let inserted = task.clone();
        self.tasks.write().unwrap().insert(task.id, task);
        self.events.write().unwrap().push(initial_event);
        Ok(inserted)
    }

    async fn active_job_ids(&self, user_id: &str, job_ids: &[String]) -> Result<Vec<String>> {
        let tasks = self.tasks.read().unwrap();
        let active: Vec<String> = tasks
            .values()
            .filter(|t| {
                t.user_id == user_id
                    && job_ids.contains(&t.job_id)
                    && matches!(
                        t.status,
                        TaskStatus::Queued | TaskStatus::InProgress | TaskStatus::NeedsUser
                    )
            })
            .map(|t| t.job_id.clone())
            .collect();
        Ok(active)
    }

    async fn list(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<TaskPage> {
        let tasks = self.tasks.read().unwrap();
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|t| t.user_id == user_id && status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok(TaskPage { tasks: page, total })
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.read().unwrap().get(&task_id).cloned())
    }

    async fn apply_transition(
        &self,
        expected_status: TaskStatus,
        updated: Task,
        event: TaskEvent,
    ) -> Result<Option<(Task, TaskEvent)>> {
        let mut tasks = self.tasks.write().unwrap();
        let Some(current) = tasks.get(&updated.id) else {
            return Ok(None);
        };
        if current.status != expected_status {
            return Ok(None);
        }
        tasks.insert(updated.id, updated.clone());
        drop(tasks);
        self.events.write().unwrap().push(event.clone());
        Ok(Some((updated, event)))
    }
}

#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<Uuid, ApplyRun>>,
    events: RwLock<HashMap<Uuid, Vec<ObservabilityEvent>>>,
    sessions: RwLock<HashMap<String, ActiveApplySession>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn start_run(
        &self,
        user_id: &str,
        task_id: Option<Uuid>,
        job_id: Option<String>,
        initial_url: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyRun> {
        let run = ApplyRun::start(user_id, task_id, job_id, initial_url, now);
        self.runs.write().unwrap().insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_run(&self, run_id: Uuid, patch: RunPatch, now: DateTime<Utc>) -> Result<ApplyRun> {
        let mut runs = self.runs.write().unwrap();
        let run = runs
            .get_mut(&run_id)
            .ok_or(crate::error::OrchestratorError::RunNotFound { run_id })?;

        if let Some(url) = patch.current_url {
            run.current_url = url;
        }
        if let Some(stage) = patch.stage {
            run.stage = Some(stage);
        }
        if let Some(intent) = patch.intent {
            run.intent = Some(intent);
        }
        if let Some(ats_kind) = patch.ats_kind {
            run.ats_kind = Some(ats_kind);
        }
        if let Some(fill_rate) = patch.fill_rate {
            run.fill_rate = Some(fill_rate);
        }
        if let Some(attempted) = patch.fields_attempted {
            run.fields_attempted = attempted;
        }
        if let Some(filled) = patch.fields_filled {
            run.fields_filled = filled;
        }
        if let Some(skipped) = patch.fields_skipped {
            run.fields_skipped = skipped;
        }
        if let Some(reason) = patch.failure_reason {
            run.failure_reason = Some(reason);
        }
        if let Some(status) = patch.status {
            run.status = status;
            if status.is_terminal() {
                run.ended_at = Some(now);
            }
        }
        run.updated_at = now;

        Ok(run.clone())
    }

    async fn append_event(&self, event: ObservabilityEvent) -> Result<()> {
        self.events
            .write()
            .unwrap()
            .entry(event.run_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn list_events(&self, run_id: Uuid) -> Result<Vec<ObservabilityEvent>> {
        let mut events = self.events.read().unwrap().get(&run_id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.ts);
        Ok(events)
    }

    async fn set_active_session(
        &self,
        user_id: &str,
        task_id: Uuid,
        run_id: Uuid,
        job_url: &str,
        ats_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ActiveApplySession> {
        let session = ActiveApplySession::new(user_id, task_id, run_id, job_url, ats_type, now);
        self.sessions
            .write()
            .unwrap()
            .insert(user_id.to_string(), session.clone());
        Ok(session)
    }

    async fn get_active_session(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<ActiveApplySession>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions
            .get(user_id)
            .filter(|s| s.is_live(now))
            .cloned())
    }

    async fn clear_active_session(&self, user_id: &str) -> Result<()> {
        self.sessions.write().unwrap().remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let store = MemoryTaskStore::new();
        let task = Task::new("u1", "j1", 500, now());
        let event = TaskEvent::initial(task.id, TaskStatus::Queued, serde_json::Value::Null, now());
        store.insert_queued(task.clone(), event).await.unwrap();
        let fetched = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, task.id);
    }

    #[tokio::test]
    async fn list_orders_by_priority_desc_then_created_at_asc() {
        let store = MemoryTaskStore::new();
        let t1 = Task::new("u1", "j1", 100, now());
        let t2 = Task::new("u1", "j2", 900, now());
        for t in [t1.clone(), t2.clone()] {
            let event = TaskEvent::initial(t.id, TaskStatus::Queued, serde_json::Value::Null, now());
            store.insert_queued(t, event).await.unwrap();
        }
        let page = store.list("u1", None, 10, 0).await.unwrap();
        assert_eq!(page.tasks[0].id, t2.id);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn apply_transition_rejects_stale_expected_status() {
        let store = MemoryTaskStore::new();
        let task = Task::new("u1", "j1", 500, now());
        let event = TaskEvent::initial(task.id, TaskStatus::Queued, serde_json::Value::Null, now());
        store.insert_queued(task.clone(), event).await.unwrap();

        let mut updated = task.clone();
        updated.status = TaskStatus::InProgress;
        let transition_event = TaskEvent::transition(
            task.id,
            TaskStatus::Queued,
            TaskStatus::InProgress,
            None,
            serde_json::Value::Null,
            now(),
        );

        let result = store
            .apply_transition(TaskStatus::InProgress, updated, transition_event)
            .await
            .unwrap();
        assert!(result.is_none(), "expected status mismatch should lose the CAS");
    }

    #[tokio::test]
    async fn active_session_not_returned_once_expired() {
        let store = MemoryRunStore::new();
        let past = now() - chrono::Duration::hours(3);
        store
            .set_active_session("u1", Uuid::now_v7(), Uuid::now_v7(), "https://x", None, past)
            .await
            .unwrap();
        assert!(store.get_active_session("u1", now()).await.unwrap().is_none());
    }
}
