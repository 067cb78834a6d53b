//! Postgres-backed `TaskStore`/`RunStore`, gated behind the `postgres` feature.
//!
//! Mirrors the compare-and-swap pattern used for job leasing elsewhere in the
//! stack: transitions are a single `UPDATE ... WHERE id = $1 AND status = $2`
//! whose returned row count tells the caller whether it won the race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{RunStore, TaskPage, TaskStore};
use crate::error::{OrchestratorError, Result};
use crate::run::{ActiveApplySession, ApplyRun, ObservabilityEvent, RunPatch, RunStatus};
use crate::task::{Task, TaskEvent, TaskStatus};

pub struct PostgresTaskStore {
    pool: PgPool,
}

impl PostgresTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn insert_queued(&self, task: Task, initial_event: TaskEvent) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(|e| OrchestratorError::Store(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, user_id, job_id, status, priority, attempt_count, last_error, task_metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(task.id)
        .bind(&task.user_id)
        .bind(&task.job_id)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(task.attempt_count)
        .bind(&task.last_error)
        .bind(&task.task_metadata)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;

        insert_event(&mut tx, &initial_event).await?;

        tx.commit().await.map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(task)
    }

    async fn active_job_ids(&self, user_id: &str, job_ids: &[String]) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT job_id FROM tasks
            WHERE user_id = $1
              AND job_id = ANY($2)
              AND status IN ('queued', 'in_progress', 'needs_user')
            "#,
        )
        .bind(user_id)
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn list(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<TaskPage> {
        let status_filter = status.map(|s| s.as_str());

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM tasks
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status_filter)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;

        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, job_id, status, priority, attempt_count, last_error, task_metadata, created_at, updated_at
            FROM tasks
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY priority DESC, created_at ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status_filter)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;

        Ok(TaskPage {
            tasks: rows.into_iter().map(TaskRow::into_task).collect(),
            total: total.0,
        })
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, job_id, status, priority, attempt_count, last_error, task_metadata, created_at, updated_at
            FROM tasks WHERE id = $1
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(row.map(TaskRow::into_task))
    }

    async fn apply_transition(
        &self,
        expected_status: TaskStatus,
        updated: Task,
        event: TaskEvent,
    ) -> Result<Option<(Task, TaskEvent)>> {
        let mut tx = self.pool.begin().await.map_err(|e| OrchestratorError::Store(e.into()))?;

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $1, attempt_count = $2, last_error = $3, updated_at = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(updated.status.as_str())
        .bind(updated.attempt_count)
        .bind(&updated.last_error)
        .bind(updated.updated_at)
        .bind(updated.id)
        .bind(expected_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| OrchestratorError::Store(e.into()))?;
            return Ok(None);
        }

        insert_event(&mut tx, &event).await?;
        tx.commit().await.map_err(|e| OrchestratorError::Store(e.into()))?;

        Ok(Some((updated, event)))
    }
}

async fn insert_event(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, event: &TaskEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO task_events (id, task_id, from_status, to_status, reason, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.id)
    .bind(event.task_id)
    .bind(&event.from_status)
    .bind(&event.to_status)
    .bind(&event.reason)
    .bind(&event.details)
    .bind(event.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| OrchestratorError::Store(e.into()))?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: String,
    job_id: String,
    status: String,
    priority: i64,
    attempt_count: i64,
    last_error: Option<String>,
    task_metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> Task {
        Task {
            id: self.id,
            user_id: self.user_id,
            job_id: self.job_id,
            status: parse_status(&self.status),
            priority: self.priority,
            attempt_count: self.attempt_count,
            last_error: self.last_error,
            task_metadata: self.task_metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn parse_status(raw: &str) -> TaskStatus {
    match raw {
        "queued" => TaskStatus::Queued,
        "in_progress" => TaskStatus::InProgress,
        "needs_user" => TaskStatus::NeedsUser,
        "success" => TaskStatus::Success,
        "failed" => TaskStatus::Failed,
        "canceled" => TaskStatus::Canceled,
        other => unreachable!("unknown task status `{other}` persisted in storage"),
    }
}

pub struct PostgresRunStore {
    pool: PgPool,
}

impl PostgresRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PostgresRunStore {
    async fn start_run(
        &self,
        user_id: &str,
        task_id: Option<Uuid>,
        job_id: Option<String>,
        initial_url: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyRun> {
        let run = ApplyRun::start(user_id, task_id, job_id, initial_url, now);

        sqlx::query(
            r#"
            INSERT INTO apply_runs (id, user_id, job_id, task_id, initial_url, current_url, status, fields_attempted, fields_filled, fields_skipped, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'in_progress', 0, 0, 0, $7, $7)
            "#,
        )
        .bind(run.id)
        .bind(&run.user_id)
        .bind(&run.job_id)
        .bind(run.task_id)
        .bind(&run.initial_url)
        .bind(&run.current_url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;

        Ok(run)
    }

    async fn update_run(&self, run_id: Uuid, patch: RunPatch, now: DateTime<Utc>) -> Result<ApplyRun> {
        // A real deployment would build this as a single dynamic UPDATE;
        // loading then re-saving keeps this reference implementation simple
        // and matches how the in-memory store behaves.
        let row: Option<RunRow> = sqlx::query_as("SELECT * FROM apply_runs WHERE id = $1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OrchestratorError::Store(e.into()))?;
        let mut run = row.ok_or(OrchestratorError::RunNotFound { run_id })?.into_run();

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

        sqlx::query(
            r#"
            UPDATE apply_runs SET
                current_url = $1, stage = $2, intent = $3, ats_kind = $4, fill_rate = $5,
                fields_attempted = $6, fields_filled = $7, fields_skipped = $8,
                failure_reason = $9, status = $10, ended_at = $11, updated_at = $12
            WHERE id = $13
            "#,
        )
        .bind(&run.current_url)
        .bind(&run.stage)
        .bind(&run.intent)
        .bind(&run.ats_kind)
        .bind(run.fill_rate)
        .bind(run.fields_attempted)
        .bind(run.fields_filled)
        .bind(run.fields_skipped)
        .bind(&run.failure_reason)
        .bind(status_str(run.status))
        .bind(run.ended_at)
        .bind(run.updated_at)
        .bind(run.id)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;

        Ok(run)
    }

    async fn append_event(&self, event: ObservabilityEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO observability_events
                (id, run_id, user_id, source, severity, event_name, event_version, ts, url, payload, dedup_key, request_id, detection_id, page_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(event.id)
        .bind(event.run_id)
        .bind(&event.user_id)
        .bind(format!("{:?}", event.source).to_lowercase())
        .bind(format!("{:?}", event.severity).to_lowercase())
        .bind(&event.event_name)
        .bind(event.event_version)
        .bind(event.ts)
        .bind(&event.url)
        .bind(&event.payload)
        .bind(&event.dedup_key)
        .bind(&event.request_id)
        .bind(&event.detection_id)
        .bind(&event.page_id)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(())
    }

    async fn list_events(&self, run_id: Uuid) -> Result<Vec<ObservabilityEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM observability_events WHERE run_id = $1 ORDER BY ts ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(rows.into_iter().map(EventRow::into_event).collect())
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
        sqlx::query(
            r#"
            INSERT INTO active_apply_sessions (user_id, task_id, run_id, job_url, ats_type, created_at, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                task_id = excluded.task_id, run_id = excluded.run_id, job_url = excluded.job_url,
                ats_type = excluded.ats_type, expires_at = excluded.expires_at, updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.user_id)
        .bind(session.task_id)
        .bind(session.run_id)
        .bind(&session.job_url)
        .bind(&session.ats_type)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(session)
    }

    async fn get_active_session(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<ActiveApplySession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT * FROM active_apply_sessions WHERE user_id = $1 AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(row.map(SessionRow::into_session))
    }

    async fn clear_active_session(&self, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM active_apply_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| OrchestratorError::Store(e.into()))?;
        Ok(())
    }
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::InProgress => "in_progress",
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
        RunStatus::Abandoned => "abandoned",
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    user_id: String,
    job_id: Option<String>,
    task_id: Option<Uuid>,
    initial_url: String,
    current_url: String,
    ats_kind: Option<String>,
    intent: Option<String>,
    stage: Option<String>,
    status: String,
    fill_rate: Option<f64>,
    fields_attempted: i64,
    fields_filled: i64,
    fields_skipped: i64,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRow {
    fn into_run(self) -> ApplyRun {
        let status = match self.status.as_str() {
            "in_progress" => RunStatus::InProgress,
            "success" => RunStatus::Success,
            "failed" => RunStatus::Failed,
            "abandoned" => RunStatus::Abandoned,
            other => unreachable!("unknown run status `{other}` persisted in storage"),
        };
        ApplyRun {
            id: self.id,
            user_id: self.user_id,
            job_id: self.job_id,
            task_id: self.task_id,
            initial_url: self.initial_url,
            current_url: self.current_url,
            ats_kind: self.ats_kind,
            intent: self.intent,
            stage: self.stage,
            status,
            fill_rate: self.fill_rate,
            fields_attempted: self.fields_attempted,
            fields_filled: self.fields_filled,
            fields_skipped: self.fields_skipped,
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ended_at: self.ended_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    run_id: Uuid,
    user_id: String,
    source: String,
    severity: String,
    event_name: String,
    event_version: i32,
    ts: DateTime<Utc>,
    url: Option<String>,
    payload: serde_json::Value,
    dedup_key: Option<String>,
    request_id: Option<String>,
    detection_id: Option<String>,
    page_id: Option<String>,
}

impl EventRow {
    fn into_event(self) -> ObservabilityEvent {
        use crate::run::{Severity, Source};
        let source = match self.source.as_str() {
            "extension" => Source::Extension,
            "backend" => Source::Backend,
            "web" => Source::Web,
            other => unreachable!("unknown event source `{other}` persisted in storage"),
        };
        let severity = match self.severity.as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warn" => Severity::Warn,
            "error" => Severity::Error,
            other => unreachable!("unknown event severity `{other}` persisted in storage"),
        };
        ObservabilityEvent {
            id: self.id,
            run_id: self.run_id,
            user_id: self.user_id,
            source,
            severity,
            event_name: self.event_name,
            event_version: self.event_version,
            ts: self.ts,
            url: self.url,
            payload: self.payload,
            dedup_key: self.dedup_key,
            request_id: self.request_id,
            detection_id: self.detection_id,
            page_id: self.page_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: String,
    task_id: Uuid,
    run_id: Uuid,
    job_url: String,
    ats_type: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> ActiveApplySession {
        ActiveApplySession {
            user_id: self.user_id,
            task_id: self.task_id,
            run_id: self.run_id,
            job_url: self.job_url,
            ats_type: self.ats_type,
            created_at: self.created_at,
            expires_at: self.expires_at,
            updated_at: self.updated_at,
        }
    }
}
