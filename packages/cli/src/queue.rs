use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use orchestrator::store::memory::{MemoryRunStore, MemoryTaskStore};
use orchestrator::{ApplyOrchestrator, JobLookup, OrchestratorError, UserDirectory};
use scoring::PriorityInput;
use scoring::PriorityStrategy;

/// Every user id is accepted; the demo CLI has no user service to check against.
struct AnyUser;

#[async_trait]
impl UserDirectory for AnyUser {
    async fn exists(&self, _user_id: &str) -> Result<bool, OrchestratorError> {
        Ok(true)
    }
}

/// Resolves every job id to a priority input carrying only the score the
/// caller passed on the command line, since this harness has no job store.
struct FlatScore(f64);

#[async_trait]
impl JobLookup for FlatScore {
    async fn priority_input(&self, _job_id: &str) -> Result<Option<PriorityInput>, OrchestratorError> {
        Ok(Some(PriorityInput {
            decision: None,
            authenticity_score: Some(self.0),
            posted_at: None,
        }))
    }
}

pub async fn run(user_id: &str, job_id: &str, score: f64) -> Result<()> {
    let orchestrator = ApplyOrchestrator::new(
        MemoryTaskStore::new(),
        MemoryRunStore::new(),
        AnyUser,
        FlatScore(score),
    );

    let now = Utc::now();
    let tasks = orchestrator
        .enqueue(user_id, &[job_id.to_string()], PriorityStrategy::HighestScore, false, now)
        .await?;

    for task in tasks {
        println!("queued task {} for user {} job {} at priority {}", task.id, task.user_id, task.job_id, task.priority);
    }

    Ok(())
}
