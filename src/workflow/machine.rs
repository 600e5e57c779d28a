use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{ActivityFailure, JobStatus, RunOutcome, StepOutcome, WorkflowJob};
use super::retry::RetryPolicy;
use super::store::{JobStore, JobStoreError};

/// Name reported when persisting a status transition itself fails; the
/// status being set is recorded in the failure's `extra`.
pub const SET_STATUS_ACTIVITY: &str = "set-job-status";

/// One retryable unit of business work.
///
/// Steps must be idempotent: a job can be re-offered after a crash and every
/// step may run again. A step sees only the persisted job, never ambient
/// state, so a replay makes the same decisions.
#[async_trait]
pub trait WorkflowStep: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, job: &WorkflowJob) -> StepOutcome;
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Job store failed: {0}")]
    Store(#[from] JobStoreError),

    /// The FAILED transition itself could not be persisted. Nothing retries
    /// this: the job is in an unknown state and needs operator attention.
    #[error("Could not persist FAILED status for job {job_id}: {reason}")]
    FailurePersist { job_id: Uuid, reason: String },
}

/// Drives one job through PENDING → WIP → {CLOSED | FAILED}.
///
/// Only PENDING and FAILED jobs are accepted; WIP and CLOSED jobs yield
/// `NotProcessable` without touching any step. Every status transition is
/// persisted before the next decision, so what runs next depends only on
/// stored state and prior step outcomes.
pub struct WorkflowStateMachine {
    store: Arc<dyn JobStore>,
    steps: Vec<Arc<dyn WorkflowStep>>,
    retry: RetryPolicy,
}

impl WorkflowStateMachine {
    pub fn new(
        store: Arc<dyn JobStore>,
        steps: Vec<Arc<dyn WorkflowStep>>,
        retry: RetryPolicy,
    ) -> Self {
        Self { store, steps, retry }
    }

    pub async fn run(&self, job_id: Uuid) -> Result<RunOutcome, WorkflowError> {
        let mut job = self.store.load(job_id).await?;

        if !job.status.is_runnable() {
            info!("Job {} is {} - skipping", job.id, job.status);
            return Ok(RunOutcome::NotProcessable(job.status));
        }
        info!("Starting workflow for job {} (user {})", job.id, job.user_key);

        if let Err(e) = self.store.set_status(job.id, JobStatus::Wip).await {
            let failure = ActivityFailure::new(SET_STATUS_ACTIVITY, e.to_string())
                .with_extra(json!({ "status": JobStatus::Wip }));
            return self.demote(job.id, failure).await;
        }
        job.status = JobStatus::Wip;

        let mut value = Value::Null;
        for step in &self.steps {
            debug!("Running step {} for job {}", step.name(), job.id);
            match self.retry.run(step.name(), || step.execute(&job)).await {
                Ok(step_value) => value = step_value,
                Err(failure) => return self.demote(job.id, failure).await,
            }
        }

        if let Err(e) = self.store.set_status(job.id, JobStatus::Closed).await {
            let failure = ActivityFailure::new(SET_STATUS_ACTIVITY, e.to_string())
                .with_extra(json!({ "status": JobStatus::Closed }));
            return self.demote(job.id, failure).await;
        }

        info!("Job {} closed", job.id);
        Ok(RunOutcome::Completed(value))
    }

    async fn demote(
        &self,
        job_id: Uuid,
        failure: ActivityFailure,
    ) -> Result<RunOutcome, WorkflowError> {
        warn!("Job {} failed at {}", job_id, failure);
        self.store
            .mark_failed(job_id, &failure)
            .await
            .map_err(|e| WorkflowError::FailurePersist {
                job_id,
                reason: e.to_string(),
            })?;
        Ok(RunOutcome::Failed(failure))
    }
}
