use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::store::StoreClient;

use super::models::{ActivityFailure, JobStatus, WorkflowJob};

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),
    #[error("Job persistence failed: {0}")]
    Persistence(String),
}

/// Persistence seam for workflow jobs.
///
/// Status transitions (plus the failure context saved with a FAILED
/// transition) are the only mutations ever performed on a job.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<WorkflowJob, JobStoreError>;

    async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<(), JobStoreError>;

    /// Transitions the job to FAILED and records which step failed.
    async fn mark_failed(&self, id: Uuid, failure: &ActivityFailure) -> Result<(), JobStoreError>;

    /// Jobs currently eligible to run (PENDING or FAILED).
    async fn list_runnable(&self) -> Result<Vec<WorkflowJob>, JobStoreError>;
}

/// Doc-store-backed job store.
pub struct DocJobStore {
    client: Arc<StoreClient>,
}

impl DocJobStore {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobRef {
    id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate<'a> {
    id: Uuid,
    status: JobStatus,
    updated_at: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_failure: Option<&'a ActivityFailure>,
}

#[async_trait]
impl JobStore for DocJobStore {
    async fn load(&self, id: Uuid) -> Result<WorkflowJob, JobStoreError> {
        match self.client.execute::<WorkflowJob, _>("getJob", &JobRef { id }).await {
            Ok(job) => Ok(job),
            Err(e) if e.is_not_found() => Err(JobStoreError::NotFound(id)),
            Err(e) => Err(JobStoreError::Persistence(e.to_string())),
        }
    }

    async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<(), JobStoreError> {
        debug!("Setting job {} status to {}", id, status);
        let update = StatusUpdate {
            id,
            status,
            updated_at: Utc::now(),
            last_failure: None,
        };
        self.client
            .execute::<serde_json::Value, _>("setJobStatus", &update)
            .await
            .map_err(|e| JobStoreError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, failure: &ActivityFailure) -> Result<(), JobStoreError> {
        debug!("Marking job {} FAILED ({})", id, failure);
        let update = StatusUpdate {
            id,
            status: JobStatus::Failed,
            updated_at: Utc::now(),
            last_failure: Some(failure),
        };
        self.client
            .execute::<serde_json::Value, _>("setJobStatus", &update)
            .await
            .map_err(|e| JobStoreError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn list_runnable(&self) -> Result<Vec<WorkflowJob>, JobStoreError> {
        self.client
            .execute::<Vec<WorkflowJob>, _>("listRunnableJobs", &serde_json::json!({}))
            .await
            .map_err(|e| JobStoreError::Persistence(e.to_string()))
    }
}

/// In-memory job store for tests and local runs. Keeps a per-job history of
/// persisted status transitions.
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, WorkflowJob>>,
    transitions: RwLock<Vec<(Uuid, JobStatus)>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            transitions: RwLock::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, job: WorkflowJob) -> Uuid {
        let id = job.id;
        self.jobs.write().insert(id, job);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<WorkflowJob> {
        self.jobs.read().get(&id).cloned()
    }

    /// Statuses persisted for one job, in order.
    pub fn transitions(&self, id: Uuid) -> Vec<JobStatus> {
        self.transitions
            .read()
            .iter()
            .filter(|(job_id, _)| *job_id == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load(&self, id: Uuid) -> Result<WorkflowJob, JobStoreError> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(JobStoreError::NotFound(id))
    }

    async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.status = status;
        job.updated_at = Some(Utc::now());
        self.transitions.write().push((id, status));
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, failure: &ActivityFailure) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.status = JobStatus::Failed;
        job.last_failure = Some(failure.clone());
        job.updated_at = Some(Utc::now());
        self.transitions.write().push((id, JobStatus::Failed));
        Ok(())
    }

    async fn list_runnable(&self) -> Result<Vec<WorkflowJob>, JobStoreError> {
        Ok(self
            .jobs
            .read()
            .values()
            .filter(|job| job.status.is_runnable())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UserKey;
    use crate::workflow::models::RequestKind;

    #[tokio::test]
    async fn test_in_memory_transitions() {
        let store = InMemoryJobStore::new();
        let id = store.enqueue(WorkflowJob::new(UserKey::new("USR01"), RequestKind::Erase));

        store.set_status(id, JobStatus::Wip).await.unwrap();
        assert_eq!(store.get(id).unwrap().status, JobStatus::Wip);

        let failure = ActivityFailure::new("notify-user", "smtp down");
        store.mark_failed(id, &failure).await.unwrap();
        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_failure, Some(failure));
    }

    #[tokio::test]
    async fn test_list_runnable_skips_terminal_and_wip() {
        let store = InMemoryJobStore::new();
        let pending = store.enqueue(WorkflowJob::new(UserKey::new("A"), RequestKind::Erase));
        let wip = store.enqueue(WorkflowJob::new(UserKey::new("B"), RequestKind::Erase));
        let failed = store.enqueue(WorkflowJob::new(UserKey::new("C"), RequestKind::Erase));
        store.set_status(wip, JobStatus::Wip).await.unwrap();
        store
            .mark_failed(failed, &ActivityFailure::new("erase-user-data", "boom"))
            .await
            .unwrap();

        let runnable: Vec<Uuid> = store
            .list_runnable()
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.id)
            .collect();
        assert!(runnable.contains(&pending));
        assert!(runnable.contains(&failed));
        assert!(!runnable.contains(&wip));
    }

    #[tokio::test]
    async fn test_missing_job_is_reported() {
        let store = InMemoryJobStore::new();
        let result = store.load(Uuid::new_v4()).await;
        assert!(matches!(result, Err(JobStoreError::NotFound(_))));
    }
}
