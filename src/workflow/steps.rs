use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::cascade::{ActivityResult, CascadeInput, CascadeOrchestrator};
use crate::store::UserKey;

use super::machine::WorkflowStep;
use super::models::{ActivityFailure, StepOutcome, WorkflowJob};

pub const EXTRACT_STEP: &str = "extract-user-data";
pub const ERASE_STEP: &str = "erase-user-data";
pub const NOTIFY_STEP: &str = "notify-user";

const NOTIFY_TIMEOUT_SECS: u64 = 30;

/// Maps a non-success activity result into the step failure report, keeping
/// the full typed result in `extra` for operators.
fn step_failure(step_name: &str, result: ActivityResult) -> ActivityFailure {
    let reason = match &result {
        ActivityResult::Success => "unexpected success".to_string(),
        ActivityResult::UserNotFound => "user not found".to_string(),
        ActivityResult::QueryFailure { reason, .. } => reason.clone(),
        ActivityResult::InvalidInput { reason } => reason.clone(),
        ActivityResult::BlobFailure { reason } => reason.clone(),
        ActivityResult::DeleteFailure { reason } => reason.clone(),
    };
    let extra = serde_json::to_value(&result).unwrap_or(serde_json::Value::Null);
    ActivityFailure::new(step_name, reason).with_extra(extra)
}

/// Export the user's records into a single backup bundle.
pub struct ExtractUserDataStep {
    orchestrator: Arc<CascadeOrchestrator>,
    backup_folder: String,
}

impl ExtractUserDataStep {
    pub fn new(orchestrator: Arc<CascadeOrchestrator>, backup_folder: impl Into<String>) -> Self {
        Self {
            orchestrator,
            backup_folder: backup_folder.into(),
        }
    }
}

#[async_trait]
impl WorkflowStep for ExtractUserDataStep {
    fn name(&self) -> &str {
        EXTRACT_STEP
    }

    async fn execute(&self, job: &WorkflowJob) -> StepOutcome {
        let input = CascadeInput::new(&self.backup_folder, job.user_key.as_str());
        match self.orchestrator.export_user(&input).await {
            ActivityResult::Success => Ok(json!({ "kind": "SUCCESS" })),
            failure => Err(step_failure(EXTRACT_STEP, failure)),
        }
    }
}

/// Run the backup-then-delete cascade for the job's user.
pub struct EraseUserDataStep {
    orchestrator: Arc<CascadeOrchestrator>,
    backup_folder: String,
}

impl EraseUserDataStep {
    pub fn new(orchestrator: Arc<CascadeOrchestrator>, backup_folder: impl Into<String>) -> Self {
        Self {
            orchestrator,
            backup_folder: backup_folder.into(),
        }
    }
}

#[async_trait]
impl WorkflowStep for EraseUserDataStep {
    fn name(&self) -> &str {
        ERASE_STEP
    }

    async fn execute(&self, job: &WorkflowJob) -> StepOutcome {
        let input = CascadeInput::new(&self.backup_folder, job.user_key.as_str());
        match self.orchestrator.erase_user(&input).await {
            ActivityResult::Success => Ok(json!({ "kind": "SUCCESS" })),
            failure => Err(step_failure(ERASE_STEP, failure)),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notifier rejected the request: {0}")]
    Rejected(String),
}

/// Tells the user their request completed. Formatting and delivery live
/// behind this seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_completion(&self, user: &UserKey) -> Result<(), NotifyError>;
}

/// Notifier over a plain HTTP endpoint.
pub struct HttpNotifier {
    http: Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        info!("HttpNotifier initialized (url={})", base_url);
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest<'a> {
    user_key: &'a str,
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify_completion(&self, user: &UserKey) -> Result<(), NotifyError> {
        debug!("Notifying user {}", user);
        let response = self
            .http
            .post(format!("{}/notifications", self.base_url))
            .json(&NotifyRequest { user_key: user.as_str() })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}

/// Notify the user that their request has been fulfilled.
pub struct NotifyUserStep {
    notifier: Arc<dyn Notifier>,
}

impl NotifyUserStep {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl WorkflowStep for NotifyUserStep {
    fn name(&self) -> &str {
        NOTIFY_STEP
    }

    async fn execute(&self, job: &WorkflowJob) -> StepOutcome {
        match self.notifier.notify_completion(&job.user_key).await {
            Ok(()) => Ok(json!({ "notified": true })),
            Err(e) => Err(ActivityFailure::new(NOTIFY_STEP, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupSink;
    use crate::cascade::testing::{MemSink, MemStore};
    use crate::store::EntityKind;
    use crate::workflow::machine::WorkflowStateMachine;
    use crate::workflow::models::{JobStatus, RequestKind, RunOutcome};
    use crate::workflow::retry::RetryPolicy;
    use crate::workflow::store::{InMemoryJobStore, JobStore};
    use parking_lot::Mutex;

    struct MemNotifier {
        notified: Mutex<Vec<String>>,
        fail: Mutex<bool>,
    }

    impl MemNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                notified: Mutex::new(Vec::new()),
                fail: Mutex::new(false),
            })
        }
    }

    #[async_trait]
    impl Notifier for MemNotifier {
        async fn notify_completion(&self, user: &UserKey) -> Result<(), NotifyError> {
            if *self.fail.lock() {
                return Err(NotifyError::Rejected("smtp down".to_string()));
            }
            self.notified.lock().push(user.to_string());
            Ok(())
        }
    }

    fn profile(user: &str) -> crate::store::EntityRecord {
        crate::store::EntityRecord {
            kind: EntityKind::Profile,
            id: user.to_string(),
            version: Some(1),
            parent_id: Some(user.to_string()),
            body: json!({"email": "user@example.com"}),
        }
    }

    fn setup(store: Arc<MemStore>) -> (Arc<CascadeOrchestrator>, Arc<MemSink>) {
        let sink = Arc::new(MemSink::new(Arc::clone(&store.log)));
        let orchestrator = Arc::new(CascadeOrchestrator::new(
            store,
            Arc::clone(&sink) as Arc<dyn BackupSink>,
        ));
        (orchestrator, sink)
    }

    #[tokio::test]
    async fn test_erase_workflow_end_to_end() {
        let store = Arc::new(MemStore::new());
        store.insert(profile("USR01"));
        let (orchestrator, sink) = setup(Arc::clone(&store));
        let notifier = MemNotifier::new();

        let jobs = Arc::new(InMemoryJobStore::new());
        let id = jobs.enqueue(WorkflowJob::new(UserKey::new("USR01"), RequestKind::Erase));

        let machine = WorkflowStateMachine::new(
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            vec![
                Arc::new(EraseUserDataStep::new(Arc::clone(&orchestrator), "user-data")),
                Arc::new(NotifyUserStep::new(Arc::clone(&notifier) as Arc<dyn Notifier>)),
            ],
            RetryPolicy::single_attempt(),
        );
        let outcome = machine.run(id).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(jobs.get(id).unwrap().status, JobStatus::Closed);
        assert_eq!(store.count(EntityKind::Profile), 0);
        assert_eq!(sink.saved_paths(), vec!["user-data/profile--USR01--1.json"]);
        assert_eq!(*notifier.notified.lock(), vec!["USR01".to_string()]);
    }

    #[tokio::test]
    async fn test_extract_step_reports_unknown_user() {
        let store = Arc::new(MemStore::new());
        let (orchestrator, _sink) = setup(Arc::clone(&store));
        let step = ExtractUserDataStep::new(orchestrator, "user-data");
        let job = WorkflowJob::new(UserKey::new("GHOST"), RequestKind::Export);

        let failure = step.execute(&job).await.unwrap_err();

        assert_eq!(failure.activity_name, EXTRACT_STEP);
        assert_eq!(failure.reason, "user not found");
        assert_eq!(
            failure.extra.unwrap()["kind"],
            "USER_NOT_FOUND_FAILURE"
        );
    }

    #[tokio::test]
    async fn test_erase_step_carries_typed_failure_in_extra() {
        let store = Arc::new(MemStore::new());
        store.insert(profile("USR01"));
        let (orchestrator, sink) = setup(Arc::clone(&store));
        sink.fail_on("user-data/profile--USR01--1.json");
        let step = EraseUserDataStep::new(orchestrator, "user-data");
        let job = WorkflowJob::new(UserKey::new("USR01"), RequestKind::Erase);

        let failure = step.execute(&job).await.unwrap_err();

        assert_eq!(failure.activity_name, ERASE_STEP);
        assert_eq!(failure.extra.unwrap()["kind"], "BLOB_FAILURE");
    }

    #[tokio::test]
    async fn test_notify_failure_becomes_activity_failure() {
        let notifier = MemNotifier::new();
        *notifier.fail.lock() = true;
        let step = NotifyUserStep::new(Arc::clone(&notifier) as Arc<dyn Notifier>);
        let job = WorkflowJob::new(UserKey::new("USR01"), RequestKind::Erase);

        let failure = step.execute(&job).await.unwrap_err();

        assert_eq!(failure.activity_name, NOTIFY_STEP);
        assert!(failure.reason.contains("smtp down"));
    }
}
