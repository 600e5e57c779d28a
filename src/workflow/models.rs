use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::store::UserKey;

/// Lifecycle status of a workflow job.
///
/// Transitions are monotonic: PENDING → WIP → {CLOSED | FAILED}. CLOSED and
/// FAILED are terminal; FAILED jobs may be offered again and restart from
/// WIP.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Wip,
    Closed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Closed | JobStatus::Failed)
    }

    /// Whether a job in this status may be (re)started.
    pub fn is_runnable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the enqueuer asked for; carried in the job payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Erase,
    Export,
}

/// A persisted unit of multi-step work.
///
/// Jobs are created externally and never deleted; status transitions (and
/// the failure context recorded with a FAILED transition) are the only
/// mutations this engine performs on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowJob {
    pub id: Uuid,
    pub user_key: UserKey,
    pub status: JobStatus,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<ActivityFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowJob {
    pub fn new(user_key: UserKey, request: RequestKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_key,
            status: JobStatus::Pending,
            payload: serde_json::json!({ "request": request }),
            last_failure: None,
            updated_at: None,
        }
    }

    /// The request kind recorded in the payload; defaults to ERASE for
    /// payloads enqueued without one.
    pub fn request_kind(&self) -> RequestKind {
        self.payload
            .get("request")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(RequestKind::Erase)
    }
}

/// Report of one failed workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFailure {
    pub activity_name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl ActivityFailure {
    pub fn new(activity_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            activity_name: activity_name.into(),
            reason: reason.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

impl fmt::Display for ActivityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.activity_name, self.reason)
    }
}

/// Outcome of one workflow step.
pub type StepOutcome = std::result::Result<Value, ActivityFailure>;

/// Outcome of offering one job to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// All steps succeeded; carries the final step's value.
    Completed(Value),
    /// The job was already WIP or CLOSED; nothing was run.
    NotProcessable(JobStatus),
    /// A step (or status persist) failed and the job was marked FAILED.
    Failed(ActivityFailure),
}
