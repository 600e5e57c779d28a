pub mod machine;
pub mod models;
pub mod retry;
pub mod steps;
pub mod store;

pub use machine::{WorkflowError, WorkflowStateMachine, WorkflowStep, SET_STATUS_ACTIVITY};
pub use models::{
    ActivityFailure, JobStatus, RequestKind, RunOutcome, StepOutcome, WorkflowJob,
};
pub use retry::RetryPolicy;
pub use steps::{
    EraseUserDataStep, ExtractUserDataStep, HttpNotifier, Notifier, NotifyError, NotifyUserStep,
    ERASE_STEP, EXTRACT_STEP, NOTIFY_STEP,
};
pub use store::{DocJobStore, InMemoryJobStore, JobStore, JobStoreError};
