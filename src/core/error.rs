use thiserror::Error;

/// Top-level error for library consumers that don't care which layer failed.
#[derive(Error, Debug)]
pub enum LetheError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Backup store error: {0}")]
    Backup(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LetheError>;

/// Failure of a single cascade operation against the primary or backup store.
///
/// This is the closed sum every cascade layer returns; each variant names the
/// stage that failed so an operator can re-run the right one. Every
/// consumption site matches it exhaustively.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataFailure {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Query failed: {reason}")]
    Query {
        reason: String,
        query: Option<String>,
    },

    #[error("Backup write failed: {0}")]
    Blob(String),

    #[error("Delete failed: {0}")]
    Delete(String),
}

impl DataFailure {
    pub fn query(reason: impl Into<String>, query: &str) -> Self {
        DataFailure::Query {
            reason: reason.into(),
            query: Some(query.to_string()),
        }
    }
}

impl From<DataFailure> for LetheError {
    fn from(failure: DataFailure) -> Self {
        match failure {
            DataFailure::InvalidInput(reason) => LetheError::Config(reason),
            DataFailure::UserNotFound => LetheError::Store("user not found".to_string()),
            DataFailure::Query { reason, .. } => LetheError::Store(reason),
            DataFailure::Blob(reason) => LetheError::Backup(reason),
            DataFailure::Delete(reason) => LetheError::Store(reason),
        }
    }
}
