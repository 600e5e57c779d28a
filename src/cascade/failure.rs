use serde::{Deserialize, Serialize};

use crate::core::error::DataFailure;

/// Input of one cascade activity invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeInput {
    pub backup_folder: String,
    pub user_key: String,
}

impl CascadeInput {
    pub fn new(backup_folder: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            backup_folder: backup_folder.into(),
            user_key: user_key.into(),
        }
    }

    /// Malformed input is never retried, so it is rejected before any I/O.
    pub fn validate(&self) -> Result<(), DataFailure> {
        if self.backup_folder.trim().is_empty() {
            return Err(DataFailure::InvalidInput(
                "backupFolder must be a non-empty string".to_string(),
            ));
        }
        if self.user_key.trim().is_empty() {
            return Err(DataFailure::InvalidInput(
                "userKey must be a non-empty string".to_string(),
            ));
        }
        if self.user_key.contains('/') {
            return Err(DataFailure::InvalidInput(
                "userKey must not contain path separators".to_string(),
            ));
        }
        Ok(())
    }
}

/// Externally visible outcome of one activity, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActivityResult {
    #[serde(rename = "SUCCESS")]
    Success,

    #[serde(rename = "USER_NOT_FOUND_FAILURE")]
    UserNotFound,

    #[serde(rename = "QUERY_FAILURE")]
    QueryFailure {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },

    #[serde(rename = "INVALID_INPUT_FAILURE")]
    InvalidInput { reason: String },

    #[serde(rename = "BLOB_FAILURE")]
    BlobFailure { reason: String },

    #[serde(rename = "DELETE_FAILURE")]
    DeleteFailure { reason: String },
}

impl ActivityResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ActivityResult::Success)
    }
}

impl From<DataFailure> for ActivityResult {
    fn from(failure: DataFailure) -> Self {
        match failure {
            DataFailure::InvalidInput(reason) => ActivityResult::InvalidInput { reason },
            DataFailure::UserNotFound => ActivityResult::UserNotFound,
            DataFailure::Query { reason, query } => ActivityResult::QueryFailure { reason, query },
            DataFailure::Blob(reason) => ActivityResult::BlobFailure { reason },
            DataFailure::Delete(reason) => ActivityResult::DeleteFailure { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_validation() {
        assert!(CascadeInput::new("user-data", "USR01").validate().is_ok());
        assert!(CascadeInput::new("", "USR01").validate().is_err());
        assert!(CascadeInput::new("user-data", "  ").validate().is_err());
        assert!(CascadeInput::new("user-data", "../USR01").validate().is_err());
    }

    #[test]
    fn test_input_wire_shape() {
        let input: CascadeInput =
            serde_json::from_str(r#"{"backupFolder":"user-data","userKey":"USR01"}"#).unwrap();
        assert_eq!(input.backup_folder, "user-data");
        assert_eq!(input.user_key, "USR01");
    }

    #[test]
    fn test_result_tagging() {
        let success = serde_json::to_value(ActivityResult::Success).unwrap();
        assert_eq!(success, serde_json::json!({"kind": "SUCCESS"}));

        let failure = serde_json::to_value(ActivityResult::QueryFailure {
            reason: "timeout".to_string(),
            query: Some("listMessagesForUser".to_string()),
        })
        .unwrap();
        assert_eq!(failure["kind"], "QUERY_FAILURE");
        assert_eq!(failure["query"], "listMessagesForUser");

        let no_query = serde_json::to_value(ActivityResult::QueryFailure {
            reason: "timeout".to_string(),
            query: None,
        })
        .unwrap();
        assert!(no_query.get("query").is_none());
    }

    #[test]
    fn test_failure_mapping_is_total() {
        let cases = vec![
            DataFailure::InvalidInput("bad".to_string()),
            DataFailure::UserNotFound,
            DataFailure::query("boom", "getProfile"),
            DataFailure::Blob("disk full".to_string()),
            DataFailure::Delete("conflict".to_string()),
        ];
        for failure in cases {
            assert!(!ActivityResult::from(failure).is_success());
        }
    }
}
