use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::EntityRecord;

/// Deterministic address of one backup artifact:
/// `<folder>/<entityType>--<id>[--<version>].json`.
///
/// The path is a pure function of the record's identity, so re-running a
/// cascade overwrites the same artifact instead of accumulating copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactPath(String);

impl ArtifactPath {
    pub fn for_record(folder: &str, record: &EntityRecord) -> Self {
        let name = match record.version {
            Some(version) => format!("{}--{}--{}", record.kind, record.id, version),
            None => format!("{}--{}", record.kind, record.id),
        };
        ArtifactPath(format!("{}/{}.json", folder.trim_end_matches('/'), name))
    }

    /// Address of a whole-user export bundle.
    pub fn for_export(folder: &str, user_key: &str) -> Self {
        ArtifactPath(format!("{}/{}.json", folder.trim_end_matches('/'), user_key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityKind;

    fn record(kind: EntityKind, id: &str, version: Option<u32>) -> EntityRecord {
        EntityRecord {
            kind,
            id: id.to_string(),
            version,
            parent_id: None,
            body: serde_json::json!({}),
        }
    }

    #[test]
    fn test_versioned_path() {
        let path = ArtifactPath::for_record("user-data", &record(EntityKind::Profile, "USR01", Some(2)));
        assert_eq!(path.as_str(), "user-data/profile--USR01--2.json");
    }

    #[test]
    fn test_unversioned_path() {
        let path = ArtifactPath::for_record("user-data/", &record(EntityKind::Message, "msg-7", None));
        assert_eq!(path.as_str(), "user-data/message--msg-7.json");
    }

    #[test]
    fn test_path_is_deterministic() {
        let a = ArtifactPath::for_record("f", &record(EntityKind::Notification, "n-1", None));
        let b = ArtifactPath::for_record("f", &record(EntityKind::Notification, "n-1", None));
        assert_eq!(a, b);
    }
}
