use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use tracing::debug;

use crate::core::error::DataFailure;

use super::client::StoreClient;
use super::source::{DocStoreSource, PagedRecordSource};

/// Opaque identifier of the data subject (e.g. a fiscal code).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    pub fn new(value: impl Into<String>) -> Self {
        UserKey(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of entity types a user can own, directly or transitively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Profile,
    Message,
    MessageContent,
    MessageStatus,
    Notification,
    NotificationStatus,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the primary store, as produced by a paged query.
///
/// Versioned kinds store every historical revision as a separate record
/// sharing the logical `id`; `parent_id` points at the owning entity (the
/// user key itself for top-level kinds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub body: serde_json::Value,
}

impl EntityRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            kind: self.kind,
            id: self.id.clone(),
            version: self.version,
            partition: self.parent_id.clone(),
        }
    }
}

/// Primary key of one record (one version of it, for versioned kinds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub kind: EntityKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
}

/// How a paged query is scoped: by the owning user or by a parent record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    User(UserKey),
    Parent(String),
}

impl OwnerScope {
    pub fn value(&self) -> &str {
        match self {
            OwnerScope::User(user) => user.as_str(),
            OwnerScope::Parent(id) => id,
        }
    }
}

/// The destructive-mutation and lookup seam over the primary store.
///
/// `find_optional` treats an absent document as `Ok(None)`: optional child
/// data (e.g. message content) may legitimately not exist.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn open_source(&self, kind: EntityKind, scope: OwnerScope) -> Box<dyn PagedRecordSource>;

    async fn find_optional(
        &self,
        kind: EntityKind,
        parent_id: &str,
    ) -> Result<Option<EntityRecord>, DataFailure>;

    async fn find_profile(&self, user: &UserKey) -> Result<Option<EntityRecord>, DataFailure>;

    async fn delete(&self, key: &RecordKey) -> Result<(), DataFailure>;
}

/// `RecordStore` implementation over the HTTP doc-store client.
pub struct DocStore {
    client: Arc<StoreClient>,
    page_size: usize,
}

impl DocStore {
    pub fn new(client: Arc<StoreClient>, page_size: usize) -> Self {
        Self { client, page_size }
    }

    fn list_query(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Profile => "listProfileVersions",
            EntityKind::Message => "listMessagesForUser",
            EntityKind::MessageContent => "getMessageContent",
            EntityKind::MessageStatus => "listMessageStatusVersions",
            EntityKind::Notification => "listNotificationsForMessage",
            EntityKind::NotificationStatus => "listNotificationStatusVersions",
        }
    }

    fn delete_query(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Profile => "deleteProfileVersion",
            EntityKind::Message => "deleteMessage",
            EntityKind::MessageContent => "deleteMessageContent",
            EntityKind::MessageStatus => "deleteMessageStatusVersion",
            EntityKind::Notification => "deleteNotification",
            EntityKind::NotificationStatus => "deleteNotificationStatusVersion",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopedQuery<'a> {
    scope: &'a str,
}

#[async_trait]
impl RecordStore for DocStore {
    fn open_source(&self, kind: EntityKind, scope: OwnerScope) -> Box<dyn PagedRecordSource> {
        Box::new(DocStoreSource::new(
            Arc::clone(&self.client),
            Self::list_query(kind),
            scope,
            self.page_size,
        ))
    }

    async fn find_optional(
        &self,
        kind: EntityKind,
        parent_id: &str,
    ) -> Result<Option<EntityRecord>, DataFailure> {
        let query = Self::list_query(kind);
        match self
            .client
            .execute::<EntityRecord, _>(query, &ScopedQuery { scope: parent_id })
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => {
                debug!("No {} for parent {}", kind, parent_id);
                Ok(None)
            }
            Err(e) => Err(DataFailure::query(e.to_string(), query)),
        }
    }

    async fn find_profile(&self, user: &UserKey) -> Result<Option<EntityRecord>, DataFailure> {
        match self
            .client
            .execute::<EntityRecord, _>("getProfile", &ScopedQuery { scope: user.as_str() })
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(DataFailure::query(e.to_string(), "getProfile")),
        }
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), DataFailure> {
        let query = Self::delete_query(key.kind);
        debug!("Deleting {} {} (version {:?})", key.kind, key.id, key.version);
        self.client
            .execute::<serde_json::Value, _>(query, key)
            .await
            .map_err(|e| DataFailure::Delete(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_strings() {
        assert_eq!(EntityKind::Profile.as_str(), "profile");
        assert_eq!(EntityKind::MessageStatus.as_str(), "message-status");
        assert_eq!(EntityKind::NotificationStatus.as_str(), "notification-status");
    }

    #[test]
    fn test_record_key_carries_partition() {
        let record = EntityRecord {
            kind: EntityKind::MessageStatus,
            id: "msg-1".to_string(),
            version: Some(3),
            parent_id: Some("msg-1".to_string()),
            body: serde_json::json!({"status": "read"}),
        };
        let key = record.key();
        assert_eq!(key.kind, EntityKind::MessageStatus);
        assert_eq!(key.version, Some(3));
        assert_eq!(key.partition.as_deref(), Some("msg-1"));
    }

    #[test]
    fn test_record_wire_shape() {
        let record = EntityRecord {
            kind: EntityKind::Message,
            id: "msg-1".to_string(),
            version: None,
            parent_id: Some("USR01".to_string()),
            body: serde_json::json!({"subject": "hello"}),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "message");
        assert_eq!(value["parentId"], "USR01");
        assert!(value.get("version").is_none());
    }
}
