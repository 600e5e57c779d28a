use tracing::debug;

use crate::backup::{ArtifactPath, BackupSink};
use crate::core::error::DataFailure;
use crate::store::{EntityRecord, RecordStore};

/// Backup-then-delete for one record.
///
/// The delete is only attempted after the backup write succeeded, so a
/// record can never be lost: at any point it exists in the primary store,
/// in the backup store, or in both. On success the original record is
/// returned (not the delete outcome), so callers can keep chaining record
/// metadata.
pub struct BackupThenDelete<'a> {
    store: &'a dyn RecordStore,
    sink: &'a dyn BackupSink,
    folder: &'a str,
}

impl<'a> BackupThenDelete<'a> {
    pub fn new(store: &'a dyn RecordStore, sink: &'a dyn BackupSink, folder: &'a str) -> Self {
        Self { store, sink, folder }
    }

    pub async fn process(&self, record: EntityRecord) -> Result<EntityRecord, DataFailure> {
        let path = ArtifactPath::for_record(self.folder, &record);
        let snapshot = serde_json::to_value(&record).map_err(|e| DataFailure::Blob(e.to_string()))?;

        self.sink.save(&path, &snapshot).await?;
        debug!("Backed up {} {} to {}", record.kind, record.id, path);

        self.store.delete(&record.key()).await?;
        debug!("Deleted {} {} (version {:?})", record.kind, record.id, record.version);

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::testing::{MemOp, MemSink, MemStore};
    use crate::store::EntityKind;
    use std::sync::Arc;

    fn record() -> EntityRecord {
        EntityRecord {
            kind: EntityKind::Message,
            id: "msg-1".to_string(),
            version: None,
            parent_id: Some("USR01".to_string()),
            body: serde_json::json!({"subject": "hi"}),
        }
    }

    #[tokio::test]
    async fn test_backup_precedes_delete() {
        let store = Arc::new(MemStore::new());
        let sink = MemSink::new(Arc::clone(&store.log));
        store.insert(record());

        let step = BackupThenDelete::new(&*store, &sink, "user-data");
        let processed = step.process(record()).await.unwrap();

        assert_eq!(processed.id, "msg-1");
        let ops = store.log.lock().clone();
        assert_eq!(
            ops,
            vec![
                MemOp::Backup("user-data/message--msg-1.json".to_string()),
                MemOp::Delete(record().key()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_delete_when_backup_fails() {
        let store = Arc::new(MemStore::new());
        let sink = MemSink::new(Arc::clone(&store.log));
        sink.fail_on("user-data/message--msg-1.json");
        store.insert(record());

        let step = BackupThenDelete::new(&*store, &sink, "user-data");
        let result = step.process(record()).await;

        assert!(matches!(result, Err(DataFailure::Blob(_))));
        let ops = store.log.lock().clone();
        assert!(ops.iter().all(|op| !matches!(op, MemOp::Delete(_))));
        assert!(store.contains(&record().key()));
    }

    #[tokio::test]
    async fn test_delete_failure_surfaces_after_backup() {
        let store = Arc::new(MemStore::new());
        let sink = MemSink::new(Arc::clone(&store.log));
        store.insert(record());
        store.fail_delete(&record().key());

        let step = BackupThenDelete::new(&*store, &sink, "user-data");
        let result = step.process(record()).await;

        assert!(matches!(result, Err(DataFailure::Delete(_))));
        // The artifact was written: re-running converges without data loss.
        let ops = store.log.lock().clone();
        assert!(matches!(ops[0], MemOp::Backup(_)));
    }
}
