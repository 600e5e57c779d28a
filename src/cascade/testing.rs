//! In-memory store, sink and source doubles with a shared operation log,
//! so tests can assert backup/delete interleaving across components.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::backup::{ArtifactPath, BackupSink};
use crate::core::error::DataFailure;
use crate::store::{
    EntityKind, EntityRecord, OwnerScope, PagedRecordSource, RecordKey, RecordStore, UserKey,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MemOp {
    Backup(String),
    Delete(RecordKey),
}

pub type OpLog = Arc<Mutex<Vec<MemOp>>>;

/// Scripted page source for walker tests.
pub struct PageSource {
    pages: VecDeque<Vec<EntityRecord>>,
    fetches: usize,
    fail_at: Option<usize>,
}

impl PageSource {
    pub fn new(pages: Vec<Vec<EntityRecord>>) -> Self {
        Self {
            pages: pages.into(),
            fetches: 0,
            fail_at: None,
        }
    }

    pub fn fail_fetch(&mut self, fetch_index: usize) {
        self.fail_at = Some(fetch_index);
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

#[async_trait]
impl PagedRecordSource for PageSource {
    async fn next_page(&mut self) -> Result<Option<Vec<EntityRecord>>, DataFailure> {
        let index = self.fetches;
        self.fetches += 1;
        if self.fail_at == Some(index) {
            return Err(DataFailure::query("page fetch failed", "pageSource"));
        }
        Ok(self.pages.pop_front())
    }
}

/// Source over a snapshot of a `MemStore` selection, chunked into pages.
struct SnapshotSource {
    pages: VecDeque<Vec<EntityRecord>>,
    done: bool,
}

#[async_trait]
impl PagedRecordSource for SnapshotSource {
    async fn next_page(&mut self) -> Result<Option<Vec<EntityRecord>>, DataFailure> {
        if self.done {
            return Ok(None);
        }
        match self.pages.pop_front() {
            Some(page) => Ok(Some(page)),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

/// In-memory `RecordStore` with delete-failure injection.
pub struct MemStore {
    data: Mutex<HashMap<EntityKind, Vec<EntityRecord>>>,
    failing_deletes: Mutex<Vec<RecordKey>>,
    page_size: usize,
    pub log: OpLog,
}

impl MemStore {
    pub fn new() -> Self {
        Self::with_page_size(10)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            failing_deletes: Mutex::new(Vec::new()),
            page_size,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn insert(&self, record: EntityRecord) {
        self.data.lock().entry(record.kind).or_default().push(record);
    }

    pub fn fail_delete(&self, key: &RecordKey) {
        self.failing_deletes.lock().push(key.clone());
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.data
            .lock()
            .get(&key.kind)
            .map(|records| records.iter().any(|r| r.key() == *key))
            .unwrap_or(false)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.data.lock().get(&kind).map(Vec::len).unwrap_or(0)
    }

    pub fn deletes(&self) -> Vec<RecordKey> {
        self.log
            .lock()
            .iter()
            .filter_map(|op| match op {
                MemOp::Delete(key) => Some(key.clone()),
                MemOp::Backup(_) => None,
            })
            .collect()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemStore {
    fn open_source(&self, kind: EntityKind, scope: OwnerScope) -> Box<dyn PagedRecordSource> {
        let selected: Vec<EntityRecord> = self
            .data
            .lock()
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.parent_id.as_deref() == Some(scope.value()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let pages = selected
            .chunks(self.page_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        Box::new(SnapshotSource { pages, done: false })
    }

    async fn find_optional(
        &self,
        kind: EntityKind,
        parent_id: &str,
    ) -> Result<Option<EntityRecord>, DataFailure> {
        Ok(self
            .data
            .lock()
            .get(&kind)
            .and_then(|records| {
                records
                    .iter()
                    .find(|r| r.parent_id.as_deref() == Some(parent_id))
            })
            .cloned())
    }

    async fn find_profile(&self, user: &UserKey) -> Result<Option<EntityRecord>, DataFailure> {
        self.find_optional(EntityKind::Profile, user.as_str()).await
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), DataFailure> {
        if self.failing_deletes.lock().contains(key) {
            return Err(DataFailure::Delete(format!(
                "injected delete failure for {} {}",
                key.kind, key.id
            )));
        }
        self.log.lock().push(MemOp::Delete(key.clone()));
        if let Some(records) = self.data.lock().get_mut(&key.kind) {
            records.retain(|r| r.key() != *key);
        }
        Ok(())
    }
}

/// In-memory `BackupSink` with per-path failure injection, sharing the
/// store's operation log.
pub struct MemSink {
    saved: Mutex<HashMap<String, Value>>,
    failing_paths: Mutex<HashSet<String>>,
    log: OpLog,
}

impl MemSink {
    pub fn new(log: OpLog) -> Self {
        Self {
            saved: Mutex::new(HashMap::new()),
            failing_paths: Mutex::new(HashSet::new()),
            log,
        }
    }

    pub fn fail_on(&self, path: &str) {
        self.failing_paths.lock().insert(path.to_string());
    }

    pub fn saved_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.saved.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn saved_content(&self, path: &str) -> Option<Value> {
        self.saved.lock().get(path).cloned()
    }
}

#[async_trait]
impl BackupSink for MemSink {
    async fn save(&self, path: &ArtifactPath, content: &Value) -> Result<(), DataFailure> {
        if self.failing_paths.lock().contains(path.as_str()) {
            return Err(DataFailure::Blob(format!(
                "injected backup failure for {}",
                path
            )));
        }
        self.log.lock().push(MemOp::Backup(path.as_str().to_string()));
        self.saved.lock().insert(path.as_str().to_string(), content.clone());
        Ok(())
    }
}
