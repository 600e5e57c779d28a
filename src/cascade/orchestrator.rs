use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::backup::{ArtifactPath, BackupSink};
use crate::core::error::DataFailure;
use crate::store::{EntityKind, EntityRecord, OwnerScope, RecordStore, UserKey};

use super::failure::{ActivityResult, CascadeInput};
use super::hierarchy::{ChildArity, ChildSpec, USER_ROOTS};
use super::step::BackupThenDelete;
use super::walker;

/// Per-kind counts of the records a cascade processed.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CascadeReport {
    pub processed: HashMap<EntityKind, usize>,
}

impl CascadeReport {
    fn tally(&mut self, records: &[EntityRecord]) {
        for record in records {
            *self.processed.entry(record.kind).or_default() += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.processed.values().sum()
    }

    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .processed
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect();
        parts.sort();
        parts.join(" ")
    }
}

/// Everything one user owns, bundled for export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub user_key: UserKey,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<EntityRecord>,
}

#[derive(Clone, Copy)]
enum WalkMode<'a> {
    /// Backup-then-delete every visited record.
    Erase { folder: &'a str },
    /// Collect visited records without touching them.
    Collect,
}

/// Sequences cascade walks across entity types in dependency order.
///
/// Children of a record are always fully processed (concurrently among
/// themselves) before the record's own backup-then-delete; the user's
/// profile versions come after every other tree. Nothing is rolled back on
/// failure: the remaining steps are skipped, the failure is reported, and
/// re-running converges because processed records are gone from the store.
///
/// Callers must not run two cascades for the same user concurrently (one
/// workflow job per user key at a time); nothing here locks the stores.
pub struct CascadeOrchestrator {
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn BackupSink>,
}

impl CascadeOrchestrator {
    pub fn new(store: Arc<dyn RecordStore>, sink: Arc<dyn BackupSink>) -> Self {
        info!("Initializing CascadeOrchestrator");
        Self { store, sink }
    }

    /// Erase activity: locate, back up and delete every record of one user.
    ///
    /// A user with nothing left to erase succeeds with an empty result, so
    /// re-running after a partial failure converges to SUCCESS.
    pub async fn erase_user(&self, input: &CascadeInput) -> ActivityResult {
        if let Err(failure) = input.validate() {
            warn!("Rejecting erase request: {}", failure);
            return failure.into();
        }
        let user = UserKey::new(input.user_key.clone());
        info!("Starting erase cascade for user {}", user);

        match self.run_erase(&input.backup_folder, &user).await {
            Ok(report) => {
                info!(
                    "Erase cascade complete for user {}: {} records ({})",
                    user,
                    report.total(),
                    report.summary()
                );
                ActivityResult::Success
            }
            Err(failure) => {
                warn!("Erase cascade failed for user {}: {}", user, failure);
                failure.into()
            }
        }
    }

    /// Export activity: bundle every record of one user into a single
    /// backup artifact, without deleting anything.
    pub async fn export_user(&self, input: &CascadeInput) -> ActivityResult {
        if let Err(failure) = input.validate() {
            warn!("Rejecting export request: {}", failure);
            return failure.into();
        }
        let user = UserKey::new(input.user_key.clone());
        info!("Starting export for user {}", user);

        match self.run_export(&input.backup_folder, &user).await {
            Ok(path) => {
                info!("Export complete for user {}: {}", user, path);
                ActivityResult::Success
            }
            Err(failure) => {
                warn!("Export failed for user {}: {}", user, failure);
                failure.into()
            }
        }
    }

    async fn run_erase(&self, folder: &str, user: &UserKey) -> Result<CascadeReport, DataFailure> {
        let mut report = CascadeReport::default();
        for root in USER_ROOTS {
            let processed = self
                .walk_collection(root, OwnerScope::User(user.clone()), WalkMode::Erase { folder })
                .await?;
            report.tally(&processed);
        }
        Ok(report)
    }

    async fn run_export(&self, folder: &str, user: &UserKey) -> Result<ArtifactPath, DataFailure> {
        if self.store.find_profile(user).await?.is_none() {
            return Err(DataFailure::UserNotFound);
        }

        let mut records = Vec::new();
        for root in USER_ROOTS {
            let collected = self
                .walk_collection(root, OwnerScope::User(user.clone()), WalkMode::Collect)
                .await?;
            records.extend(collected);
        }

        let bundle = ExportBundle {
            user_key: user.clone(),
            exported_at: Utc::now(),
            records,
        };
        let path = ArtifactPath::for_export(folder, user.as_str());
        let content =
            serde_json::to_value(&bundle).map_err(|e| DataFailure::Blob(e.to_string()))?;
        self.sink.save(&path, &content).await?;
        Ok(path)
    }

    async fn walk_collection<'a>(
        &'a self,
        spec: &'static ChildSpec,
        scope: OwnerScope,
        mode: WalkMode<'a>,
    ) -> Result<Vec<EntityRecord>, DataFailure> {
        let mut source = self.store.open_source(spec.kind, scope);
        let process = |record: EntityRecord| self.walk_record(record, spec.children, mode);
        let subtrees = walker::drain(&mut *source, &process).await?;
        Ok(subtrees.into_iter().flatten().collect())
    }

    /// Processes one record's subtree: all children first (concurrently),
    /// then the record itself.
    fn walk_record<'a>(
        &'a self,
        record: EntityRecord,
        children: &'static [ChildSpec],
        mode: WalkMode<'a>,
    ) -> BoxFuture<'a, Result<Vec<EntityRecord>, DataFailure>> {
        async move {
            let mut processed = Vec::new();
            if !children.is_empty() {
                let subtrees = try_join_all(
                    children.iter().map(|spec| self.walk_child(&record, spec, mode)),
                )
                .await?;
                for subtree in subtrees {
                    processed.extend(subtree);
                }
            }

            match mode {
                WalkMode::Erase { folder } => {
                    let step =
                        BackupThenDelete::new(self.store.as_ref(), self.sink.as_ref(), folder);
                    processed.push(step.process(record).await?);
                }
                WalkMode::Collect => processed.push(record),
            }
            Ok(processed)
        }
        .boxed()
    }

    async fn walk_child<'a>(
        &'a self,
        parent: &EntityRecord,
        spec: &'static ChildSpec,
        mode: WalkMode<'a>,
    ) -> Result<Vec<EntityRecord>, DataFailure> {
        match spec.arity {
            ChildArity::OptionalSingle => {
                match self.store.find_optional(spec.kind, &parent.id).await? {
                    Some(child) => self.walk_record(child, spec.children, mode).await,
                    None => Ok(Vec::new()),
                }
            }
            ChildArity::Versioned | ChildArity::Collection => {
                self.walk_collection(spec, OwnerScope::Parent(parent.id.clone()), mode)
                    .await
            }
        }
    }
}
