use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::DataFailure;

use super::client::StoreClient;
use super::records::{EntityRecord, OwnerScope};

/// Yields successive pages of records of one entity type for one owner.
///
/// `next_page` returns `Ok(None)` once the source is exhausted. The cursor is
/// stateful (`&mut self`), so pages are always fetched strictly in order.
/// Transient failures are surfaced as-is; the retry policy belongs to the
/// caller.
#[async_trait]
pub trait PagedRecordSource: Send {
    async fn next_page(&mut self) -> Result<Option<Vec<EntityRecord>>, DataFailure>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery<'a> {
    scope: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    page_size: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    records: Vec<EntityRecord>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Cursor-driven source over one named doc-store list query.
pub struct DocStoreSource {
    client: Arc<StoreClient>,
    query: &'static str,
    scope: OwnerScope,
    page_size: usize,
    cursor: Option<String>,
    exhausted: bool,
}

impl DocStoreSource {
    pub fn new(
        client: Arc<StoreClient>,
        query: &'static str,
        scope: OwnerScope,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            query,
            scope,
            page_size,
            cursor: None,
            exhausted: false,
        }
    }
}

#[async_trait]
impl PagedRecordSource for DocStoreSource {
    async fn next_page(&mut self) -> Result<Option<Vec<EntityRecord>>, DataFailure> {
        if self.exhausted {
            return Ok(None);
        }

        let params = PageQuery {
            scope: self.scope.value(),
            cursor: self.cursor.as_deref(),
            page_size: self.page_size,
        };
        let page: PageResponse = self
            .client
            .execute(self.query, &params)
            .await
            .map_err(|e| DataFailure::query(e.to_string(), self.query))?;

        debug!(
            "{}: fetched {} records (more: {})",
            self.query,
            page.records.len(),
            page.next_cursor.is_some()
        );

        match page.next_cursor {
            Some(cursor) => self.cursor = Some(cursor),
            None => self.exhausted = true,
        }

        if page.records.is_empty() && self.exhausted {
            return Ok(None);
        }
        Ok(Some(page.records))
    }
}
