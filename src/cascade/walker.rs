use std::future::Future;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use crate::core::error::DataFailure;
use crate::store::{EntityRecord, PagedRecordSource};

/// Drains a paged source, applying `process` to every record.
///
/// Records within a page are processed concurrently; the next page is
/// fetched concurrently with that processing, but only after the current
/// fetch has returned (the cursor is stateful and strictly sequential).
/// Results keep source order: `[page, rest]`.
///
/// The whole drain fails on the first record or fetch failure and stops
/// scheduling further pages. Already-processed records are NOT compensated:
/// a backed-up-and-deleted record stays deleted. No data is lost (backup
/// always precedes delete), and re-running the drain converges because
/// deleted records no longer appear in the pages. Recovery from a partial
/// failure is "run it again".
pub fn drain<'a, S, F, Fut, T>(
    source: &'a mut S,
    process: &'a F,
) -> BoxFuture<'a, Result<Vec<T>, DataFailure>>
where
    S: PagedRecordSource + ?Sized,
    F: Fn(EntityRecord) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, DataFailure>> + Send + 'a,
    T: Send + 'a,
{
    async move {
        let Some(records) = source.next_page().await? else {
            return Ok(Vec::new());
        };
        debug!("Processing page of {} records", records.len());

        let page = try_join_all(records.into_iter().map(process));
        let rest = drain(source, process);

        let (mut processed, more) = futures::try_join!(page, rest)?;
        processed.extend(more);
        Ok(processed)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::testing::PageSource;
    use crate::store::EntityKind;

    fn record(id: &str) -> EntityRecord {
        EntityRecord {
            kind: EntityKind::Message,
            id: id.to_string(),
            version: None,
            parent_id: None,
            body: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_empty_source_yields_empty_list() {
        let mut source = PageSource::new(vec![]);
        let processed = drain(&mut source, &|r| async move { Ok(r) }).await.unwrap();
        assert!(processed.is_empty());
    }

    #[tokio::test]
    async fn test_pages_aggregate_in_order() {
        let mut source = PageSource::new(vec![
            vec![record("a"), record("b")],
            vec![record("c")],
            vec![record("d"), record("e")],
        ]);
        let processed = drain(&mut source, &|r| async move { Ok(r.id) }).await.unwrap();
        assert_eq!(processed, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(source.fetches(), 4);
    }

    #[tokio::test]
    async fn test_item_failure_stops_fetching_later_pages() {
        let mut source = PageSource::new(vec![
            vec![record("a")],
            vec![record("b")],
            vec![record("c")],
        ]);
        let result = drain(&mut source, &|r| async move {
            if r.id == "a" {
                Err(DataFailure::Blob("broken".to_string()))
            } else {
                Ok(r)
            }
        })
        .await;

        assert!(matches!(result, Err(DataFailure::Blob(_))));
        // Page 2's fetch may already be in flight when page 1 fails, but
        // nothing beyond it is ever requested.
        assert!(source.fetches() <= 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces() {
        let mut source = PageSource::new(vec![vec![record("a")], vec![record("b")]]);
        source.fail_fetch(1);
        let result = drain(&mut source, &|r| async move { Ok(r) }).await;
        assert_eq!(
            result,
            Err(DataFailure::query("page fetch failed", "pageSource"))
        );
    }
}
