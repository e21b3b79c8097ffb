/// TableStore: the storage boundary the draw service is written against
///
/// Two operations: insert a record (rejecting duplicate keys) and stream a
/// filtered query back page by page in ascending key order.
/// `MemoryTableStore` keeps everything in process with the same contract.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LottoError, Result};
use crate::filter::Filter;
use crate::model::DrawResultsEntity;

/// Largest page the table service will return for a single request.
pub const MAX_PAGE_SIZE: u32 = 1_000;

/// Pages of entities, each in ascending (PartitionKey, RowKey) order.
pub type PageStream<'a> = BoxStream<'a, Result<Vec<DrawResultsEntity>>>;

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert a new entity. Fails with `LottoError::Conflict` if an entity
    /// with the same partition and row key already exists.
    async fn insert(&self, entity: &DrawResultsEntity) -> Result<()>;

    /// Lazily query entities matching `filter`, at most `page_size` per page.
    /// Each call starts a fresh query.
    fn query_paged(&self, filter: &str, page_size: u32) -> PageStream<'_>;
}

/// In-process table store
#[derive(Default, Clone)]
pub struct MemoryTableStore {
    /// Partition key -> rows ordered by row key
    partitions: Arc<DashMap<String, BTreeMap<String, DrawResultsEntity>>>,
}

type Continuation = (String, String);

enum Cursor {
    Start,
    After(Continuation),
    Done,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entities across all partitions
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect the next page of matches strictly after `after`.
    fn next_page(
        &self,
        filter: &Filter,
        after: Option<&Continuation>,
        page_size: usize,
    ) -> Result<Vec<DrawResultsEntity>> {
        let mut partition_keys: Vec<String> =
            self.partitions.iter().map(|p| p.key().clone()).collect();
        partition_keys.sort();

        let mut page = Vec::with_capacity(page_size);

        for partition_key in partition_keys {
            let lower = match after {
                Some((pk, _)) if partition_key < *pk => continue,
                Some((pk, rk)) if partition_key == *pk => Bound::Excluded(rk.clone()),
                _ => Bound::Unbounded,
            };

            let Some(rows) = self.partitions.get(&partition_key) else {
                continue;
            };

            for (_, entity) in rows.range((lower, Bound::Unbounded)) {
                if filter.matches(&serde_json::to_value(entity)?) {
                    page.push(entity.clone());
                    if page.len() == page_size {
                        return Ok(page);
                    }
                }
            }
        }

        Ok(page)
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn insert(&self, entity: &DrawResultsEntity) -> Result<()> {
        let mut rows = self
            .partitions
            .entry(entity.partition_key.clone())
            .or_default();

        match rows.entry(entity.row_key.clone()) {
            Entry::Occupied(_) => Err(LottoError::Conflict {
                partition_key: entity.partition_key.clone(),
                row_key: entity.row_key.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(entity.clone());
                debug!(
                    "Inserted {}/{} into memory store",
                    entity.partition_key, entity.row_key
                );
                Ok(())
            }
        }
    }

    fn query_paged(&self, filter: &str, page_size: u32) -> PageStream<'_> {
        let parsed = match Filter::parse(filter) {
            Ok(parsed) => parsed,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE) as usize;

        stream::unfold(Cursor::Start, move |cursor| {
            let parsed = parsed.clone();
            async move {
                let after = match cursor {
                    Cursor::Done => return None,
                    Cursor::Start => None,
                    Cursor::After(continuation) => Some(continuation),
                };

                // Each page is a separate round trip on the real service.
                tokio::task::yield_now().await;

                let page = match self.next_page(&parsed, after.as_ref(), page_size) {
                    Ok(page) => page,
                    Err(e) => return Some((Err(e), Cursor::Done)),
                };

                if after.is_some() && page.is_empty() {
                    return None;
                }

                let next = match page.last() {
                    Some(last) if page.len() == page_size => {
                        Cursor::After((last.partition_key.clone(), last.row_key.clone()))
                    }
                    _ => Cursor::Done,
                };

                Some((Ok(page), next))
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DrawResults, PARTITION_KEY};

    fn entity(date: &str) -> DrawResultsEntity {
        DrawResultsEntity::from_draw(&DrawResults::new(date, vec![1, 2, 3], vec![])).unwrap()
    }

    async fn collect_pages(store: &MemoryTableStore, filter: &str, page_size: u32) -> Vec<Vec<String>> {
        let mut pages = Vec::new();
        let mut stream = store.query_paged(filter, page_size);
        while let Some(page) = stream.next().await {
            pages.push(page.unwrap().into_iter().map(|e| e.draw_date).collect());
        }
        pages
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let store = MemoryTableStore::new();
        store.insert(&entity("2024-02-01")).await.unwrap();

        let err = store.insert(&entity("2024-02-01")).await.unwrap_err();
        assert!(matches!(err, LottoError::Conflict { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_query_pages_in_row_key_order() {
        let store = MemoryTableStore::new();
        for date in ["2024-01-01", "2024-01-15", "2024-01-08", "2024-01-22", "2024-01-29"] {
            store.insert(&entity(date)).await.unwrap();
        }

        let pages = collect_pages(&store, "", 2).await;
        assert_eq!(
            pages,
            vec![
                vec!["2024-01-29", "2024-01-22"],
                vec!["2024-01-15", "2024-01-08"],
                vec!["2024-01-01"],
            ]
        );
    }

    #[tokio::test]
    async fn test_query_exact_multiple_ends_cleanly() {
        let store = MemoryTableStore::new();
        for date in ["2024-01-01", "2024-01-08"] {
            store.insert(&entity(date)).await.unwrap();
        }

        let pages = collect_pages(&store, "", 2).await;
        assert_eq!(pages, vec![vec!["2024-01-08", "2024-01-01"]]);
    }

    #[tokio::test]
    async fn test_query_empty_store_yields_one_empty_page() {
        let store = MemoryTableStore::new();
        let pages = collect_pages(&store, "", 10).await;
        assert_eq!(pages, vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn test_query_applies_filter() {
        let store = MemoryTableStore::new();
        for date in ["2024-01-01", "2024-01-08", "2024-01-15"] {
            store.insert(&entity(date)).await.unwrap();
        }

        let filter = format!("PartitionKey eq '{}' and (DrawDate ne '2024-01-08')", PARTITION_KEY);
        let pages = collect_pages(&store, &filter, 10).await;
        assert_eq!(pages, vec![vec!["2024-01-15", "2024-01-01"]]);
    }

    #[tokio::test]
    async fn test_query_with_bad_filter_fails() {
        let store = MemoryTableStore::new();
        let mut stream = store.query_paged("DrawDate eq", 10);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(LottoError::InvalidFilter { .. })));
        assert!(stream.next().await.is_none());
    }
}
