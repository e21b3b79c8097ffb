/// DrawResultsService: stores draws and reads them back newest first
///
/// Every record lives in one partition. Row keys shrink as draw dates grow,
/// so the store's natural ascending order is already most-recent-first and
/// reads never need a secondary sort.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::azure_table::AzureTableStore;
use crate::config::Config;
use crate::error::{LottoError, Result};
use crate::filter;
use crate::model::{DrawResults, DrawResultsEntity, PARTITION_KEY};
use crate::table_store::{TableStore, MAX_PAGE_SIZE};

pub const TABLE_NAME: &str = "LottoResults";

const LATEST_NOT_FOUND: &str = "Couldn't retrieve the latest draw results.";

#[derive(Clone)]
pub struct DrawResultsService {
    store: Arc<dyn TableStore>,
    base_filter: String,
}

impl DrawResultsService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            base_filter: filter::eq("PartitionKey", PARTITION_KEY),
        }
    }

    /// Build a service on Azure Table Storage from configuration.
    pub async fn connect(config: &Config, create_table: bool) -> Result<Self> {
        let store =
            AzureTableStore::from_connection_string(config.connection_string()?, &config.table_name)?;

        if create_table {
            store.create_if_not_exists().await?;
        }

        Ok(Self::new(Arc::new(store)))
    }

    /// Store a draw. The same draw date can only be stored once.
    pub async fn add(&self, data: &DrawResults, cancel: &CancellationToken) -> Result<()> {
        let entity = DrawResultsEntity::from_draw(data)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LottoError::Cancelled),
            result = self.store.insert(&entity) => result?,
        }

        info!("ADD: {} (RowKey {})", entity.draw_date, entity.row_key);
        Ok(())
    }

    /// The most recent draw. An empty table is an error.
    pub async fn get_latest(&self, cancel: &CancellationToken) -> Result<DrawResultsEntity> {
        self.get("", 1, cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LottoError::NotFound(LATEST_NOT_FOUND.to_string()))
    }

    /// The `top` most recent draws.
    pub async fn get_top(&self, top: i32, cancel: &CancellationToken) -> Result<Vec<DrawResultsEntity>> {
        self.get("", top, cancel).await
    }

    /// Up to `top` draws matching `filter`, newest first.
    ///
    /// `filter` is a table-storage filter expression joined to the partition
    /// predicate; a blank filter selects the whole partition. A `top` of zero
    /// or less returns nothing without querying the store.
    pub async fn get(
        &self,
        filter: &str,
        top: i32,
        cancel: &CancellationToken,
    ) -> Result<Vec<DrawResultsEntity>> {
        if cancel.is_cancelled() {
            return Err(LottoError::Cancelled);
        }
        if top <= 0 {
            return Ok(Vec::new());
        }

        let top = top as usize;
        let full_filter = if filter.trim().is_empty() {
            self.base_filter.clone()
        } else {
            format!("{} and ({})", self.base_filter, filter)
        };
        let page_size = top.min(MAX_PAGE_SIZE as usize) as u32;

        let mut pages = self.store.query_paged(&full_filter, page_size);
        let mut results = Vec::new();
        let mut page_count = 0;

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LottoError::Cancelled),
                page = pages.next() => page,
            };

            let Some(page) = page else { break };
            let page = page?;
            page_count += 1;

            let remaining = top - results.len();
            results.extend(page.into_iter().take(remaining));

            if results.len() >= top {
                break;
            }
        }

        debug!(
            "GET: [{}] top {} -> {} results over {} pages",
            full_filter,
            top,
            results.len(),
            page_count
        );
        Ok(results)
    }
}
