/// Lotto Draw History - draw results on Azure Table Storage
///
/// Stores lottery draw results and reads them back newest first.
///
/// Layers:
/// 1. TableStore: insert + paged query boundary (Azure Tables or in memory)
/// 2. Model: draw records and the reverse-chronological row key
/// 3. DrawResultsService: add / latest / filtered, capped reads
/// 4. Seeding: CSV files and the lotto.pl API for backfilling

pub mod error;
pub mod model;
pub mod filter;
pub mod table_store;
pub mod azure_table;
pub mod draw_results;
pub mod config;
pub mod lotto_api;
pub mod seed;

pub use azure_table::AzureTableStore;
pub use config::Config;
pub use draw_results::DrawResultsService;
pub use error::{LottoError, Result};
pub use model::{DrawResults, DrawResultsEntity};
pub use table_store::{MemoryTableStore, TableStore};
