/// AzureTableStore: Azure Table Storage behind the `TableStore` boundary
///
/// Inserts map HTTP 409 to `LottoError::Conflict`. Queries are handed to
/// the service as raw OData filters, with `$top` as the page-size hint.

use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_core::StatusCode;
use azure_data_tables::prelude::*;
use azure_data_tables::{clients::TableServiceClientBuilder, Filter as ODataFilter, Top};
use azure_storage::{CloudLocation, ConnectionString};
use futures::StreamExt;
use tracing::{debug, info};

use crate::error::{LottoError, Result};
use crate::model::DrawResultsEntity;
use crate::table_store::{PageStream, TableStore};

const PUBLIC_ENDPOINT_SUFFIX: &str = "core.windows.net";

pub struct AzureTableStore {
    table_client: TableClient,
    table_name: String,
}

impl AzureTableStore {
    /// Connect using a storage account connection string.
    ///
    /// `UseDevelopmentStorage=true` targets the local storage emulator.
    /// `TableEndpoint` or `EndpointSuffix` override the public endpoint.
    pub fn from_connection_string(connection_string: &str, table_name: &str) -> Result<Self> {
        let parsed = ConnectionString::new(connection_string)?;

        let service_client = if parsed.use_development_storage == Some(true) {
            info!("Using the local storage emulator for table {}", table_name);
            TableServiceClientBuilder::emulator().build()
        } else {
            let account = parsed.account_name.ok_or_else(|| {
                LottoError::Config("connection string is missing AccountName".to_string())
            })?;
            let credentials = parsed.storage_credentials()?;

            match custom_table_uri(&parsed, account) {
                Some(uri) => {
                    info!("Connecting to table {} at {}", table_name, uri);
                    let location = CloudLocation::Custom {
                        account: account.to_string(),
                        uri,
                    };
                    TableServiceClientBuilder::with_location(location, credentials).build()
                }
                None => {
                    info!("Connecting to table {} in account {}", table_name, account);
                    TableServiceClient::new(account, credentials)
                }
            }
        };

        Ok(Self {
            table_client: service_client.table_client(table_name),
            table_name: table_name.to_string(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the table unless it already exists.
    pub async fn create_if_not_exists(&self) -> Result<()> {
        match self.table_client.create().await {
            Ok(_) => {
                info!("Created table {}", self.table_name);
                Ok(())
            }
            Err(e) if is_conflict(&e) => {
                debug!("Table {} already exists", self.table_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Table service base URI when the connection string names one explicitly.
/// An explicit `TableEndpoint` wins over `EndpointSuffix`.
fn custom_table_uri(parsed: &ConnectionString, account: &str) -> Option<String> {
    if let Some(endpoint) = parsed.table_endpoint {
        return Some(endpoint.trim_end_matches('/').to_string());
    }

    parsed
        .endpoint_suffix
        .filter(|suffix| *suffix != PUBLIC_ENDPOINT_SUFFIX)
        .map(|suffix| format!("https://{}.table.{}", account, suffix))
}

fn is_conflict(err: &azure_core::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::HttpResponse { status, .. } if *status == StatusCode::Conflict
    )
}

#[async_trait]
impl TableStore for AzureTableStore {
    async fn insert(&self, entity: &DrawResultsEntity) -> Result<()> {
        debug!(
            "Inserting {}/{} into {}",
            entity.partition_key, entity.row_key, self.table_name
        );

        match self
            .table_client
            .insert::<_, DrawResultsEntity>(entity)?
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_conflict(&e) => Err(LottoError::Conflict {
                partition_key: entity.partition_key.clone(),
                row_key: entity.row_key.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn query_paged(&self, filter: &str, page_size: u32) -> PageStream<'_> {
        debug!(
            "Querying {} with filter [{}], page size {}",
            self.table_name, filter, page_size
        );

        self.table_client
            .query()
            .filter(ODataFilter::new(filter.to_string()))
            .top(Top::new(page_size))
            .into_stream::<DrawResultsEntity>()
            .map(|response| {
                response
                    .map(|page| page.entities)
                    .map_err(LottoError::from)
            })
            .boxed()
    }
}
