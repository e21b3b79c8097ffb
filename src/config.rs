use std::env;

use crate::draw_results::TABLE_NAME;
use crate::error::{LottoError, Result};

pub const DEFAULT_API_URL: &str =
    "https://developers.lotto.pl/api/open/v1/lotteries/draw-results/by-date-per-game";

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub connection_string: Option<String>,
    pub table_name: String,
    pub api_key: Option<String>,
    pub api_url: String,
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            connection_string: get("AZURE_STORAGE_CONNECTION_STRING"),
            table_name: get("LOTTO_TABLE_NAME").unwrap_or_else(|| TABLE_NAME.to_string()),
            api_key: get("LOTTO_API_KEY"),
            api_url: get("LOTTO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    pub fn connection_string(&self) -> Result<&str> {
        self.connection_string.as_deref().ok_or_else(|| {
            LottoError::Config("AZURE_STORAGE_CONNECTION_STRING is not set".to_string())
        })
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LottoError::Config("LOTTO_API_KEY is not set".to_string()))
    }
}
