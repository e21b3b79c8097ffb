/// Client for the lotto.pl open API "draw results by date" endpoint.
///
/// Used to backfill the table: each request asks for the Lotto and
/// Lotto Plus results of a single day.

use chrono::{Days, NaiveDate};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LottoError, Result};
use crate::model::DrawResults;

const USER_AGENT: &str = "lotto-history";

#[derive(Debug, Deserialize)]
pub struct DrawResultsResponse {
    #[serde(default)]
    pub items: Vec<DrawItem>,
}

#[derive(Debug, Deserialize)]
pub struct DrawItem {
    #[serde(default)]
    pub results: Vec<GameResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    #[serde(default)]
    pub results_json: Vec<u8>,
}

impl DrawResultsResponse {
    /// The first item carries the Lotto numbers, the second (if any) the
    /// Plus numbers. No items means there was no draw that day.
    pub fn into_draw(self, draw_date: &str) -> Option<DrawResults> {
        let mut items = self.items.into_iter();
        let lotto = first_result(items.next()?);
        let plus = items.next().map(first_result).unwrap_or_default();

        Some(DrawResults::new(draw_date, lotto, plus))
    }
}

fn first_result(item: DrawItem) -> Vec<u8> {
    item.results
        .into_iter()
        .next()
        .map(|r| r.results_json)
        .unwrap_or_default()
}

/// Outcome of walking a date range. Fetching stops at the first failure and
/// keeps whatever was gathered before it.
#[derive(Debug)]
pub struct RangeFetch {
    pub draws: Vec<DrawResults>,
    pub stopped_by: Option<LottoError>,
}

pub struct LottoApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LottoApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.api_url.clone(), config.api_key()?))
    }

    /// Results for one day, or `None` if nothing was drawn.
    pub async fn fetch_draw(&self, date: NaiveDate) -> Result<Option<DrawResults>> {
        let draw_date = date.format("%Y-%m-%d").to_string();

        let response = self
            .http
            .get(&self.base_url)
            .header("User-Agent", USER_AGENT)
            .header("secret", &self.api_key)
            .query(&[
                ("gameType", "Lotto"),
                ("drawDate", draw_date.as_str()),
                ("index", "1"),
                ("size", "2"),
                ("sort", "drawSystemId"),
                ("order", "ASC"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No draw on {}", draw_date);
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LottoError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: DrawResultsResponse = response.json().await?;
        Ok(body.into_draw(&draw_date))
    }

    /// Fetch every day from `from` to `to` inclusive, pausing `delay`
    /// between requests.
    pub async fn fetch_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> RangeFetch {
        let mut draws = Vec::new();
        let mut date = from;

        while date <= to {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(LottoError::Cancelled),
                fetched = self.fetch_draw(date) => fetched,
            };

            match fetched {
                Ok(Some(draw)) => {
                    info!(
                        "Numbers: {} -> {} (plus: {})",
                        draw.draw_date,
                        draw.lotto_numbers_string(),
                        draw.plus_numbers_string()
                    );
                    draws.push(draw);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Stopping fetch at {}: {}", date, e);
                    return RangeFetch {
                        draws,
                        stopped_by: Some(e),
                    };
                }
            }

            date = match date.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };

            if date <= to {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        RangeFetch {
            draws,
            stopped_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_plus_numbers() {
        let body = r#"{
            "totalRows": 2,
            "items": [
                { "gameType": "Lotto", "results": [ { "resultsJson": [3, 11, 19, 25, 36, 48] } ] },
                { "gameType": "LottoPlus", "results": [ { "resultsJson": [1, 7, 9, 22, 30, 41] } ] }
            ]
        }"#;
        let response: DrawResultsResponse = serde_json::from_str(body).unwrap();
        let draw = response.into_draw("2024-01-15").unwrap();

        assert_eq!(draw.draw_date, "2024-01-15");
        assert_eq!(draw.lotto_numbers, vec![3, 11, 19, 25, 36, 48]);
        assert_eq!(draw.plus_numbers, vec![1, 7, 9, 22, 30, 41]);
    }

    #[test]
    fn test_response_without_plus_numbers() {
        let body = r#"{ "items": [ { "results": [ { "resultsJson": [1, 2, 3, 4, 5, 6] } ] } ] }"#;
        let response: DrawResultsResponse = serde_json::from_str(body).unwrap();
        let draw = response.into_draw("2001-03-03").unwrap();

        assert_eq!(draw.lotto_numbers, vec![1, 2, 3, 4, 5, 6]);
        assert!(draw.plus_numbers.is_empty());
    }

    #[test]
    fn test_empty_response_is_no_draw() {
        let response: DrawResultsResponse = serde_json::from_str(r#"{ "items": [] }"#).unwrap();
        assert!(response.into_draw("2024-01-16").is_none());
    }

    #[tokio::test]
    async fn test_cancelled_range_fetch_returns_nothing() {
        let client = LottoApiClient::new("http://127.0.0.1:9/unused", "key");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let fetched = client
            .fetch_range(from, from, Duration::from_millis(0), &cancel)
            .await;

        assert!(fetched.draws.is_empty());
        assert!(matches!(fetched.stopped_by, Some(LottoError::Cancelled)));
    }
}
