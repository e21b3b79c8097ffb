/// Draw records: the caller-facing DTO, the stored table entity and the
/// row-key derivation that makes an ascending key scan return the most
/// recent draw first.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{LottoError, Result};

/// Partition holding every draw record.
pub const PARTITION_KEY: &str = "LottoData";

const SECONDS_PER_DAY: i64 = 86_400;

/// One lottery drawing as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawResults {
    pub draw_date: String,
    pub lotto_numbers: Vec<u8>,
    pub plus_numbers: Vec<u8>,
}

impl DrawResults {
    pub fn new(draw_date: impl Into<String>, lotto_numbers: Vec<u8>, plus_numbers: Vec<u8>) -> Self {
        Self {
            draw_date: draw_date.into(),
            lotto_numbers,
            plus_numbers,
        }
    }

    pub fn lotto_numbers_string(&self) -> String {
        join_numbers(&self.lotto_numbers)
    }

    pub fn plus_numbers_string(&self) -> String {
        join_numbers(&self.plus_numbers)
    }
}

/// A draw as persisted in the table store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResultsEntity {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(rename = "DrawDate")]
    pub draw_date: String,
    #[serde(rename = "LottoNumbers")]
    pub lotto_numbers: String,
    #[serde(rename = "PlusNumbers")]
    pub plus_numbers: String,
}

impl DrawResultsEntity {
    /// Build the stored record for a draw, validating its date.
    pub fn from_draw(data: &DrawResults) -> Result<Self> {
        let draw_date = parse_draw_date(&data.draw_date)?;

        Ok(Self {
            partition_key: PARTITION_KEY.to_string(),
            row_key: row_key_for(draw_date),
            draw_date: data.draw_date.clone(),
            lotto_numbers: data.lotto_numbers_string(),
            plus_numbers: data.plus_numbers_string(),
        })
    }

    pub fn to_draw_results(&self) -> Result<DrawResults> {
        Ok(DrawResults {
            draw_date: self.draw_date.clone(),
            lotto_numbers: parse_numbers(&self.lotto_numbers)?,
            plus_numbers: parse_numbers(&self.plus_numbers)?,
        })
    }
}

/// Parse a caller-supplied draw date.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// RFC 3339 timestamps (reduced to UTC). Years must lie in 1..=9999.
pub fn parse_draw_date(input: &str) -> Result<NaiveDateTime> {
    let trimmed = input.trim();

    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.naive_utc()))
        .map_err(|_| LottoError::InvalidDrawDate {
            input: input.to_string(),
        })?;

    if !(1..=9999).contains(&parsed.year()) {
        return Err(LottoError::InvalidDrawDate {
            input: input.to_string(),
        });
    }

    Ok(parsed)
}

/// Derive the row key for a draw date.
///
/// The key is the time remaining until `9999-12-31T23:59:59`, written as
/// 7 digits of days followed by `HHMMSS`. Every key has the same width, so
/// later dates always sort before earlier ones.
pub fn row_key_for(draw_date: NaiveDateTime) -> String {
    let remaining = max_draw_date() - draw_date;
    let total_seconds = remaining.num_seconds();

    let days = total_seconds / SECONDS_PER_DAY;
    let seconds_of_day = total_seconds % SECONDS_PER_DAY;
    let hours = seconds_of_day / 3600;
    let minutes = (seconds_of_day % 3600) / 60;
    let seconds = seconds_of_day % 60;

    format!("{:07}{:02}{:02}{:02}", days, hours, minutes, seconds)
}

fn max_draw_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-joined number list. An empty string is an empty list.
pub fn parse_numbers(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split(',')
        .map(|part| {
            part.trim().parse::<u8>().map_err(|_| LottoError::InvalidNumbers {
                input: input.to_string(),
            })
        })
        .collect()
}
