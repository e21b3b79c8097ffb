/// CSV seeding: the `Draw date,Lotto numbers,Plus numbers` file produced by
/// the fetcher, and bulk import of such a file into the table.

use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::draw_results::DrawResultsService;
use crate::error::{LottoError, Result};
use crate::model::{parse_numbers, DrawResults};

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Draw date")]
    draw_date: String,
    #[serde(rename = "Lotto numbers")]
    lotto_numbers: String,
    #[serde(rename = "Plus numbers")]
    plus_numbers: String,
}

pub fn read_draws<R: io::Read>(reader: R) -> Result<Vec<DrawResults>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut draws = Vec::new();

    for row in csv_reader.deserialize::<CsvRow>() {
        let row = row?;
        draws.push(DrawResults::new(
            row.draw_date,
            parse_numbers(&row.lotto_numbers)?,
            parse_numbers(&row.plus_numbers)?,
        ));
    }

    Ok(draws)
}

pub fn write_draws<W: io::Write>(writer: W, draws: &[DrawResults]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for draw in draws {
        csv_writer.serialize(CsvRow {
            draw_date: draw.draw_date.clone(),
            lotto_numbers: draw.lotto_numbers_string(),
            plus_numbers: draw.plus_numbers_string(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Add each draw in order. Draws already in the table are skipped; any
/// other failure stops the import.
pub async fn import(
    service: &DrawResultsService,
    draws: &[DrawResults],
    cancel: &CancellationToken,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for draw in draws {
        match service.add(draw, cancel).await {
            Ok(()) => summary.added += 1,
            Err(LottoError::Conflict { .. }) => {
                warn!("Skipping {}: already stored", draw.draw_date);
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Import complete: {} added, {} skipped",
        summary.added, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_store::MemoryTableStore;
    use std::sync::Arc;

    const DATA: &str = "\
Draw date,Lotto numbers,Plus numbers
2024-01-01,\"3,11,19,25,36,48\",\"1,7,9,22,30,41\"
2024-01-08,\"2,14,20,27,33,45\",
";

    #[test]
    fn test_read_draws() {
        let draws = read_draws(DATA.as_bytes()).unwrap();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].lotto_numbers, vec![3, 11, 19, 25, 36, 48]);
        assert_eq!(draws[0].plus_numbers, vec![1, 7, 9, 22, 30, 41]);
        assert_eq!(draws[1].draw_date, "2024-01-08");
        assert!(draws[1].plus_numbers.is_empty());
    }

    #[test]
    fn test_write_then_read_keeps_file_format() {
        let draws = read_draws(DATA.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_draws(&mut out, &draws).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), DATA);
    }

    #[test]
    fn test_read_rejects_bad_numbers() {
        let data = "Draw date,Lotto numbers,Plus numbers\n2024-01-01,\"1,two\",\n";
        assert!(matches!(
            read_draws(data.as_bytes()),
            Err(LottoError::InvalidNumbers { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_skips_existing_draws() {
        let service = DrawResultsService::new(Arc::new(MemoryTableStore::new()));
        let cancel = CancellationToken::new();
        let draws = read_draws(DATA.as_bytes()).unwrap();

        let first = import(&service, &draws, &cancel).await.unwrap();
        assert_eq!(first, ImportSummary { added: 2, skipped: 0 });

        let second = import(&service, &draws, &cancel).await.unwrap();
        assert_eq!(second, ImportSummary { added: 0, skipped: 2 });
    }

    #[tokio::test]
    async fn test_import_stops_on_invalid_date() {
        let service = DrawResultsService::new(Arc::new(MemoryTableStore::new()));
        let cancel = CancellationToken::new();
        let draws = vec![
            DrawResults::new("2024-01-01", vec![1], vec![]),
            DrawResults::new("someday", vec![2], vec![]),
            DrawResults::new("2024-01-15", vec![3], vec![]),
        ];

        let err = import(&service, &draws, &cancel).await.unwrap_err();
        assert!(matches!(err, LottoError::InvalidDrawDate { .. }));
        assert_eq!(service.get_top(10, &cancel).await.unwrap().len(), 1);
    }
}
