//! CSV file bar feed adapter.
//!
//! One file per (symbol, timeframe) named `SYMBOL_TIMEFRAME.csv` with
//! columns timestamp,open,high,low,close,volume. Timestamps are RFC 3339 or
//! `YYYY-MM-DD HH:MM:SS` (assumed UTC) or a bare date.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::TrendgateError;
use crate::ports::bar_feed::BarFeed;

pub struct CsvBarFeed {
    base_path: PathBuf,
}

impl CsvBarFeed {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn load_all(&self, symbol: &str, timeframe: &str) -> Result<Vec<Bar>, TrendgateError> {
        load_bars(&self.csv_path(symbol, timeframe), symbol)
    }
}

/// Parse one CSV file of timestamp,open,high,low,close,volume rows into
/// ascending bars for `symbol`.
pub fn load_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, TrendgateError> {
    let content = fs::read_to_string(path).map_err(|e| TrendgateError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| unavailable(symbol, format!("CSV parse error: {}", e)))?;

        let raw_ts = get_field(&record, 0, "timestamp", symbol)?;
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| unavailable(symbol, format!("invalid timestamp: {raw_ts}")))?;

        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open: parse_field(&record, 1, "open", symbol)?,
            high: parse_field(&record, 2, "high", symbol)?,
            low: parse_field(&record, 3, "low", symbol)?,
            close: parse_field(&record, 4, "close", symbol)?,
            volume: parse_field(&record, 5, "volume", symbol)?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn unavailable(symbol: &str, reason: String) -> TrendgateError {
    TrendgateError::DataUnavailable {
        symbol: symbol.to_string(),
        reason,
    }
}

fn get_field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    symbol: &str,
) -> Result<&'r str, TrendgateError> {
    record
        .get(idx)
        .ok_or_else(|| unavailable(symbol, format!("missing {} column", name)))
}

fn parse_field(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    symbol: &str,
) -> Result<f64, TrendgateError> {
    get_field(record, idx, name, symbol)?
        .parse::<f64>()
        .map_err(|e| unavailable(symbol, format!("invalid {} value: {}", name, e)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

impl BarFeed for CsvBarFeed {
    fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, TrendgateError> {
        let bars = self.load_all(symbol, timeframe)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect())
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TrendgateError> {
        let bars = self.load_all(symbol, timeframe)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) {
        let mut file = fs::File::create(dir.path().join(name)).unwrap();
        write!(file, "{}", content).unwrap();
    }

    const SAMPLE: &str = "\
timestamp,open,high,low,close,volume
2024-01-01 00:00:00,100.0,101.0,99.0,100.5,1000
2024-01-01 01:00:00,100.5,102.0,100.0,101.5,1100
2024-01-01 02:00:00,101.5,103.0,101.0,102.5,1200
";

    #[test]
    fn fetch_filters_by_range() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "XAUUSD_H1.csv", SAMPLE);
        let feed = CsvBarFeed::new(dir.path().to_path_buf());

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let bars = feed.fetch("XAUUSD", "H1", start, end).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 101.5);
        assert_eq!(bars[1].close, 102.5);
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let feed = CsvBarFeed::new(dir.path().to_path_buf());
        let err = feed
            .fetch(
                "XAUUSD",
                "H1",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, TrendgateError::DataUnavailable { .. }));
    }

    #[test]
    fn bad_number_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "XAUUSD_H1.csv",
            "timestamp,open,high,low,close,volume\n2024-01-01 00:00:00,oops,101,99,100,1000\n",
        );
        let feed = CsvBarFeed::new(dir.path().to_path_buf());
        let err = feed
            .fetch(
                "XAUUSD",
                "H1",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, TrendgateError::DataUnavailable { .. }));
    }

    #[test]
    fn data_range_reports_bounds() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "XAUUSD_H1.csv", SAMPLE);
        let feed = CsvBarFeed::new(dir.path().to_path_buf());
        let (first, last, count) = feed.data_range("XAUUSD", "H1").unwrap().unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(last, Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap());
        assert_eq!(count, 3);
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-01-01T12:00:00Z").is_some());
        assert!(parse_timestamp("2024-01-01 12:00:00").is_some());
        assert!(parse_timestamp("2024-01-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn unsorted_rows_are_sorted() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "XAUUSD_H1.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 02:00:00,101.5,103.0,101.0,102.5,1200\n\
             2024-01-01 00:00:00,100.0,101.0,99.0,100.5,1000\n",
        );
        let feed = CsvBarFeed::new(dir.path().to_path_buf());
        let (first, last, _) = feed.data_range("XAUUSD", "H1").unwrap().unwrap();
        assert!(first < last);
    }
}
