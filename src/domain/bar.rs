//! OHLCV bar representation.

use chrono::{DateTime, Duration, Utc};

/// One price bar for a single asset/timeframe. Immutable once ingested;
/// series are strictly ordered by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// close > open
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    /// |close - open|
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Bar duration for a timeframe code ("M15", "H1", "D1", ...).
pub fn timeframe_duration(timeframe: &str) -> Option<Duration> {
    match timeframe {
        "M1" => Some(Duration::minutes(1)),
        "M5" => Some(Duration::minutes(5)),
        "M15" => Some(Duration::minutes(15)),
        "M30" => Some(Duration::minutes(30)),
        "H1" => Some(Duration::hours(1)),
        "H4" => Some(Duration::hours(4)),
        "D1" => Some(Duration::days(1)),
        _ => None,
    }
}
