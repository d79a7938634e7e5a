//! Bar feed port trait.

use chrono::{DateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::TrendgateError;

/// Ordered bar history for one asset/timeframe.
pub trait BarFeed {
    /// Bars with start <= timestamp <= end, ascending. Fails with
    /// `DataUnavailable` when the upstream feed cannot serve the range.
    fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, TrendgateError>;

    /// Earliest timestamp, latest timestamp, and bar count, if any data
    /// exists for the pair.
    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TrendgateError>;
}
