//! Training dataset export.
//!
//! Walks history bar by bar, builds each feature vector through the same
//! pipeline the live path uses, labels it with the triple barrier over the
//! bars that followed, and writes one CSV row per usable bar. Warm-up rows
//! (vol_std still at its sentinel) are dropped so the trainer never sees
//! half-initialized features.

use std::io::Write;

use tracing::info;

use crate::domain::bar::Bar;
use crate::domain::config::LabelConfig;
use crate::domain::error::TrendgateError;
use crate::domain::features::{self, FeatureVector, FEATURE_NAMES};
use crate::training::labeling::{self, LabelOutcome};

/// One aligned (features, outcome) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub features: FeatureVector,
    pub outcome: LabelOutcome,
}

/// Build the aligned training set for one symbol/timeframe history.
pub fn build(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
    cfg: &LabelConfig,
) -> Result<Vec<DatasetRow>, TrendgateError> {
    let mut rows = Vec::new();

    // last bar has no future to label against
    for t in 0..bars.len().saturating_sub(1) {
        let features = features::build(symbol, timeframe, &bars[..=t])?;
        let vol_std = features.get("vol_std").unwrap_or(0.0);
        if vol_std <= 0.0 {
            continue;
        }

        let label = labeling::label(
            symbol,
            bars[t].timestamp,
            bars[t].close,
            &bars[t + 1..],
            cfg,
        );
        rows.push(DatasetRow {
            features,
            outcome: label.outcome,
        });
    }

    info!(
        symbol,
        timeframe,
        rows = rows.len(),
        total_bars = bars.len(),
        "training set built"
    );
    Ok(rows)
}

/// Write rows as CSV: timestamp, the named features, the ternary outcome,
/// and the binarized target column.
pub fn write_csv<W: Write>(rows: &[DatasetRow], writer: W) -> Result<(), TrendgateError> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = vec!["timestamp"];
    header.extend(FEATURE_NAMES);
    header.push("outcome");
    header.push("target");
    out.write_record(&header).map_err(csv_error)?;

    for row in rows {
        let mut record: Vec<String> = vec![row.features.timestamp.to_rfc3339()];
        record.extend(row.features.values.iter().map(|v| v.to_string()));
        record.push(row.outcome.as_str().to_string());
        record.push(row.outcome.target().to_string());
        out.write_record(&record).map_err(csv_error)?;
    }

    out.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> TrendgateError {
    TrendgateError::Database {
        reason: format!("CSV write error: {}", e),
    }
}
