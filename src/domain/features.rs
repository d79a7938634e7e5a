//! Feature pipeline.
//!
//! The single transform from raw bars to the model's input vector, shared
//! verbatim by live inference, the backtest replay, and training dataset
//! generation. Any value that is undefined at the evaluation bar (warm-up,
//! division artifact, non-finite) is replaced with the 0.0 sentinel so that
//! every path sees byte-identical inputs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::bar::Bar;
use crate::domain::error::TrendgateError;
use crate::domain::indicator::adx::calculate_adx;
use crate::domain::indicator::chop::calculate_chop;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::volatility::calculate_log_return_vol;

pub const FEATURE_NAMES: [&str; 6] = [
    "vol_std",
    "dist_ema200",
    "rsi",
    "adx",
    "chop",
    "is_green",
];

pub const VOL_WINDOW: usize = 20;
pub const EMA_WINDOW: usize = 200;
pub const RSI_WINDOW: usize = 14;
pub const ADX_WINDOW: usize = 14;
pub const CHOP_WINDOW: usize = 14;

/// A fixed-width named feature vector for one bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    /// Look a feature up by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }
}

/// Build the feature vector for the last bar of `bars`.
pub fn build(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
) -> Result<FeatureVector, TrendgateError> {
    let last = bars.last().ok_or_else(|| TrendgateError::InsufficientHistory {
        symbol: symbol.to_string(),
        have: 0,
        need: 1,
    })?;
    let last_idx = bars.len() - 1;

    let vol = calculate_log_return_vol(bars, VOL_WINDOW);
    let ema = calculate_ema(bars, EMA_WINDOW);
    let rsi = calculate_rsi(bars, RSI_WINDOW);
    let adx = calculate_adx(bars, ADX_WINDOW);
    let chop = calculate_chop(bars, CHOP_WINDOW);

    let dist_ema200 = match ema.value_at(last_idx) {
        Some(e) if e != 0.0 => (last.close - e) / e,
        _ => 0.0,
    };

    let values = vec![
        sentinel(vol.value_at(last_idx)),
        sentinel(Some(dist_ema200)),
        sentinel(rsi.value_at(last_idx)),
        sentinel(adx.value_at(last_idx)),
        sentinel(chop.value_at(last_idx)),
        if last.is_green() { 1.0 } else { 0.0 },
    ];

    Ok(FeatureVector {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        timestamp: last.timestamp,
        values,
    })
}

fn sentinel(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}
