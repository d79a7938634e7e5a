//! ATR (Average True Range) with Wilder smoothing.
//!
//! Seed: simple mean of the first `period` true ranges.
//! Subsequent: atr = (prev_atr * (period - 1) + tr) / period.
//! The first bar's true range is high - low (no previous close).

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if period == 0 {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let mut tr_values: Vec<f64> = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };
        tr_values.push(tr);
    }

    let mut prev_atr = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            series.push_invalid(bar.timestamp);
        } else if i == period - 1 {
            prev_atr = tr_values[..period].iter().sum::<f64>() / period as f64;
            series.push(bar.timestamp, true, prev_atr);
        } else {
            prev_atr = (prev_atr * (period - 1) as f64 + tr_values[i]) / period as f64;
            series.push(bar.timestamp, true, prev_atr);
        }
    }

    series
}
