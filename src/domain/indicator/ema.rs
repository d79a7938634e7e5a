//! EMA (Exponential Moving Average).
//!
//! Seeded with the simple mean of the first `period` closes, then
//! ema = prev + alpha * (close - prev) with alpha = 2 / (period + 1).

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if period == 0 || bars.len() < period {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            series.push_invalid(bar.timestamp);
        } else if i == period - 1 {
            prev = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
            series.push(bar.timestamp, true, prev);
        } else {
            prev += alpha * (bar.close - prev);
            series.push(bar.timestamp, true, prev);
        }
    }

    series
}
