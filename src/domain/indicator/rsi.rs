//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! First average: simple mean of gains/losses over the first `period`
//! changes. Subsequent: avg = (prev_avg * (period - 1) + current) / period.
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if period == 0 || bars.len() < 2 {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let mut gains: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    for i in 1..bars.len() {
        let change = bars[i].close - bars[i - 1].close;
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    series.push_invalid(bars[0].timestamp);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, bar) in bars.iter().enumerate().skip(1) {
        let change_idx = i - 1;

        if change_idx < period - 1 {
            series.push_invalid(bar.timestamp);
            continue;
        }

        if change_idx == period - 1 {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        series.push(bar.timestamp, true, rsi);
    }

    series
}
