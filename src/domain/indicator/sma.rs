//! SMA (Simple Moving Average).

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if period == 0 {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let mut window_sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        window_sum += bar.close;
        if i >= period {
            window_sum -= bars[i - period].close;
        }
        if i >= period - 1 {
            series.push(bar.timestamp, true, window_sum / period as f64);
        } else {
            series.push_invalid(bar.timestamp);
        }
    }

    series
}
