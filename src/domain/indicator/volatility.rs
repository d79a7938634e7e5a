//! Rolling log-return volatility.
//!
//! Sample standard deviation of the last `window` one-bar log returns.

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_log_return_vol(bars: &[Bar], window: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if window < 2 {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let n = bars.len();
    let mut returns = vec![f64::NAN; n];
    for i in 1..n {
        if bars[i].close > 0.0 && bars[i - 1].close > 0.0 {
            returns[i] = (bars[i].close / bars[i - 1].close).ln();
        }
    }

    for (i, bar) in bars.iter().enumerate() {
        // need `window` returns, the earliest of which needs a previous bar
        if i < window {
            series.push_invalid(bar.timestamp);
            continue;
        }

        let slice = &returns[i + 1 - window..=i];
        if slice.iter().any(|r| r.is_nan()) {
            series.push_invalid(bar.timestamp);
            continue;
        }

        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / (window - 1) as f64;
        series.push(bar.timestamp, true, var.sqrt());
    }

    series
}
