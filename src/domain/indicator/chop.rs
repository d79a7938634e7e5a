//! Choppiness Index.
//!
//! 100 * log10(sum(TR, n) / (max(high, n) - min(low, n))) / log10(n).
//! High values mean sideways churn, low values mean directional movement.

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_chop(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if period < 2 {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let n = bars.len();
    let mut tr = vec![0.0; n];
    for i in 1..n {
        tr[i] = bars[i].true_range(bars[i - 1].close);
    }

    let log_n = (period as f64).log10();

    for (i, bar) in bars.iter().enumerate() {
        // window of `period` true ranges, all of which need a previous close
        if i < period {
            series.push_invalid(bar.timestamp);
            continue;
        }

        let window = &bars[i + 1 - period..=i];
        let tr_sum: f64 = tr[i + 1 - period..=i].iter().sum();
        let max_high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let min_low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range = max_high - min_low;

        if range <= 0.0 || tr_sum <= 0.0 {
            series.push_invalid(bar.timestamp);
        } else {
            let chop = 100.0 * (tr_sum / range).log10() / log_n;
            series.push(bar.timestamp, true, chop);
        }
    }

    series
}
