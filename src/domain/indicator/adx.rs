//! ADX (Average Directional Index) with Wilder smoothing.
//!
//! Directional movement: +DM = high[i] - high[i-1] when it exceeds the
//! down-move and is positive, -DM mirrored. +DI/-DI are the Wilder-smoothed
//! DMs as a percentage of smoothed TR; DX = 100 * |+DI - -DI| / (+DI + -DI);
//! ADX is the Wilder-smoothed DX, first valid at index 2 * period.

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorSeries;

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut series = IndicatorSeries::with_capacity(bars.len());

    if period == 0 || bars.len() < 2 * period + 1 {
        for bar in bars {
            series.push_invalid(bar.timestamp);
        }
        return series;
    }

    let n = bars.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let mut tr = vec![0.0; n];

    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        tr[i] = bars[i].true_range(bars[i - 1].close);
    }

    // Wilder running sums: seed with the first `period` raw values, then
    // smoothed = prev - prev/period + current.
    let mut sm_plus = 0.0;
    let mut sm_minus = 0.0;
    let mut sm_tr = 0.0;
    let mut dx = vec![f64::NAN; n];

    for i in 1..n {
        if i <= period {
            sm_plus += plus_dm[i];
            sm_minus += minus_dm[i];
            sm_tr += tr[i];
            if i < period {
                continue;
            }
        } else {
            sm_plus = sm_plus - sm_plus / period as f64 + plus_dm[i];
            sm_minus = sm_minus - sm_minus / period as f64 + minus_dm[i];
            sm_tr = sm_tr - sm_tr / period as f64 + tr[i];
        }

        if sm_tr > 0.0 {
            let plus_di = 100.0 * sm_plus / sm_tr;
            let minus_di = 100.0 * sm_minus / sm_tr;
            let di_sum = plus_di + minus_di;
            dx[i] = if di_sum > 0.0 {
                100.0 * (plus_di - minus_di).abs() / di_sum
            } else {
                0.0
            };
        } else {
            dx[i] = 0.0;
        }
    }

    let mut adx_prev = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i < 2 * period {
            series.push_invalid(bar.timestamp);
        } else if i == 2 * period {
            let seed: f64 = dx[period..=2 * period].iter().sum::<f64>() / (period + 1) as f64;
            adx_prev = seed;
            series.push(bar.timestamp, true, adx_prev);
        } else {
            adx_prev = (adx_prev * (period - 1) as f64 + dx[i]) / period as f64;
            series.push(bar.timestamp, true, adx_prev);
        }
    }

    series
}
