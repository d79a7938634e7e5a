//! Market regime classification.
//!
//! Combines a Hurst persistence estimate with an ATR volatility percentile
//! gate. Precedence, first match wins: HighVolatility, Trending,
//! MeanReverting, Random. All comparisons are strict, so a value sitting
//! exactly on a threshold falls through to the lower-precedence label.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bar::Bar;
use crate::domain::error::TrendgateError;
use crate::domain::hurst;
use crate::domain::indicator::atr::calculate_atr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trending,
    MeanReverting,
    HighVolatility,
    Random,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trending => "TRENDING",
            Regime::MeanReverting => "MEAN_REVERTING",
            Regime::HighVolatility => "HIGH_VOLATILITY",
            Regime::Random => "RANDOM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TRENDING" => Some(Regime::Trending),
            "MEAN_REVERTING" => Some(Regime::MeanReverting),
            "HIGH_VOLATILITY" => Some(Regime::HighVolatility),
            "RANDOM" => Some(Regime::Random),
            _ => None,
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One regime classification at a point in time, computed only from bars
/// with timestamp <= as_of.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeObservation {
    pub symbol: String,
    pub timeframe: String,
    pub as_of: DateTime<Utc>,
    pub hurst: f64,
    pub atr: f64,
    pub regime: Regime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub hurst_window: usize,
    pub atr_window: usize,
    pub atr_percentile: f64,
    pub trending_threshold: f64,
    pub mean_reversion_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            hurst_window: 100,
            atr_window: 14,
            atr_percentile: 0.90,
            trending_threshold: 0.55,
            mean_reversion_threshold: 0.45,
        }
    }
}

/// Classify the market regime from the trailing `hurst_window` bars.
pub fn classify(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
    cfg: &RegimeConfig,
) -> Result<RegimeObservation, TrendgateError> {
    let need = cfg.hurst_window.max(1);
    if bars.len() < need {
        return Err(TrendgateError::InsufficientHistory {
            symbol: symbol.to_string(),
            have: bars.len(),
            need,
        });
    }

    let window = &bars[bars.len() - need..];
    let last = &window[window.len() - 1];

    let returns: Vec<f64> = window
        .windows(2)
        .filter(|pair| pair[0].close > 0.0 && pair[1].close > 0.0)
        .map(|pair| (pair[1].close / pair[0].close).ln())
        .collect();
    let hurst = hurst::estimate(&returns);

    let atr_series = calculate_atr(window, cfg.atr_window);
    let mut atr_values = atr_series.valid_values();
    let latest_atr =
        *atr_values
            .last()
            .ok_or_else(|| TrendgateError::InsufficientHistory {
                symbol: symbol.to_string(),
                have: window.len(),
                need: cfg.atr_window,
            })?;
    atr_values.sort_by(|a, b| a.total_cmp(b));
    let atr_cutoff = percentile(&atr_values, cfg.atr_percentile);

    let regime = if latest_atr > atr_cutoff {
        Regime::HighVolatility
    } else if hurst > cfg.trending_threshold {
        Regime::Trending
    } else if hurst < cfg.mean_reversion_threshold {
        Regime::MeanReverting
    } else {
        Regime::Random
    };

    Ok(RegimeObservation {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        as_of: last.timestamp,
        hurst,
        atr: latest_atr,
        regime,
    })
}

/// Nearest-rank percentile of an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_bar(i: usize, close: f64, half_range: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(i as i64),
            open: close,
            high: close + half_range,
            low: close - half_range,
            close,
            volume: 1000.0,
        }
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        (0..n).map(|i| make_bar(i, 100.0, 1.0)).collect()
    }

    #[test]
    fn insufficient_history_errors() {
        let bars = flat_bars(50);
        let err = classify("TEST", "H1", &bars, &RegimeConfig::default()).unwrap_err();
        match err {
            TrendgateError::InsufficientHistory { have, need, .. } => {
                assert_eq!(have, 50);
                assert_eq!(need, 100);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flat_series_is_random() {
        let bars = flat_bars(120);
        let obs = classify("TEST", "H1", &bars, &RegimeConfig::default()).unwrap();
        assert_eq!(obs.regime, Regime::Random);
        assert!((obs.hurst - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn volatility_spike_wins_regardless_of_hurst() {
        // Constant ranges except a violent expansion at the end. Thresholds
        // are rigged so every non-spiked outcome would be Trending.
        let mut bars = flat_bars(115);
        let n = bars.len();
        for (j, bar) in bars[n - 5..].iter_mut().enumerate() {
            let close = 100.0;
            bar.high = close + 10.0 + j as f64;
            bar.low = close - 10.0 - j as f64;
        }
        let cfg = RegimeConfig {
            trending_threshold: -1.0,
            mean_reversion_threshold: -2.0,
            ..RegimeConfig::default()
        };
        let obs = classify("TEST", "H1", &bars, &cfg).unwrap();
        assert_eq!(obs.regime, Regime::HighVolatility);
    }

    #[test]
    fn persistent_drift_is_trending() {
        // Slowly-varying returns with steady ranges: high Hurst, flat ATR.
        let mut close = 100.0;
        let mut bars = Vec::new();
        for i in 0..130 {
            close *= 1.0 + (i as f64 / 40.0).sin() * 0.01;
            bars.push(make_bar(i, close, 4.0));
        }
        let obs = classify("TEST", "H1", &bars, &RegimeConfig::default()).unwrap();
        assert!(obs.hurst > 0.55, "hurst {}", obs.hurst);
        assert_eq!(obs.regime, Regime::Trending);
    }

    #[test]
    fn alternating_series_is_mean_reverting() {
        let mut close = 100.0;
        let mut bars = Vec::new();
        for i in 0..130 {
            close += if i % 2 == 0 { 2.0 } else { -2.0 };
            bars.push(make_bar(i, close, 3.0));
        }
        let obs = classify("TEST", "H1", &bars, &RegimeConfig::default()).unwrap();
        assert!(obs.hurst < 0.45, "hurst {}", obs.hurst);
        assert_eq!(obs.regime, Regime::MeanReverting);
    }

    #[test]
    fn threshold_tie_resolves_down() {
        // Flat closes pin Hurst at exactly 0.5; sitting exactly on both
        // thresholds must fall through to Random.
        let bars = flat_bars(120);
        let cfg = RegimeConfig {
            trending_threshold: 0.5,
            mean_reversion_threshold: 0.5,
            ..RegimeConfig::default()
        };
        let obs = classify("TEST", "H1", &bars, &cfg).unwrap();
        assert_eq!(obs.regime, Regime::Random);
    }

    #[test]
    fn observation_as_of_is_last_bar() {
        let bars = flat_bars(120);
        let obs = classify("TEST", "H1", &bars, &RegimeConfig::default()).unwrap();
        assert_eq!(obs.as_of, bars.last().unwrap().timestamp);
    }

    #[test]
    fn regime_round_trips_as_str() {
        for regime in [
            Regime::Trending,
            Regime::MeanReverting,
            Regime::HighVolatility,
            Regime::Random,
        ] {
            assert_eq!(Regime::parse(regime.as_str()), Some(regime));
        }
    }
}
