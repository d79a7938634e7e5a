//! Candlestick and crossover pattern scanning.
//!
//! `scan` is a pure function of its input window: each detector sweeps the
//! whole window and returns zero or more candidates, deduplicated by
//! (timestamp, pattern_type). Persistence of candidates is an idempotent
//! upsert on the same key, so re-scanning a window is always a no-op
//! downstream.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::bar::Bar;
use crate::domain::indicator::sma::calculate_sma;

/// Directional bias a pattern implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Bullish => "bullish",
            Bias::Bearish => "bearish",
            Bias::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bullish" => Some(Bias::Bullish),
            "bearish" => Some(Bias::Bearish),
            "neutral" => Some(Bias::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    EngulfingBullish,
    EngulfingBearish,
    Doji,
    SmaCrossBullish,
    SmaCrossBearish,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::EngulfingBullish => "ENGULFING_BULLISH",
            PatternType::EngulfingBearish => "ENGULFING_BEARISH",
            PatternType::Doji => "DOJI",
            PatternType::SmaCrossBullish => "SMA_CROSS_BULLISH",
            PatternType::SmaCrossBearish => "SMA_CROSS_BEARISH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ENGULFING_BULLISH" => Some(PatternType::EngulfingBullish),
            "ENGULFING_BEARISH" => Some(PatternType::EngulfingBearish),
            "DOJI" => Some(PatternType::Doji),
            "SMA_CROSS_BULLISH" => Some(PatternType::SmaCrossBullish),
            "SMA_CROSS_BEARISH" => Some(PatternType::SmaCrossBearish),
            _ => None,
        }
    }

    pub fn bias(&self) -> Bias {
        match self {
            PatternType::EngulfingBullish | PatternType::SmaCrossBullish => Bias::Bullish,
            PatternType::EngulfingBearish | PatternType::SmaCrossBearish => Bias::Bearish,
            PatternType::Doji => Bias::Neutral,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected pattern. At most one exists per
/// (symbol, timestamp, pattern_type).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternCandidate {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub pattern_type: PatternType,
    pub direction: Bias,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternConfig {
    pub engulfing_body_factor: f64,
    pub doji_threshold_ratio: f64,
    pub sma_fast: usize,
    pub sma_slow: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            engulfing_body_factor: 1.0,
            doji_threshold_ratio: 0.1,
            sma_fast: 5,
            sma_slow: 21,
        }
    }
}

/// Run every detector over the window and return candidates ordered by
/// timestamp, deduplicated by (timestamp, pattern_type).
pub fn scan(symbol: &str, window: &[Bar], cfg: &PatternConfig) -> Vec<PatternCandidate> {
    let mut seen: BTreeMap<(DateTime<Utc>, PatternType), PatternCandidate> = BTreeMap::new();

    let mut found = find_engulfing(symbol, window, cfg);
    found.extend(find_doji(symbol, window, cfg));
    found.extend(find_sma_crossover(symbol, window, cfg));

    for candidate in found {
        seen.entry((candidate.timestamp, candidate.pattern_type))
            .or_insert(candidate);
    }

    seen.into_values().collect()
}

/// Engulfing reversals: the current body strictly engulfs the previous
/// body, the candles have opposite colors, and the current body is larger
/// than the previous body by `engulfing_body_factor`.
pub fn find_engulfing(symbol: &str, window: &[Bar], cfg: &PatternConfig) -> Vec<PatternCandidate> {
    let mut candidates = Vec::new();

    for pair in window.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let prev_body = prev.body();
        let cur_body = cur.body();
        if prev_body <= 0.0 || cur_body <= prev_body * cfg.engulfing_body_factor {
            continue;
        }

        let bullish = cur.is_green()
            && prev.close < prev.open
            && cur.close > prev.open
            && cur.open < prev.close;
        let bearish = !cur.is_green()
            && prev.close > prev.open
            && cur.open > prev.close
            && cur.close < prev.open;

        if bullish || bearish {
            let ratio = cur_body / prev_body;
            candidates.push(PatternCandidate {
                symbol: symbol.to_string(),
                timestamp: cur.timestamp,
                pattern_type: if bullish {
                    PatternType::EngulfingBullish
                } else {
                    PatternType::EngulfingBearish
                },
                direction: if bullish { Bias::Bullish } else { Bias::Bearish },
                confidence: (ratio - 1.0).clamp(0.0, 1.0),
            });
        }
    }

    candidates
}

/// Doji indecision candles: body small relative to the bar's full range.
/// Flat candles (zero range) are skipped, not flagged.
pub fn find_doji(symbol: &str, window: &[Bar], cfg: &PatternConfig) -> Vec<PatternCandidate> {
    let mut candidates = Vec::new();

    for bar in window {
        let range = bar.high - bar.low;
        if range <= 0.0 {
            continue;
        }
        let ratio = bar.body() / range;
        if ratio < cfg.doji_threshold_ratio {
            candidates.push(PatternCandidate {
                symbol: symbol.to_string(),
                timestamp: bar.timestamp,
                pattern_type: PatternType::Doji,
                direction: Bias::Neutral,
                confidence: (1.0 - ratio / cfg.doji_threshold_ratio).clamp(0.0, 1.0),
            });
        }
    }

    candidates
}

/// Fast/slow SMA crossovers. Requires at least `sma_slow + 1` bars so the
/// previous bar has a valid slow average to compare against.
pub fn find_sma_crossover(
    symbol: &str,
    window: &[Bar],
    cfg: &PatternConfig,
) -> Vec<PatternCandidate> {
    let mut candidates = Vec::new();
    if window.len() < cfg.sma_slow + 1 {
        return candidates;
    }

    let fast = calculate_sma(window, cfg.sma_fast);
    let slow = calculate_sma(window, cfg.sma_slow);

    for i in 1..window.len() {
        let (Some(fast_prev), Some(slow_prev), Some(fast_cur), Some(slow_cur)) = (
            fast.value_at(i - 1),
            slow.value_at(i - 1),
            fast.value_at(i),
            slow.value_at(i),
        ) else {
            continue;
        };

        let bullish = fast_prev <= slow_prev && fast_cur > slow_cur;
        let bearish = fast_prev >= slow_prev && fast_cur < slow_cur;
        if bullish || bearish {
            candidates.push(PatternCandidate {
                symbol: symbol.to_string(),
                timestamp: window[i].timestamp,
                pattern_type: if bullish {
                    PatternType::SmaCrossBullish
                } else {
                    PatternType::SmaCrossBearish
                },
                direction: if bullish { Bias::Bullish } else { Bias::Bearish },
                confidence: 1.0,
            });
        }
    }

    candidates
}
