#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};

use trendgate::domain::bar::Bar;
use trendgate::domain::decision::DecisionConfig;
use trendgate::domain::error::TrendgateError;
use trendgate::domain::model::{ModelArtifact, ModelHandle};
use trendgate::domain::pattern::PatternCandidate;
use trendgate::domain::regime::{RegimeConfig, RegimeObservation};
use trendgate::domain::signal::TradingSignal;
use trendgate::ports::bar_feed::BarFeed;
use trendgate::ports::model_registry::ModelRegistryPort;
use trendgate::ports::signal_store::SignalStore;

/// All synthetic bars span exactly this high-low range, which keeps the
/// ATR series flat and the volatility percentile gate quiet.
pub const RANGE: f64 = 2.55;

pub fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64)
}

pub fn make_bar(symbol: &str, i: usize, open: f64, close: f64) -> Bar {
    let body = (close - open).abs();
    let pad = (RANGE - body) / 2.0;
    Bar {
        symbol: symbol.to_string(),
        timestamp: ts(i),
        open,
        high: open.max(close) + pad,
        low: open.min(close) - pad,
        close,
        volume: 1000.0,
    }
}

/// Sawtooth uptrend (+2 / -1 closes) with a bullish engulfing pair planted
/// at `engulf_at - 1` and `engulf_at`.
pub fn series_with_engulfing(symbol: &str, n: usize, engulf_at: usize) -> Vec<Bar> {
    let mut bars: Vec<Bar> = Vec::with_capacity(n);
    let mut close = 100.0;
    bars.push(make_bar(symbol, 0, 99.9, close));
    for i in 1..n {
        let prev_close = close;
        if i == engulf_at - 1 {
            let open = prev_close + 0.3;
            close = prev_close - 0.3;
            bars.push(make_bar(symbol, i, open, close));
        } else if i == engulf_at {
            let open = prev_close - 0.1;
            close = prev_close + 1.1;
            bars.push(make_bar(symbol, i, open, close));
        } else {
            close += if i % 2 == 1 { 2.0 } else { -1.0 };
            let open = if close > prev_close {
                prev_close + 0.05
            } else {
                prev_close - 0.05
            };
            bars.push(make_bar(symbol, i, open, close));
        }
    }
    bars
}

/// Near-monotone rise that pins RSI far above any overbought threshold,
/// with the same engulfing pair at the end.
pub fn overbought_series(symbol: &str, n: usize) -> Vec<Bar> {
    let mut bars: Vec<Bar> = Vec::with_capacity(n);
    let mut close = 100.0;
    bars.push(make_bar(symbol, 0, 99.9, close));
    for i in 1..n - 2 {
        let prev_close = close;
        close += 1.0;
        bars.push(make_bar(symbol, i, prev_close + 0.05, close));
    }
    let base = close;
    bars.push(make_bar(symbol, n - 2, base + 0.3, base - 0.3));
    bars.push(make_bar(symbol, n - 1, base - 0.4, base + 0.8));
    bars
}

/// Decision config with regime thresholds rigged so any non-spiked series
/// classifies as Trending.
pub fn trending_cfg() -> DecisionConfig {
    DecisionConfig {
        regime: RegimeConfig {
            trending_threshold: -1.0,
            mean_reversion_threshold: -2.0,
            ..RegimeConfig::default()
        },
        ..DecisionConfig::default()
    }
}

pub struct MockBarFeed {
    pub data: HashMap<(String, String), Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarFeed {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, timeframe: &str, bars: Vec<Bar>) -> Self {
        self.data
            .insert((symbol.to_string(), timeframe.to_string()), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors
            .insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl BarFeed for MockBarFeed {
    fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, TrendgateError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TrendgateError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(&(symbol.to_string(), timeframe.to_string()))
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TrendgateError> {
        Ok(self
            .data
            .get(&(symbol.to_string(), timeframe.to_string()))
            .filter(|bars| !bars.is_empty())
            .map(|bars| {
                (
                    bars.first().unwrap().timestamp,
                    bars.last().unwrap().timestamp,
                    bars.len(),
                )
            }))
    }
}

/// In-memory SignalStore enforcing the same uniqueness keys as the SQLite
/// adapter.
#[derive(Default)]
pub struct MemoryStore {
    pub signals: RefCell<Vec<TradingSignal>>,
    pub candidates: RefCell<Vec<PatternCandidate>>,
    pub regimes: RefCell<Vec<RegimeObservation>>,
    signal_keys: RefCell<HashSet<(String, String, DateTime<Utc>)>>,
    candidate_keys: RefCell<HashSet<(String, DateTime<Utc>, String)>>,
    regime_keys: RefCell<HashSet<(String, String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_count(&self) -> usize {
        self.signals.borrow().len()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.borrow().len()
    }
}

impl SignalStore for MemoryStore {
    fn upsert_candidate(&self, candidate: &PatternCandidate) -> Result<bool, TrendgateError> {
        let key = (
            candidate.symbol.clone(),
            candidate.timestamp,
            candidate.pattern_type.as_str().to_string(),
        );
        if self.candidate_keys.borrow_mut().insert(key) {
            self.candidates.borrow_mut().push(candidate.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn save_signal(&self, signal: &TradingSignal) -> Result<bool, TrendgateError> {
        let key = (
            signal.symbol.clone(),
            signal.timeframe.clone(),
            signal.timestamp,
        );
        if self.signal_keys.borrow_mut().insert(key) {
            self.signals.borrow_mut().push(signal.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn save_regime(&self, observation: &RegimeObservation) -> Result<(), TrendgateError> {
        let key = (
            observation.symbol.clone(),
            observation.timeframe.clone(),
            observation.as_of,
        );
        if self.regime_keys.borrow_mut().insert(key) {
            self.regimes.borrow_mut().push(observation.clone());
        }
        Ok(())
    }
}

/// Registry stub with a switchable active artifact.
pub struct StubRegistry {
    artifacts: RefCell<HashMap<String, ModelArtifact>>,
    active: RefCell<Option<String>>,
}

impl StubRegistry {
    pub fn empty() -> Self {
        Self {
            artifacts: RefCell::new(HashMap::new()),
            active: RefCell::new(None),
        }
    }

    /// One active artifact that always returns `p`.
    pub fn with_probability(p: f64) -> Self {
        let registry = Self::empty();
        registry.add_version("1.0.0", p);
        registry.set_active(Some("1.0.0"));
        registry
    }

    pub fn add_version(&self, version: &str, p: f64) {
        self.artifacts.borrow_mut().insert(
            version.to_string(),
            ModelArtifact {
                version: version.to_string(),
                features: vec![],
                weights: vec![],
                bias: (p / (1.0 - p)).ln(),
            },
        );
    }

    pub fn set_active(&self, version: Option<&str>) {
        *self.active.borrow_mut() = version.map(|v| v.to_string());
    }
}

impl ModelRegistryPort for StubRegistry {
    fn get_active(&self, asset_class: &str) -> Result<Option<ModelHandle>, TrendgateError> {
        Ok(self.active.borrow().as_ref().map(|version| ModelHandle {
            version: version.clone(),
            path: format!("{version}.json"),
            file_hash: format!("hash-{version}"),
            asset_class: asset_class.to_string(),
            is_active: true,
        }))
    }

    fn load(&self, handle: &ModelHandle) -> Result<ModelArtifact, TrendgateError> {
        self.artifacts
            .borrow()
            .get(&handle.version)
            .cloned()
            .ok_or_else(|| TrendgateError::HashMismatch {
                version: handle.version.clone(),
                expected: handle.file_hash.clone(),
                actual: "missing".into(),
            })
    }
}
