//! The decision gate chain.
//!
//! REGIME_CHECK -> PATTERN_CHECK -> CONFIRMATION_FILTER -> ML_GATE ->
//! RISK_SIZING -> signal, with rejection absorbing at every stage. Each
//! gate is a pure function returning a tagged outcome; `evaluate` threads
//! them and only the final stage constructs a `TradingSignal`. A rejection
//! is terminal for the bar; the next bar starts over from the regime
//! check.
//!
//! Model integrity failures (`NoActiveModel`, `HashMismatch`) propagate as
//! errors rather than rejections: no decision may be recorded against
//! unverified model state.

use crate::domain::bar::Bar;
use crate::domain::error::TrendgateError;
use crate::domain::features;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::model::ModelGateway;
use crate::domain::pattern::{self, Bias, PatternCandidate, PatternConfig};
use crate::domain::regime::{self, Regime, RegimeConfig, RegimeObservation};
use crate::domain::risk::{self, RiskParams};
use crate::domain::signal::{Decision, Direction, RejectReason, TradingSignal};

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
    pub regime: RegimeConfig,
    pub pattern: PatternConfig,
    /// A bullish candidate older than this many bars no longer counts.
    pub pattern_recency: usize,
    pub overbought_rsi: f64,
    pub ml_threshold: f64,
    pub risk: RiskParams,
    pub account_balance: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig {
            regime: RegimeConfig::default(),
            pattern: PatternConfig::default(),
            pattern_recency: 5,
            overbought_rsi: 70.0,
            ml_threshold: 0.60,
            risk: RiskParams::default(),
            account_balance: 10_000.0,
        }
    }
}

/// Run the full gate chain over `bars` (history up to and including the
/// decision bar) and produce one irrevocable outcome.
pub fn evaluate(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
    gateway: &ModelGateway<'_>,
    cfg: &DecisionConfig,
) -> Result<Decision, TrendgateError> {
    let Some(last) = bars.last() else {
        return Err(TrendgateError::InsufficientHistory {
            symbol: symbol.to_string(),
            have: 0,
            need: cfg.regime.hurst_window,
        });
    };
    let observation = regime::classify(symbol, timeframe, bars, &cfg.regime)?;
    let rejected = |reason: RejectReason| {
        Ok(Decision::Rejected {
            timestamp: last.timestamp,
            reason,
        })
    };

    if let Err(reason) = regime_gate(&observation) {
        return rejected(reason);
    }

    let scan_start = bars.len().saturating_sub(cfg.regime.hurst_window);
    let candidates = pattern::scan(symbol, &bars[scan_start..], &cfg.pattern);
    let _pattern = match pattern_gate(&candidates, bars, cfg.pattern_recency) {
        Ok(candidate) => candidate,
        Err(reason) => return rejected(reason),
    };

    let rsi = calculate_rsi(bars, features::RSI_WINDOW)
        .last_valid()
        .unwrap_or(0.0);
    if let Err(reason) = confirmation_gate(rsi, cfg.overbought_rsi) {
        return rejected(reason);
    }

    let feature_vector = features::build(symbol, timeframe, bars)?;
    let probability = gateway.probability(&feature_vector)?;
    if let Err(reason) = ml_gate(probability, cfg.ml_threshold) {
        return rejected(reason);
    }

    let plan = match risk::size(
        Direction::Long,
        last.close,
        observation.atr,
        cfg.account_balance,
        &cfg.risk,
    ) {
        Ok(plan) => plan,
        Err(TrendgateError::DegenerateStop { .. }) => {
            return rejected(RejectReason::DegenerateStop);
        }
        Err(other) => return Err(other),
    };

    Ok(Decision::Emitted(TradingSignal {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        timestamp: last.timestamp,
        direction: Direction::Long,
        entry_price: last.close,
        stop_loss: plan.stop_loss,
        take_profit: plan.take_profit,
        position_size: plan.position_size,
        model_probability: probability,
        regime: observation.regime,
    }))
}

/// Stage 1: only a trending market passes.
fn regime_gate(observation: &RegimeObservation) -> Result<(), RejectReason> {
    if observation.regime == Regime::Trending {
        Ok(())
    } else {
        Err(RejectReason::Regime)
    }
}

/// Stage 2: the most recent bullish candidate within the recency window.
fn pattern_gate<'c>(
    candidates: &'c [PatternCandidate],
    bars: &[Bar],
    recency: usize,
) -> Result<&'c PatternCandidate, RejectReason> {
    let cutoff_idx = bars.len().saturating_sub(recency);
    let cutoff = bars
        .get(cutoff_idx)
        .or_else(|| bars.first())
        .map(|b| b.timestamp)
        .ok_or(RejectReason::NoPattern)?;

    candidates
        .iter()
        .rev()
        .find(|c| c.direction == Bias::Bullish && c.timestamp >= cutoff)
        .ok_or(RejectReason::NoPattern)
}

/// Stage 3: refuse to buy into an overbought market.
fn confirmation_gate(rsi: f64, overbought: f64) -> Result<(), RejectReason> {
    if rsi > overbought {
        Err(RejectReason::Overbought)
    } else {
        Ok(())
    }
}

/// Stage 4: the meta-label gate over the active model's probability.
fn ml_gate(probability: f64, threshold: f64) -> Result<(), RejectReason> {
    if probability < threshold {
        Err(RejectReason::MlBelowThreshold)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::domain::model::{ModelArtifact, ModelHandle};
    use crate::ports::model_registry::ModelRegistryPort;

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64)
    }

    /// Every synthetic bar spans exactly this high-low range so the ATR
    /// series is flat and the volatility percentile gate stays quiet.
    const RANGE: f64 = 2.55;

    fn make_bar(i: usize, open: f64, close: f64) -> Bar {
        let body = (close - open).abs();
        let pad = (RANGE - body) / 2.0;
        Bar {
            symbol: "XAUUSD".into(),
            timestamp: ts(i),
            open,
            high: open.max(close) + pad,
            low: open.min(close) - pad,
            close,
            volume: 1000.0,
        }
    }

    /// Sawtooth uptrend: +2 / -1 alternating closes, opens gapped slightly
    /// so no bar accidentally engulfs its predecessor. RSI settles in the
    /// mid-60s.
    fn sawtooth_bars(n: usize) -> Vec<Bar> {
        let mut close = 100.0;
        let mut bars = vec![make_bar(0, 99.9, close)];
        for i in 1..n {
            let prev_close = close;
            close += if i % 2 == 1 { 2.0 } else { -1.0 };
            let open = if close > prev_close {
                prev_close + 0.05
            } else {
                prev_close - 0.05
            };
            bars.push(make_bar(i, open, close));
        }
        bars
    }

    /// Overwrite the last two bars with a bullish engulfing pair.
    fn plant_engulfing(bars: &mut [Bar]) {
        let n = bars.len();
        let base = bars[n - 3].close;
        bars[n - 2] = make_bar(n - 2, base + 0.3, base - 0.3);
        bars[n - 1] = make_bar(n - 1, base - 0.4, base + 0.8);
    }

    /// Regime thresholds rigged so any non-spiked series reads Trending.
    fn trending_cfg() -> DecisionConfig {
        DecisionConfig {
            regime: RegimeConfig {
                trending_threshold: -1.0,
                mean_reversion_threshold: -2.0,
                ..RegimeConfig::default()
            },
            ..DecisionConfig::default()
        }
    }

    struct StubRegistry {
        artifact: Option<ModelArtifact>,
    }

    impl StubRegistry {
        fn with_probability(p: f64) -> Self {
            StubRegistry {
                artifact: Some(ModelArtifact {
                    version: "1.0.0".into(),
                    features: vec![],
                    weights: vec![],
                    bias: (p / (1.0 - p)).ln(),
                }),
            }
        }

        fn empty() -> Self {
            StubRegistry { artifact: None }
        }
    }

    impl ModelRegistryPort for StubRegistry {
        fn get_active(&self, _asset_class: &str) -> Result<Option<ModelHandle>, TrendgateError> {
            Ok(self.artifact.as_ref().map(|a| ModelHandle {
                version: a.version.clone(),
                path: "model.json".into(),
                file_hash: "hash".into(),
                asset_class: "commodity".into(),
                is_active: true,
            }))
        }

        fn load(&self, _handle: &ModelHandle) -> Result<ModelArtifact, TrendgateError> {
            Ok(self.artifact.clone().unwrap())
        }
    }

    #[test]
    fn insufficient_history_is_an_error() {
        let bars = sawtooth_bars(50);
        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        let err = evaluate("XAUUSD", "H1", &bars, &gateway, &trending_cfg()).unwrap_err();
        assert!(matches!(err, TrendgateError::InsufficientHistory { .. }));
    }

    #[test]
    fn non_trending_regime_rejects() {
        let mut bars = sawtooth_bars(150);
        plant_engulfing(&mut bars);
        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        // default thresholds: the sawtooth's Hurst reads anti-persistent
        let cfg = DecisionConfig::default();
        let decision = evaluate("XAUUSD", "H1", &bars, &gateway, &cfg).unwrap();
        assert_eq!(decision.reject_reason(), Some(RejectReason::Regime));
    }

    #[test]
    fn no_recent_pattern_rejects() {
        let bars = sawtooth_bars(150);
        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        let decision = evaluate("XAUUSD", "H1", &bars, &gateway, &trending_cfg()).unwrap();
        assert_eq!(decision.reject_reason(), Some(RejectReason::NoPattern));
    }

    #[test]
    fn full_chain_emits_long_signal() {
        let mut bars = sawtooth_bars(150);
        plant_engulfing(&mut bars);
        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        let cfg = trending_cfg();

        let decision = evaluate("XAUUSD", "H1", &bars, &gateway, &cfg).unwrap();
        let Decision::Emitted(signal) = decision else {
            panic!("expected a signal, got {decision:?}");
        };

        let last = bars.last().unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.timestamp, last.timestamp);
        assert_relative_eq!(signal.entry_price, last.close);
        assert_relative_eq!(signal.model_probability, 0.8, epsilon = 1e-12);
        assert!(signal.stop_loss < signal.entry_price);
        assert!(signal.take_profit > signal.entry_price);
        assert!(signal.position_size > 0.0);

        // stop distance and target respect the configured multiples
        let stop_distance = signal.entry_price - signal.stop_loss;
        assert_relative_eq!(
            signal.take_profit - signal.entry_price,
            cfg.risk.reward_ratio * stop_distance,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            signal.position_size * stop_distance,
            cfg.account_balance * cfg.risk.risk_fraction,
            epsilon = 1e-9
        );
    }

    #[test]
    fn overbought_rejects_after_pattern_passes() {
        // near-monotone rise pins RSI well above 70
        let mut close = 100.0;
        let mut bars = vec![make_bar(0, 99.9, close)];
        for i in 1..150 {
            let prev_close = close;
            close += 1.0;
            bars.push(make_bar(i, prev_close + 0.05, close));
        }
        plant_engulfing(&mut bars);

        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        let decision = evaluate("XAUUSD", "H1", &bars, &gateway, &trending_cfg()).unwrap();
        assert_eq!(decision.reject_reason(), Some(RejectReason::Overbought));
    }

    #[test]
    fn low_probability_rejects() {
        let mut bars = sawtooth_bars(150);
        plant_engulfing(&mut bars);
        let registry = StubRegistry::with_probability(0.4);
        let gateway = ModelGateway::new(&registry, "commodity");
        let decision = evaluate("XAUUSD", "H1", &bars, &gateway, &trending_cfg()).unwrap();
        assert_eq!(
            decision.reject_reason(),
            Some(RejectReason::MlBelowThreshold)
        );
    }

    #[test]
    fn probability_at_threshold_passes() {
        assert!(ml_gate(0.60, 0.60).is_ok());
        assert!(ml_gate(0.5999, 0.60).is_err());
    }

    #[test]
    fn rsi_at_threshold_passes() {
        assert!(confirmation_gate(70.0, 70.0).is_ok());
        assert!(confirmation_gate(70.1, 70.0).is_err());
    }

    #[test]
    fn no_active_model_propagates_as_error() {
        let mut bars = sawtooth_bars(150);
        plant_engulfing(&mut bars);
        let registry = StubRegistry::empty();
        let gateway = ModelGateway::new(&registry, "commodity");
        let err = evaluate("XAUUSD", "H1", &bars, &gateway, &trending_cfg()).unwrap_err();
        assert!(matches!(err, TrendgateError::NoActiveModel { .. }));
    }

    #[test]
    fn zero_atr_multiple_degenerates_to_rejection() {
        let mut bars = sawtooth_bars(150);
        plant_engulfing(&mut bars);
        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        let cfg = DecisionConfig {
            risk: RiskParams {
                atr_multiple: 0.0,
                ..RiskParams::default()
            },
            ..trending_cfg()
        };
        let decision = evaluate("XAUUSD", "H1", &bars, &gateway, &cfg).unwrap();
        assert_eq!(decision.reject_reason(), Some(RejectReason::DegenerateStop));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut bars = sawtooth_bars(150);
        plant_engulfing(&mut bars);
        let registry = StubRegistry::with_probability(0.8);
        let gateway = ModelGateway::new(&registry, "commodity");
        let cfg = trending_cfg();
        let a = evaluate("XAUUSD", "H1", &bars, &gateway, &cfg).unwrap();
        let b = evaluate("XAUUSD", "H1", &bars, &gateway, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pattern_gate_ignores_stale_candidates() {
        let bars = sawtooth_bars(30);
        let candidates = vec![PatternCandidate {
            symbol: "XAUUSD".into(),
            timestamp: bars[5].timestamp,
            pattern_type: pattern::PatternType::EngulfingBullish,
            direction: Bias::Bullish,
            confidence: 1.0,
        }];
        assert!(pattern_gate(&candidates, &bars, 5).is_err());
        assert!(pattern_gate(&candidates, &bars, 30).is_ok());
    }
}
