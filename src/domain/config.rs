//! Typed configuration built from a [`ConfigPort`], with validation.
//!
//! Every tunable of the decision chain, the backtest, and the labeler is
//! read here; missing keys fall back to defaults, invalid values fail fast
//! with `ConfigInvalid` naming the section and key.

use crate::domain::backtest::{BacktestConfig, TieBreak};
use crate::domain::decision::DecisionConfig;
use crate::domain::error::TrendgateError;
use crate::domain::pattern::PatternConfig;
use crate::domain::regime::RegimeConfig;
use crate::domain::risk::RiskParams;
use crate::ports::config_port::ConfigPort;

/// Triple-barrier labeling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelConfig {
    pub horizon_steps: usize,
    pub return_threshold: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            horizon_steps: 24,
            return_threshold: 0.005,
        }
    }
}

pub fn regime_config(config: &dyn ConfigPort) -> Result<RegimeConfig, TrendgateError> {
    let defaults = RegimeConfig::default();
    let cfg = RegimeConfig {
        hurst_window: positive_int(config, "regime", "hurst_window", defaults.hurst_window)?,
        atr_window: positive_int(config, "regime", "atr_window", defaults.atr_window)?,
        atr_percentile: config.get_double("regime", "atr_percentile", defaults.atr_percentile),
        trending_threshold: config.get_double(
            "regime",
            "trending_threshold",
            defaults.trending_threshold,
        ),
        mean_reversion_threshold: config.get_double(
            "regime",
            "mean_reversion_threshold",
            defaults.mean_reversion_threshold,
        ),
    };

    if !(cfg.atr_percentile > 0.0 && cfg.atr_percentile <= 1.0) {
        return Err(invalid("regime", "atr_percentile", "must be in (0, 1]"));
    }
    if cfg.mean_reversion_threshold > cfg.trending_threshold {
        return Err(invalid(
            "regime",
            "mean_reversion_threshold",
            "must not exceed trending_threshold",
        ));
    }
    if cfg.hurst_window <= cfg.atr_window {
        return Err(invalid("regime", "hurst_window", "must exceed atr_window"));
    }
    Ok(cfg)
}

pub fn risk_params(config: &dyn ConfigPort) -> Result<RiskParams, TrendgateError> {
    let defaults = RiskParams::default();
    let params = RiskParams {
        risk_fraction: config.get_double("risk", "risk_fraction", defaults.risk_fraction),
        reward_ratio: config.get_double("risk", "reward_ratio", defaults.reward_ratio),
        atr_multiple: config.get_double("risk", "atr_multiple", defaults.atr_multiple),
    };

    // risking more than 10% per trade is a config typo, not a strategy
    if !(params.risk_fraction > 0.0 && params.risk_fraction < 0.1) {
        return Err(invalid("risk", "risk_fraction", "must be in (0, 0.1)"));
    }
    if params.reward_ratio <= 0.0 {
        return Err(invalid("risk", "reward_ratio", "must be positive"));
    }
    if params.atr_multiple <= 0.0 {
        return Err(invalid("risk", "atr_multiple", "must be positive"));
    }
    Ok(params)
}

pub fn pattern_config(config: &dyn ConfigPort) -> Result<PatternConfig, TrendgateError> {
    let defaults = PatternConfig::default();
    let cfg = PatternConfig {
        engulfing_body_factor: config.get_double(
            "patterns",
            "engulfing_body_factor",
            defaults.engulfing_body_factor,
        ),
        doji_threshold_ratio: config.get_double(
            "patterns",
            "doji_threshold_ratio",
            defaults.doji_threshold_ratio,
        ),
        sma_fast: positive_int(config, "patterns", "sma_fast", defaults.sma_fast)?,
        sma_slow: positive_int(config, "patterns", "sma_slow", defaults.sma_slow)?,
    };

    if cfg.sma_fast >= cfg.sma_slow {
        return Err(invalid("patterns", "sma_fast", "must be below sma_slow"));
    }
    if !(cfg.doji_threshold_ratio > 0.0 && cfg.doji_threshold_ratio < 1.0) {
        return Err(invalid(
            "patterns",
            "doji_threshold_ratio",
            "must be in (0, 1)",
        ));
    }
    Ok(cfg)
}

pub fn decision_config(config: &dyn ConfigPort) -> Result<DecisionConfig, TrendgateError> {
    let defaults = DecisionConfig::default();
    let cfg = DecisionConfig {
        regime: regime_config(config)?,
        pattern: pattern_config(config)?,
        pattern_recency: positive_int(
            config,
            "decision",
            "pattern_recency",
            defaults.pattern_recency,
        )?,
        overbought_rsi: config.get_double("decision", "overbought_rsi", defaults.overbought_rsi),
        ml_threshold: config.get_double("decision", "ml_threshold", defaults.ml_threshold),
        risk: risk_params(config)?,
        account_balance: config.get_double(
            "decision",
            "account_balance",
            defaults.account_balance,
        ),
    };

    if !(0.0..=1.0).contains(&cfg.ml_threshold) {
        return Err(invalid("decision", "ml_threshold", "must be in [0, 1]"));
    }
    if !(0.0..=100.0).contains(&cfg.overbought_rsi) {
        return Err(invalid("decision", "overbought_rsi", "must be in [0, 100]"));
    }
    if cfg.account_balance <= 0.0 {
        return Err(invalid("decision", "account_balance", "must be positive"));
    }
    Ok(cfg)
}

pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TrendgateError> {
    let defaults = BacktestConfig::default();
    let tie_break = match config.get_string("backtest", "tie_break") {
        None => defaults.tie_break,
        Some(raw) => TieBreak::parse(&raw).ok_or_else(|| {
            invalid("backtest", "tie_break", "must be stop_first or target_first")
        })?,
    };

    let cfg = BacktestConfig {
        max_hold_bars: positive_int(config, "backtest", "max_hold_bars", defaults.max_hold_bars)?,
        tie_break,
        bars_per_year: config.get_double("backtest", "bars_per_year", defaults.bars_per_year),
    };

    if cfg.bars_per_year <= 0.0 {
        return Err(invalid("backtest", "bars_per_year", "must be positive"));
    }
    Ok(cfg)
}

pub fn label_config(config: &dyn ConfigPort) -> Result<LabelConfig, TrendgateError> {
    let defaults = LabelConfig::default();
    let cfg = LabelConfig {
        horizon_steps: positive_int(
            config,
            "labeling",
            "horizon_steps",
            defaults.horizon_steps,
        )?,
        return_threshold: config.get_double(
            "labeling",
            "return_threshold",
            defaults.return_threshold,
        ),
    };

    if cfg.return_threshold <= 0.0 {
        return Err(invalid("labeling", "return_threshold", "must be positive"));
    }
    Ok(cfg)
}

fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TrendgateError> {
    let value = config.get_int(section, key, default as i64);
    if value <= 0 {
        return Err(invalid(section, key, "must be a positive integer"));
    }
    Ok(value as usize)
}

fn invalid(section: &str, key: &str, reason: &str) -> TrendgateError {
    TrendgateError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}
