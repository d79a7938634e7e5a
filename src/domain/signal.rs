//! Trading signal types and decision outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::regime::Regime;

/// Trade direction for an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "long" => Some(Direction::Long),
            "short" => Some(Direction::Short),
            _ => None,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully vetted trading signal. Terminal and immutable once persisted;
/// unique per (symbol, timeframe, timestamp).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
    pub model_probability: f64,
    pub regime: Regime,
}

/// Machine-readable reason a decision run ended without a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Regime,
    NoPattern,
    Overbought,
    MlBelowThreshold,
    DegenerateStop,
    InsufficientHistory,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Regime => "regime",
            RejectReason::NoPattern => "no_pattern",
            RejectReason::Overbought => "overbought",
            RejectReason::MlBelowThreshold => "ml_below_threshold",
            RejectReason::DegenerateStop => "degenerate_stop",
            RejectReason::InsufficientHistory => "insufficient_history",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one decision run: either a vetted signal or a terminal
/// rejection for that bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Emitted(TradingSignal),
    Rejected {
        timestamp: DateTime<Utc>,
        reason: RejectReason,
    },
}

impl Decision {
    pub fn is_emitted(&self) -> bool {
        matches!(self, Decision::Emitted(_))
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Decision::Emitted(_) => None,
            Decision::Rejected { reason, .. } => Some(*reason),
        }
    }
}
