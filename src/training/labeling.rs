//! Triple-barrier outcome labeling (offline only).
//!
//! Scans forward from an entry price over at most `horizon_steps` future
//! bars: the first close beyond +return_threshold labels Up, the first
//! close beyond -return_threshold labels Down, and a horizon with neither
//! touch labels Timeout.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::bar::Bar;
use crate::domain::config::LabelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelOutcome {
    Up,
    Down,
    Timeout,
}

impl LabelOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelOutcome::Up => "UP",
            LabelOutcome::Down => "DOWN",
            LabelOutcome::Timeout => "TIMEOUT",
        }
    }

    /// Binary training target: 1 for Up, 0 otherwise.
    pub fn target(&self) -> u8 {
        matches!(self, LabelOutcome::Up) as u8
    }
}

/// Outcome label for one historical bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: LabelOutcome,
    /// When the winning barrier was touched; None on timeout.
    pub touch_timestamp: Option<DateTime<Utc>>,
}

/// Label the bar that closed at `entry_price` on `entry_ts` using only the
/// strictly-future `bars_after`.
pub fn label(
    symbol: &str,
    entry_ts: DateTime<Utc>,
    entry_price: f64,
    bars_after: &[Bar],
    cfg: &LabelConfig,
) -> Label {
    let upper = entry_price * (1.0 + cfg.return_threshold);
    let lower = entry_price * (1.0 - cfg.return_threshold);

    for bar in bars_after.iter().take(cfg.horizon_steps) {
        if bar.close >= upper {
            return Label {
                symbol: symbol.to_string(),
                timestamp: entry_ts,
                outcome: LabelOutcome::Up,
                touch_timestamp: Some(bar.timestamp),
            };
        }
        if bar.close <= lower {
            return Label {
                symbol: symbol.to_string(),
                timestamp: entry_ts,
                outcome: LabelOutcome::Down,
                touch_timestamp: Some(bar.timestamp),
            };
        }
    }

    Label {
        symbol: symbol.to_string(),
        timestamp: entry_ts,
        outcome: LabelOutcome::Timeout,
        touch_timestamp: None,
    }
}
