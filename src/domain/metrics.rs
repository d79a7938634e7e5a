//! Backtest performance aggregation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::signal::Direction;

/// Why a simulated position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Target,
    Time,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Stop => "stop",
            ExitReason::Target => "target",
            ExitReason::Time => "time",
        }
    }
}

/// One completed round trip in the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub position_size: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Aggregate backtest output: headline statistics, per-reason rejection
/// counts, the full trade ledger, and the mark-to-market equity curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub trade_count: usize,
    pub win_rate: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub rejection_counts: BTreeMap<String, usize>,
    pub trade_ledger: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn compute(
        initial_balance: f64,
        trade_ledger: Vec<TradeRecord>,
        equity_curve: Vec<EquityPoint>,
        rejection_counts: BTreeMap<String, usize>,
        bars_per_year: f64,
    ) -> Self {
        let final_balance = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);

        let total_return = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance
        } else {
            0.0
        };

        let n_bars = equity_curve.len() as f64;
        let annualized_return =
            if n_bars > 0.0 && bars_per_year > 0.0 && total_return > -1.0 {
                (1.0 + total_return).powf(bars_per_year / n_bars) - 1.0
            } else {
                0.0
            };

        let max_drawdown = compute_drawdown(&equity_curve);

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_wins = 0.0f64;
        let mut total_losses = 0.0f64;
        for trade in &trade_ledger {
            if trade.pnl > 0.0 {
                wins += 1;
                total_wins += trade.pnl;
            } else if trade.pnl < 0.0 {
                losses += 1;
                total_losses += trade.pnl.abs();
            }
        }

        let trade_count = trade_ledger.len();
        let win_rate = if trade_count > 0 {
            wins as f64 / trade_count as f64
        } else {
            0.0
        };
        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let avg_win = if wins > 0 { total_wins / wins as f64 } else { 0.0 };
        let avg_loss = if losses > 0 {
            total_losses / losses as f64
        } else {
            0.0
        };

        BacktestReport {
            trade_count,
            win_rate,
            total_return,
            annualized_return,
            max_drawdown,
            profit_factor,
            avg_win,
            avg_loss,
            initial_balance,
            final_balance,
            rejection_counts,
            trade_ledger,
            equity_curve,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}
