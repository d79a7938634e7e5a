//! Bar-by-bar backtest replay.
//!
//! Replays the decision gate chain over history under a hard causality
//! constraint: the decision at bar i sees `&bars[..=i]` and nothing else.
//! Signals fill at the next bar's open with stop and target re-anchored to
//! the fill price; exits trigger off subsequent bars' high/low. When a bar
//! breaches both stop and target, the configured tie-break decides which
//! fires; the conservative default assumes the stop was hit first. A bar
//! without enough warm-up history degrades to a rejection and the run
//! continues; model integrity failures abort the whole run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::bar::Bar;
use crate::domain::decision::{self, DecisionConfig};
use crate::domain::error::TrendgateError;
use crate::domain::metrics::{BacktestReport, EquityPoint, ExitReason, TradeRecord};
use crate::domain::model::ModelGateway;
use crate::domain::risk;
use crate::domain::signal::{Decision, Direction, RejectReason, TradingSignal};

/// Which exit wins when one bar touches both stop and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    StopFirst,
    TargetFirst,
}

impl TieBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::StopFirst => "stop_first",
            TieBreak::TargetFirst => "target_first",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop_first" => Some(TieBreak::StopFirst),
            "target_first" => Some(TieBreak::TargetFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Bars a position may stay open before the time exit closes it.
    pub max_hold_bars: usize,
    pub tie_break: TieBreak,
    /// Annualization base for the report (bars per year of the timeframe).
    pub bars_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            max_hold_bars: 24,
            tie_break: TieBreak::StopFirst,
            bars_per_year: 252.0 * 24.0,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenPosition {
    direction: Direction,
    entry_ts: DateTime<Utc>,
    entry_index: usize,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
    position_size: f64,
}

/// Replay the decision chain over `bars` and aggregate the outcome.
pub fn run(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
    gateway: &ModelGateway<'_>,
    decision_cfg: &DecisionConfig,
    cfg: &BacktestConfig,
) -> Result<BacktestReport, TrendgateError> {
    info!(symbol, timeframe, bars = bars.len(), "backtest starting");

    let initial_balance = decision_cfg.account_balance;
    let mut balance = initial_balance;
    let mut ledger: Vec<TradeRecord> = Vec::new();
    let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(bars.len());
    let mut rejections: BTreeMap<String, usize> = BTreeMap::new();
    let mut open: Option<OpenPosition> = None;
    let mut pending: Option<TradingSignal> = None;

    for i in 0..bars.len() {
        let bar = &bars[i];

        // 1. Exit checks, never on the bar the position was filled.
        if let Some(pos) = open.take() {
            match check_exit(&pos, bar, i, cfg).filter(|_| i > pos.entry_index) {
                Some((exit_price, exit_reason)) => {
                    let pnl =
                        (exit_price - pos.entry_price) * pos.position_size * pos.direction.sign();
                    balance += pnl;
                    debug!(
                        entry = %pos.entry_ts,
                        exit = %bar.timestamp,
                        reason = exit_reason.as_str(),
                        pnl,
                        "position closed"
                    );
                    ledger.push(TradeRecord {
                        entry_ts: pos.entry_ts,
                        exit_ts: bar.timestamp,
                        direction: pos.direction,
                        entry_price: pos.entry_price,
                        exit_price,
                        position_size: pos.position_size,
                        pnl,
                        exit_reason,
                    });
                }
                None => open = Some(pos),
            }
        }

        // 2. A signal from the previous bar fills at this bar's open, with
        // stop and target re-anchored to the actual fill price.
        if open.is_none() {
            if let Some(signal) = pending.take() {
                let stop_distance = (signal.entry_price - signal.stop_loss).abs();
                match risk::plan(
                    signal.direction,
                    bar.open,
                    stop_distance,
                    balance,
                    &decision_cfg.risk,
                ) {
                    Ok(plan) => {
                        debug!(fill = bar.open, ts = %bar.timestamp, "entry filled");
                        open = Some(OpenPosition {
                            direction: signal.direction,
                            entry_ts: bar.timestamp,
                            entry_index: i,
                            entry_price: bar.open,
                            stop_loss: plan.stop_loss,
                            take_profit: plan.take_profit,
                            position_size: plan.position_size,
                        });
                    }
                    Err(TrendgateError::DegenerateStop { .. }) => {
                        count(&mut rejections, RejectReason::DegenerateStop);
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        // 3. When flat, run the gate chain on history up to this bar. The
        // last bar is skipped: its signal could never fill.
        if open.is_none() && pending.is_none() && i + 1 < bars.len() {
            match decision::evaluate(symbol, timeframe, &bars[..=i], gateway, decision_cfg) {
                Ok(Decision::Emitted(signal)) => {
                    debug!(ts = %signal.timestamp, "signal emitted");
                    pending = Some(signal);
                }
                Ok(Decision::Rejected { reason, .. }) => count(&mut rejections, reason),
                Err(
                    TrendgateError::InsufficientHistory { .. }
                    | TrendgateError::DataUnavailable { .. },
                ) => count(&mut rejections, RejectReason::InsufficientHistory),
                Err(fatal) => return Err(fatal),
            }
        }

        let unrealized = open
            .as_ref()
            .map(|p| (bar.close - p.entry_price) * p.position_size * p.direction.sign())
            .unwrap_or(0.0);
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: balance + unrealized,
        });
    }

    let report = BacktestReport::compute(
        initial_balance,
        ledger,
        equity_curve,
        rejections,
        cfg.bars_per_year,
    );
    info!(
        trades = report.trade_count,
        win_rate = report.win_rate,
        total_return = report.total_return,
        "backtest finished"
    );
    Ok(report)
}

fn check_exit(
    pos: &OpenPosition,
    bar: &Bar,
    i: usize,
    cfg: &BacktestConfig,
) -> Option<(f64, ExitReason)> {
    let (stop_hit, target_hit) = match pos.direction {
        Direction::Long => (bar.low <= pos.stop_loss, bar.high >= pos.take_profit),
        Direction::Short => (bar.high >= pos.stop_loss, bar.low <= pos.take_profit),
    };

    match (stop_hit, target_hit) {
        (true, true) => Some(match cfg.tie_break {
            TieBreak::StopFirst => (pos.stop_loss, ExitReason::Stop),
            TieBreak::TargetFirst => (pos.take_profit, ExitReason::Target),
        }),
        (true, false) => Some((pos.stop_loss, ExitReason::Stop)),
        (false, true) => Some((pos.take_profit, ExitReason::Target)),
        (false, false) if i - pos.entry_index >= cfg.max_hold_bars => {
            Some((bar.close, ExitReason::Time))
        }
        _ => None,
    }
}

fn count(rejections: &mut BTreeMap<String, usize>, reason: RejectReason) {
    *rejections.entry(reason.as_str().to_string()).or_insert(0) += 1;
}
