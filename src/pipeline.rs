//! Live decision pipeline.
//!
//! `run_decision` is the entry point an external trigger calls once per
//! bar-close event. It mirrors the offline replay exactly: fetch history up
//! to `as_of`, persist the regime observation and any pattern candidates
//! for audit, then run the gate chain and persist the signal if one is
//! emitted. Every persistence step is idempotent, so at-least-once trigger
//! delivery cannot duplicate a signal.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::bar::timeframe_duration;
use crate::domain::decision::{self, DecisionConfig};
use crate::domain::error::TrendgateError;
use crate::domain::model::ModelGateway;
use crate::domain::pattern;
use crate::domain::regime;
use crate::domain::signal::Decision;
use crate::ports::bar_feed::BarFeed;
use crate::ports::signal_store::SignalStore;

pub struct DecisionRunner<'a> {
    feed: &'a dyn BarFeed,
    store: &'a dyn SignalStore,
    gateway: ModelGateway<'a>,
    cfg: DecisionConfig,
    /// How many bars of history to request ahead of the warm-up need.
    lookback_bars: usize,
}

impl<'a> DecisionRunner<'a> {
    pub fn new(
        feed: &'a dyn BarFeed,
        store: &'a dyn SignalStore,
        gateway: ModelGateway<'a>,
        cfg: DecisionConfig,
        lookback_bars: usize,
    ) -> Self {
        Self {
            feed,
            store,
            gateway,
            cfg,
            lookback_bars,
        }
    }

    /// One decision run for (symbol, timeframe) as of a bar-close event.
    pub fn run_decision(
        &self,
        symbol: &str,
        timeframe: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Decision, TrendgateError> {
        let step = timeframe_duration(timeframe).ok_or_else(|| TrendgateError::ConfigInvalid {
            section: "data".into(),
            key: "timeframe".into(),
            reason: format!("unknown timeframe {timeframe}"),
        })?;

        let start = as_of - step * self.lookback_bars as i32;
        let mut bars = self.feed.fetch(symbol, timeframe, start, as_of)?;
        // a sloppy feed must never leak post-as_of bars into the decision
        bars.retain(|b| b.timestamp <= as_of);
        info!(symbol, timeframe, %as_of, bars = bars.len(), "decision run starting");

        let observation = regime::classify(symbol, timeframe, &bars, &self.cfg.regime)?;
        self.store.save_regime(&observation)?;
        info!(
            regime = observation.regime.as_str(),
            hurst = observation.hurst,
            atr = observation.atr,
            "regime observed"
        );

        let scan_start = bars.len().saturating_sub(self.cfg.regime.hurst_window);
        let candidates = pattern::scan(symbol, &bars[scan_start..], &self.cfg.pattern);
        let mut fresh = 0usize;
        for candidate in &candidates {
            if self.store.upsert_candidate(candidate)? {
                fresh += 1;
            }
        }
        info!(found = candidates.len(), fresh, "pattern scan complete");

        let decision = decision::evaluate(symbol, timeframe, &bars, &self.gateway, &self.cfg)?;
        match &decision {
            Decision::Emitted(signal) => {
                let created = self.store.save_signal(signal)?;
                if created {
                    info!(
                        entry = signal.entry_price,
                        stop = signal.stop_loss,
                        target = signal.take_profit,
                        size = signal.position_size,
                        probability = signal.model_probability,
                        "signal emitted and persisted"
                    );
                } else {
                    warn!(%as_of, "duplicate trigger: signal already persisted");
                }
            }
            Decision::Rejected { reason, .. } => {
                info!(reason = reason.as_str(), "decision rejected");
            }
        }

        Ok(decision)
    }
}
