//! Persistence port for decision artifacts.
//!
//! Every write is idempotent on its uniqueness key, so the at-least-once
//! trigger can replay a bar-close event without duplicating anything.

use crate::domain::error::TrendgateError;
use crate::domain::pattern::PatternCandidate;
use crate::domain::regime::RegimeObservation;
use crate::domain::signal::TradingSignal;

pub trait SignalStore {
    /// Insert a candidate unless one exists for
    /// (symbol, timestamp, pattern_type). Returns whether a row was created.
    fn upsert_candidate(&self, candidate: &PatternCandidate) -> Result<bool, TrendgateError>;

    /// Persist a signal unless one exists for
    /// (symbol, timeframe, timestamp). Returns whether a row was created.
    fn save_signal(&self, signal: &TradingSignal) -> Result<bool, TrendgateError>;

    /// Persist a regime observation unless one exists for
    /// (symbol, timeframe, as_of).
    fn save_regime(&self, observation: &RegimeObservation) -> Result<(), TrendgateError>;
}
