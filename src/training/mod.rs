//! Offline training tooling.
//!
//! Everything here looks at bars *after* the timestamp it labels, which is
//! exactly what the live and backtest paths must never do. The isolation is
//! structural: nothing under `domain`, `pipeline`, or `adapters` imports
//! this module, so a forward-looking label cannot leak into a decision.

pub mod dataset;
pub mod labeling;
