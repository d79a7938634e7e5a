//! trendgate: regime-gated trading signal pipeline with a
//! causality-preserving backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`]. The live trigger
//! entry point lives in [`pipeline`]; forward-looking training tooling is
//! quarantined in [`training`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod pipeline;
pub mod ports;
pub mod training;
