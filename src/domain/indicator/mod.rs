//! Technical indicator implementations.
//!
//! Every indicator returns an [`IndicatorSeries`] aligned 1:1 with its input
//! bars. Warm-up positions carry `valid: false` so callers can distinguish
//! "no value yet" from a computed zero.

pub mod adx;
pub mod atr;
pub mod chop;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod volatility;

use chrono::{DateTime, Utc};

/// A single point in an indicator time series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: f64,
}

/// A time series of indicator values, aligned with the source bars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorSeries {
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, timestamp: DateTime<Utc>, valid: bool, value: f64) {
        self.values.push(IndicatorPoint {
            timestamp,
            valid,
            value,
        });
    }

    pub fn push_invalid(&mut self, timestamp: DateTime<Utc>) {
        self.push(timestamp, false, 0.0);
    }

    /// Value at index `i`, if valid.
    pub fn value_at(&self, i: usize) -> Option<f64> {
        self.values
            .get(i)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    /// Most recent valid value.
    pub fn last_valid(&self) -> Option<f64> {
        self.values.iter().rev().find(|p| p.valid).map(|p| p.value)
    }

    /// All valid values, in series order.
    pub fn valid_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .filter(|p| p.valid)
            .map(|p| p.value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
