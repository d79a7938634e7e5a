//! Volatility-adjusted risk sizing.
//!
//! Stop distance is a fixed multiple of ATR; the target mirrors it scaled
//! by the reward ratio; position size risks a fixed fraction of the account
//! per trade. A non-positive stop distance is a hard `DegenerateStop` so a
//! zero-ATR bar can never produce an infinite or negative size.

use crate::domain::error::TrendgateError;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub risk_fraction: f64,
    pub reward_ratio: f64,
    pub atr_multiple: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            risk_fraction: 0.01,
            reward_ratio: 1.5,
            atr_multiple: 2.0,
        }
    }
}

/// Stop, target, and size for one prospective trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
}

/// Size a trade from an ATR volatility estimate.
pub fn size(
    direction: Direction,
    entry_price: f64,
    atr: f64,
    account_balance: f64,
    params: &RiskParams,
) -> Result<TradePlan, TrendgateError> {
    plan(direction, entry_price, params.atr_multiple * atr, account_balance, params)
}

/// Size a trade from an explicit stop distance.
pub fn plan(
    direction: Direction,
    entry_price: f64,
    stop_distance: f64,
    account_balance: f64,
    params: &RiskParams,
) -> Result<TradePlan, TrendgateError> {
    if stop_distance <= 0.0 || !stop_distance.is_finite() {
        let atr = if params.atr_multiple > 0.0 {
            stop_distance / params.atr_multiple
        } else {
            stop_distance
        };
        return Err(TrendgateError::DegenerateStop { atr });
    }

    let sign = direction.sign();
    let stop_loss = entry_price - sign * stop_distance;
    let take_profit = entry_price + sign * params.reward_ratio * stop_distance;
    let position_size = (account_balance * params.risk_fraction) / stop_distance;

    Ok(TradePlan {
        stop_loss,
        take_profit,
        position_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn long_levels() {
        let plan = size(Direction::Long, 100.0, 1.0, 10_000.0, &RiskParams::default()).unwrap();
        assert_relative_eq!(plan.stop_loss, 98.0);
        assert_relative_eq!(plan.take_profit, 103.0);
        // 10_000 * 0.01 / 2.0
        assert_relative_eq!(plan.position_size, 50.0);
    }

    #[test]
    fn short_levels_mirror() {
        let plan = size(Direction::Short, 100.0, 1.0, 10_000.0, &RiskParams::default()).unwrap();
        assert_relative_eq!(plan.stop_loss, 102.0);
        assert_relative_eq!(plan.take_profit, 97.0);
        assert_relative_eq!(plan.position_size, 50.0);
    }

    #[test]
    fn zero_atr_is_degenerate() {
        let err = size(Direction::Long, 100.0, 0.0, 10_000.0, &RiskParams::default()).unwrap_err();
        assert!(matches!(err, TrendgateError::DegenerateStop { .. }));
    }

    #[test]
    fn negative_atr_is_degenerate() {
        let err =
            size(Direction::Long, 100.0, -1.5, 10_000.0, &RiskParams::default()).unwrap_err();
        assert!(matches!(err, TrendgateError::DegenerateStop { .. }));
    }

    #[test]
    fn loss_at_stop_equals_risk_budget() {
        let balance = 25_000.0;
        let params = RiskParams::default();
        let plan = size(Direction::Long, 1950.0, 3.2, balance, &params).unwrap();
        let loss = (1950.0 - plan.stop_loss) * plan.position_size;
        assert_relative_eq!(loss, balance * params.risk_fraction, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn size_positive_and_monotone_in_stop_distance(
            atr_a in 0.01f64..50.0,
            atr_b in 0.01f64..50.0,
            entry in 1.0f64..10_000.0,
            balance in 100.0f64..1_000_000.0,
        ) {
            let params = RiskParams::default();
            let a = size(Direction::Long, entry, atr_a, balance, &params).unwrap();
            let b = size(Direction::Long, entry, atr_b, balance, &params).unwrap();
            prop_assert!(a.position_size > 0.0);
            prop_assert!(b.position_size > 0.0);
            if atr_a < atr_b {
                prop_assert!(a.position_size >= b.position_size);
            }
        }

        #[test]
        fn stop_is_always_on_the_loss_side(
            atr in 0.01f64..50.0,
            entry in 1.0f64..10_000.0,
        ) {
            let params = RiskParams::default();
            let long = size(Direction::Long, entry, atr, 10_000.0, &params).unwrap();
            prop_assert!(long.stop_loss < entry);
            prop_assert!(long.take_profit > entry);
            let short = size(Direction::Short, entry, atr, 10_000.0, &params).unwrap();
            prop_assert!(short.stop_loss > entry);
            prop_assert!(short.take_profit < entry);
        }
    }
}
