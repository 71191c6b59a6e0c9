//! Liquidation conditions and payout split.
//!
//! A position is liquidatable once its margin ratio is at or below the market's
//! threshold. It is then closed in full; whatever collateral survives the loss is
//! split between the liquidator, the fee sink and the pool. The trader gets nothing.

use crate::position::Position;
use crate::types::{mul_div, Amount, Bps, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Share of the remaining collateral paid to the caller.
    pub liquidator_reward_bps: Bps,
    /// Share of the remaining collateral sent to the fee sink.
    pub liquidation_fee_bps: Bps,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            liquidator_reward_bps: Bps::new(500),
            liquidation_fee_bps: Bps::new(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationStatus {
    Safe { margin_ratio_bps: Decimal },
    Liquidatable { margin_ratio_bps: Decimal },
    /// Losses exceed collateral.
    Bankrupt { margin_ratio_bps: Decimal, bad_debt: Amount },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        !matches!(self, LiquidationStatus::Safe { .. })
    }

    pub fn margin_ratio_bps(&self) -> Decimal {
        match self {
            LiquidationStatus::Safe { margin_ratio_bps }
            | LiquidationStatus::Liquidatable { margin_ratio_bps }
            | LiquidationStatus::Bankrupt { margin_ratio_bps, .. } => *margin_ratio_bps,
        }
    }
}

pub fn evaluate_liquidation(position: &Position, price: Price, threshold: Bps) -> LiquidationStatus {
    let margin_ratio_bps = position.margin_ratio_bps(price);
    let equity = position.equity(price);

    if equity.is_negative() {
        return LiquidationStatus::Bankrupt {
            margin_ratio_bps,
            bad_debt: equity.abs(),
        };
    }
    if margin_ratio_bps <= threshold.as_decimal() {
        LiquidationStatus::Liquidatable { margin_ratio_bps }
    } else {
        LiquidationStatus::Safe { margin_ratio_bps }
    }
}

/// Where a liquidated position's collateral goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationPayout {
    /// `clamp(collateral + pnl, 0, collateral)`
    pub remaining: Amount,
    pub reward: Amount,
    pub fee: Amount,
    /// Everything else in the position, losses included.
    pub to_pool: Amount,
    /// Loss beyond the collateral, absorbed by the pool.
    pub bad_debt: Amount,
}

impl LiquidationPayout {
    /// Total leaving the position's collateral.
    pub fn total(&self) -> Amount {
        self.reward.add(self.fee).add(self.to_pool)
    }
}

pub fn calculate_payout(collateral: Amount, pnl: Amount, params: &LiquidationParams) -> LiquidationPayout {
    let after_loss = collateral.add(pnl);
    let remaining = after_loss.floor_zero().min(collateral);
    let reward = remaining.bps_of(params.liquidator_reward_bps);
    let fee = remaining.bps_of(params.liquidation_fee_bps);

    LiquidationPayout {
        remaining,
        reward,
        fee,
        to_pool: collateral.sub(reward).sub(fee),
        bad_debt: if after_loss.is_negative() { after_loss.abs() } else { Amount::zero() },
    }
}

/// Price at which the margin ratio reaches `threshold`. `None` when no positive price does.
pub fn liquidation_price(position: &Position, threshold: Bps) -> Option<Price> {
    let size = position.size.value();
    let collateral = position.collateral.value();
    let entry = position.entry_price.value();
    let t = threshold.as_fraction();
    if size.is_zero() {
        return None;
    }

    let price = match position.side {
        Side::Long => {
            let denominator = size * (Decimal::ONE - t);
            if denominator <= Decimal::ZERO {
                return None;
            }
            mul_div(entry, size - collateral, denominator)
        }
        Side::Short => mul_div(entry, collateral + size, size * (Decimal::ONE + t)),
    };
    Price::new(price)
}
