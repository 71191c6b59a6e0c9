//! Trigger rules for limit and stop orders.
//!
//! A limit buy waits for the price to fall to its limit, a stop buy waits for it
//! to rise to its stop; sells mirror that. At submission the trigger must sit on
//! the waiting side of the oracle price by at least the market's minimum
//! distance. Both checks are inclusive.

use crate::order::OrderKind;
use crate::types::{mul_div, Bps, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the trigger price should be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCondition {
    /// Fires once the price is at or above the trigger.
    Above,
    /// Fires once the price is at or below the trigger.
    Below,
}

impl TriggerCondition {
    /// `None` for market orders, which have no trigger.
    pub fn for_order(kind: OrderKind, side: Side) -> Option<Self> {
        match (kind, side) {
            (OrderKind::Market, _) => None,
            (OrderKind::Limit, Side::Long) | (OrderKind::Stop, Side::Short) => Some(TriggerCondition::Below),
            (OrderKind::Limit, Side::Short) | (OrderKind::Stop, Side::Long) => Some(TriggerCondition::Above),
        }
    }

    pub fn is_met(&self, trigger: Price, price: Price) -> bool {
        match self {
            TriggerCondition::Above => price >= trigger,
            TriggerCondition::Below => price <= trigger,
        }
    }

    /// The trigger has to wait on its own side of `oracle`, at least `min_distance` away.
    pub fn is_valid_placement(&self, trigger: Price, oracle: Price, min_distance: Bps) -> bool {
        let offset = oracle.value() * min_distance.as_fraction();
        match self {
            TriggerCondition::Above => trigger.value() >= oracle.value() + offset,
            TriggerCondition::Below => trigger.value() <= oracle.value() - offset,
        }
    }
}

/// Whether an order with this trigger may fill at `price`. market orders always can.
pub fn can_execute(kind: OrderKind, side: Side, trigger: Option<Price>, price: Price) -> bool {
    match (TriggerCondition::for_order(kind, side), trigger) {
        (None, _) => true,
        (Some(condition), Some(trigger)) => condition.is_met(trigger, price),
        (Some(_), None) => false,
    }
}

/// Distance of `trigger` from `oracle` in bps, signed positive above.
pub fn trigger_distance_bps(trigger: Price, oracle: Price) -> Decimal {
    mul_div(trigger.value() - oracle.value(), Bps::DIVIDER_DECIMAL, oracle.value())
}
