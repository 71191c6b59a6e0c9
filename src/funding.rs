// 5.0: funding. the heavier side of open interest pays the lighter side through
// a cumulative index per (asset, market). 5.1 has the rate, 5.2 settlement on touch.

use crate::position::{OpenInterest, Position};
use crate::types::{Amount, AssetId, Bps, MarketId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SECONDS_PER_YEAR: i64 = 31_536_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingState {
    pub index: Decimal,
    pub last_update: Timestamp,
}

impl FundingState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            index: Decimal::ZERO,
            last_update: timestamp,
        }
    }
}

// 5.1: (long - short) / (long + short), zero with no open interest
pub fn imbalance(oi: &OpenInterest) -> Decimal {
    let total = oi.total();
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (oi.long.value() - oi.short.value()) / total.value()
}

/// Index increment for `elapsed_secs` at the current imbalance. positive = longs pay.
pub fn funding_increment(oi: &OpenInterest, factor: Bps, elapsed_secs: Decimal) -> Decimal {
    imbalance(oi) * factor.as_fraction() * elapsed_secs / Decimal::from(SECONDS_PER_YEAR)
}

/// Next state for a tracker touched at `now`. pure, the caller commits it.
pub fn advance(state: &FundingState, oi: &OpenInterest, factor: Bps, now: Timestamp) -> FundingState {
    if now <= state.last_update {
        return *state;
    }
    let elapsed = state.last_update.elapsed_secs(&now);
    FundingState {
        index: state.index + funding_increment(oi, factor, elapsed),
        last_update: now,
    }
}

/// Funding owed by a position since its snapshot. positive = the trader pays.
/// rounded up so the trader never underpays by a fraction of a unit.
pub fn funding_owed(position: &Position, index: Decimal) -> Amount {
    let raw = (index - position.funding_snapshot) * position.size.value() * position.side.sign();
    Amount::new(raw.ceil())
}

/// Collateral movement from settling funding on one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FundingCharge {
    /// Signed amount owed, before clamping.
    pub owed: Amount,
    /// Collateral -> pool.
    pub paid: Amount,
    /// Pool -> collateral.
    pub received: Amount,
}

impl FundingCharge {
    /// Part of `owed` the collateral could not cover; the pool absorbs it.
    pub fn shortfall(&self) -> Amount {
        if self.owed.is_positive() {
            self.owed.sub(self.paid)
        } else {
            Amount::zero()
        }
    }
}

// 5.2: settle funding then move the snapshot up to the current index
pub fn settle_funding(position: &Position, index: Decimal, now: Timestamp) -> (Position, FundingCharge) {
    let owed = funding_owed(position, index);
    let (collateral, charge) = if owed.is_positive() {
        let paid = owed.min(position.collateral);
        (
            position.collateral.sub(paid),
            FundingCharge {
                owed,
                paid,
                received: Amount::zero(),
            },
        )
    } else {
        (
            position.collateral.add(owed.abs()),
            FundingCharge {
                owed,
                paid: Amount::zero(),
                received: owed.abs(),
            },
        )
    };

    let settled = Position {
        collateral,
        funding_snapshot: index,
        updated_at: if owed.is_zero() { position.updated_at } else { now },
        ..position.clone()
    };
    (settled, charge)
}

/// Cumulative funding per (asset, market).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingTracker {
    states: HashMap<(AssetId, MarketId), FundingState>,
}

impl FundingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, or a fresh one starting at `now` for a pair never touched.
    pub fn state(&self, asset: &AssetId, market: &MarketId, now: Timestamp) -> FundingState {
        self.states
            .get(&(asset.clone(), market.clone()))
            .copied()
            .unwrap_or_else(|| FundingState::new(now))
    }

    pub fn index(&self, asset: &AssetId, market: &MarketId) -> Decimal {
        self.states
            .get(&(asset.clone(), market.clone()))
            .map(|s| s.index)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn commit(&mut self, asset: &AssetId, market: &MarketId, state: FundingState) {
        self.states.insert((asset.clone(), market.clone()), state);
    }
}
