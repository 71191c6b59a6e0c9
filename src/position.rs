// 4.0: open position tracking. size is notional in the collateral asset, so
// pnl = size * (price - entry) / entry, signed by side.
// 4.1 has open/increase/decrease at the bottom, 4.5 the ledger + open interest.

use crate::types::{mul_div, AccountId, Amount, AssetId, Bps, MarketId, Price, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One aggregate position per (owner, asset, market).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: AccountId,
    pub asset: AssetId,
    pub market: MarketId,
}

impl PositionKey {
    pub fn new(owner: AccountId, asset: AssetId, market: MarketId) -> Self {
        Self { owner, asset, market }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: PositionKey,
    pub side: Side,
    pub size: Amount,
    pub entry_price: Price,
    pub collateral: Amount,
    /// Funding index at the last touch.
    pub funding_snapshot: Decimal,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn open(
        key: PositionKey,
        side: Side,
        size: Amount,
        price: Price,
        margin: Amount,
        funding_index: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            key,
            side,
            size,
            entry_price: price,
            collateral: margin,
            funding_snapshot: funding_index,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    // 4.1: paper gains/losses based on current price
    pub fn unrealized_pnl(&self, price: Price) -> Amount {
        calculate_pnl(self.side, self.size, self.entry_price, price)
    }

    /// Size repriced at `price`.
    pub fn marked_notional(&self, price: Price) -> Decimal {
        mul_div(self.size.value(), price.value(), self.entry_price.value())
    }

    // 4.2: collateral + pnl. this vs the threshold decides liquidation
    pub fn equity(&self, price: Price) -> Amount {
        self.collateral.add(self.unrealized_pnl(price))
    }

    pub fn margin_ratio_bps(&self, price: Price) -> Decimal {
        margin_ratio_bps(self.equity(price), self.marked_notional(price))
    }

    pub fn is_liquidatable(&self, price: Price, threshold: Bps) -> bool {
        self.margin_ratio_bps(price) <= threshold.as_decimal()
    }

    pub fn leverage(&self) -> Option<Decimal> {
        (!self.collateral.is_zero()).then(|| self.size.value() / self.collateral.value())
    }
}

// 4.3: the pnl formula. floored so the trader is never paid a fraction of a unit too much
pub fn calculate_pnl(side: Side, size: Amount, entry: Price, price: Price) -> Amount {
    let raw = mul_div(size.value(), price.value() - entry.value(), entry.value());
    Amount::new((raw * side.sign()).floor())
}

/// `equity * 10000 / notional`. an empty notional reports the max ratio.
pub fn margin_ratio_bps(equity: Amount, marked_notional: Decimal) -> Decimal {
    if marked_notional <= Decimal::ZERO {
        return Decimal::MAX;
    }
    mul_div(equity.value(), Bps::DIVIDER_DECIMAL, marked_notional)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("fill of {size} against an open size of {open} would flip the position")]
    FlipRejected { size: Amount, open: Amount },

    #[error("remaining position would sit at {ratio_bps} bps, threshold {threshold}")]
    UndercollateralizedDecrease { ratio_bps: Decimal, threshold: Bps },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillKind {
    Opened,
    Increased,
    Decreased,
    Closed,
}

/// Outcome of applying one fill.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub kind: FillKind,
    /// New state, `None` once closed.
    pub position: Option<Position>,
    pub realized_pnl: Amount,
    /// Collateral leaving the position on a decrease.
    pub released_collateral: Amount,
    /// Paid back to the trader: released + pnl + order margin, never negative.
    pub payout: Amount,
    /// Pool side of the trade. positive = pool pays the trader, negative = pool absorbs.
    pub pool_delta: Amount,
}

// 4.4: adds to an existing position. entry becomes the size-weighted average,
// written as entry + (price - entry) * size / new_size so it never squares a magnitude
pub fn increase_position(position: &Position, size: Amount, price: Price, margin: Amount, timestamp: Timestamp) -> Position {
    let new_size = position.size.add(size);
    let entry = position.entry_price.value();
    let shift = mul_div(price.value() - entry, size.value(), new_size.value());
    let entry = Price::new(entry + shift).unwrap_or(position.entry_price);

    Position {
        size: new_size,
        entry_price: entry,
        collateral: position.collateral.add(margin),
        updated_at: timestamp,
        ..position.clone()
    }
}

/// Opposite-side fill of at most the open size. the remainder, if any, must stay
/// above `liq_threshold`.
pub fn decrease_position(
    position: &Position,
    size: Amount,
    price: Price,
    order_margin: Amount,
    liq_threshold: Bps,
    timestamp: Timestamp,
) -> Result<PositionUpdate, PositionError> {
    if size > position.size {
        return Err(PositionError::FlipRejected {
            size,
            open: position.size,
        });
    }

    let full_close = size == position.size;
    let realized = calculate_pnl(position.side, size, position.entry_price, price);
    let released = if full_close {
        position.collateral
    } else {
        Amount::new(mul_div(position.collateral.value(), size.value(), position.size.value()).floor())
    };

    let remaining = if full_close {
        None
    } else {
        let rest = Position {
            size: position.size.sub(size),
            collateral: position.collateral.sub(released),
            updated_at: timestamp,
            ..position.clone()
        };
        let ratio = rest.margin_ratio_bps(price);
        if ratio <= liq_threshold.as_decimal() {
            return Err(PositionError::UndercollateralizedDecrease {
                ratio_bps: ratio,
                threshold: liq_threshold,
            });
        }
        Some(rest)
    };

    // losses are capped by what is actually in custody for this fill
    let available = released.add(order_margin);
    let pool_delta = if realized.is_negative() {
        realized.abs().min(available).negate()
    } else {
        realized
    };
    let payout = available.add(realized).floor_zero();

    Ok(PositionUpdate {
        kind: if full_close { FillKind::Closed } else { FillKind::Decreased },
        position: remaining,
        realized_pnl: realized,
        released_collateral: released,
        payout,
        pool_delta,
    })
}

/// Plans a fill at `price` against whatever is open under `key`.
#[allow(clippy::too_many_arguments)]
pub fn apply_fill(
    existing: Option<&Position>,
    key: PositionKey,
    side: Side,
    size: Amount,
    price: Price,
    margin: Amount,
    funding_index: Decimal,
    liq_threshold: Bps,
    timestamp: Timestamp,
) -> Result<PositionUpdate, PositionError> {
    match existing {
        None => Ok(PositionUpdate {
            kind: FillKind::Opened,
            position: Some(Position::open(key, side, size, price, margin, funding_index, timestamp)),
            realized_pnl: Amount::zero(),
            released_collateral: Amount::zero(),
            payout: Amount::zero(),
            pool_delta: Amount::zero(),
        }),
        Some(position) if position.side == side => Ok(PositionUpdate {
            kind: FillKind::Increased,
            position: Some(increase_position(position, size, price, margin, timestamp)),
            realized_pnl: Amount::zero(),
            released_collateral: Amount::zero(),
            payout: Amount::zero(),
            pool_delta: Amount::zero(),
        }),
        Some(position) => decrease_position(position, size, price, margin, liq_threshold, timestamp),
    }
}

/// Long and short notional for one (asset, market).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInterest {
    pub long: Amount,
    pub short: Amount,
}

impl OpenInterest {
    pub fn total(&self) -> Amount {
        self.long.add(self.short)
    }

    pub fn side(&self, side: Side) -> Amount {
        match side {
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    pub fn increase(&mut self, side: Side, size: Amount) {
        match side {
            Side::Long => self.long = self.long.add(size),
            Side::Short => self.short = self.short.add(size),
        }
    }

    pub fn decrease(&mut self, side: Side, size: Amount) {
        match side {
            Side::Long => self.long = self.long.sub(size).floor_zero(),
            Side::Short => self.short = self.short.sub(size).floor_zero(),
        }
    }
}

// 4.5: all open positions plus open interest. mutated only through commit paths in the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionLedger {
    positions: HashMap<PositionKey, Position>,
    open_interest: HashMap<(AssetId, MarketId), OpenInterest>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    /// Stores the new state, dropping the record when `position` is `None`.
    pub fn store(&mut self, key: &PositionKey, position: Option<Position>) {
        match position {
            Some(position) => {
                self.positions.insert(key.clone(), position);
            }
            None => {
                self.positions.remove(key);
            }
        }
    }

    pub fn positions_of(&self, owner: &AccountId) -> impl Iterator<Item = &Position> + '_ {
        let owner = owner.clone();
        self.positions.values().filter(move |p| p.key.owner == owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn open_interest_of(&self, asset: &AssetId, market: &MarketId) -> OpenInterest {
        self.open_interest
            .get(&(asset.clone(), market.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Long + short across every market settled in `asset`.
    pub fn open_interest(&self, asset: &AssetId) -> Amount {
        self.open_interest
            .iter()
            .filter(|((a, _), _)| a == asset)
            .map(|(_, oi)| oi.total())
            .sum()
    }

    pub fn increase_oi(&mut self, asset: &AssetId, market: &MarketId, side: Side, size: Amount) {
        self.open_interest
            .entry((asset.clone(), market.clone()))
            .or_default()
            .increase(side, size);
    }

    pub fn decrease_oi(&mut self, asset: &AssetId, market: &MarketId, side: Side, size: Amount) {
        self.open_interest
            .entry((asset.clone(), market.clone()))
            .or_default()
            .decrease(side, size);
    }

    /// Sum of collateral in open positions on `asset`.
    pub fn collateral(&self, asset: &AssetId) -> Amount {
        self.positions
            .values()
            .filter(|p| &p.key.asset == asset)
            .map(|p| p.collateral)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key() -> PositionKey {
        PositionKey::new(AccountId::new("alice"), AssetId::new("ETH"), MarketId::new("ETH-USD"))
    }

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    // 1000 notional long at 1500 on 100 collateral (10x)
    fn long_position() -> Position {
        Position::open(
            key(),
            Side::Long,
            Amount::new(dec!(1000)),
            price(dec!(1500)),
            Amount::new(dec!(100)),
            Decimal::ZERO,
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn pnl_is_return_on_notional() {
        let pos = long_position();
        // +10% on 1000 notional
        assert_eq!(pos.unrealized_pnl(price(dec!(1650))).value(), dec!(100));
        assert_eq!(pos.unrealized_pnl(price(dec!(1350))).value(), dec!(-100));

        let short = Position { side: Side::Short, ..long_position() };
        assert_eq!(short.unrealized_pnl(price(dec!(1350))).value(), dec!(100));
    }

    #[test]
    fn pnl_floors() {
        // 1000 * 1/1500 = 0.666..
        let pnl = calculate_pnl(Side::Long, Amount::new(dec!(1000)), price(dec!(1500)), price(dec!(1501)));
        assert_eq!(pnl.value(), dec!(0));
        let pnl = calculate_pnl(Side::Short, Amount::new(dec!(1000)), price(dec!(1500)), price(dec!(1501)));
        assert_eq!(pnl.value(), dec!(-1));
    }

    #[test]
    fn margin_ratio_at_entry_is_inverse_leverage() {
        let pos = long_position();
        assert_eq!(pos.margin_ratio_bps(price(dec!(1500))), dec!(1000));
        assert_eq!(pos.leverage(), Some(dec!(10)));
        // -9% -> equity 10 on marked notional 910
        assert!(pos.is_liquidatable(price(dec!(1365)), Bps::new(110)));
        assert!(!pos.is_liquidatable(price(dec!(1500)), Bps::new(110)));
    }

    #[test]
    fn increase_averages_entry() {
        let pos = long_position();
        let bigger = increase_position(&pos, Amount::new(dec!(1000)), price(dec!(1700)), Amount::new(dec!(50)), Timestamp::from_millis(5));
        assert_eq!(bigger.size.value(), dec!(2000));
        assert_eq!(bigger.entry_price.value(), dec!(1600));
        assert_eq!(bigger.collateral.value(), dec!(150));
        assert_eq!(bigger.opened_at, Timestamp::from_millis(0));
        assert_eq!(bigger.updated_at, Timestamp::from_millis(5));
    }

    #[test]
    fn partial_decrease_releases_pro_rata() {
        let pos = long_position();
        let update = decrease_position(
            &pos,
            Amount::new(dec!(400)),
            price(dec!(1650)),
            Amount::zero(),
            Bps::new(100),
            Timestamp::from_millis(1),
        )
        .unwrap();

        assert_eq!(update.kind, FillKind::Decreased);
        assert_eq!(update.realized_pnl.value(), dec!(40));
        assert_eq!(update.released_collateral.value(), dec!(40));
        assert_eq!(update.payout.value(), dec!(80));
        assert_eq!(update.pool_delta.value(), dec!(40));
        let rest = update.position.unwrap();
        assert_eq!(rest.size.value(), dec!(600));
        assert_eq!(rest.collateral.value(), dec!(60));
        assert_eq!(rest.entry_price, pos.entry_price);
    }

    #[test]
    fn base_unit_sizes_and_prices_do_not_overflow() {
        let one = dec!(1_000_000_000_000_000_000);
        let entry = price(dec!(1500) * one);
        let pos = Position::open(key(), Side::Long, Amount::new(dec!(5) * one), entry, Amount::new(one), Decimal::ZERO, Timestamp::from_millis(0));

        let bigger = increase_position(&pos, Amount::new(dec!(5) * one), price(dec!(1600) * one), Amount::new(one), Timestamp::from_millis(1));
        assert_eq!(bigger.entry_price.value(), dec!(1550) * one);

        let update = decrease_position(&pos, Amount::new(dec!(2) * one), price(dec!(1600) * one), Amount::zero(), Bps::new(100), Timestamp::from_millis(1)).unwrap();
        assert_eq!(update.released_collateral.value(), dec!(0.4) * one);
        // floor(2e18 / 15)
        assert_eq!(update.realized_pnl.value(), dec!(133_333_333_333_333_333));
        assert!(update.position.unwrap().margin_ratio_bps(price(dec!(1600) * one)) > dec!(100));
    }

    #[test]
    fn full_close_loss_capped_by_collateral() {
        let pos = long_position();
        // -20% on 1000 = -200, only 100 collateral
        let update = decrease_position(&pos, pos.size, price(dec!(1200)), Amount::zero(), Bps::new(100), Timestamp::from_millis(1)).unwrap();
        assert_eq!(update.kind, FillKind::Closed);
        assert!(update.position.is_none());
        assert_eq!(update.payout, Amount::zero());
        assert_eq!(update.pool_delta.value(), dec!(-100));
    }

    #[test]
    fn flip_is_rejected() {
        let pos = long_position();
        let err = decrease_position(&pos, Amount::new(dec!(1001)), price(dec!(1500)), Amount::zero(), Bps::new(100), Timestamp::from_millis(1)).unwrap_err();
        assert!(matches!(err, PositionError::FlipRejected { .. }));
    }

    #[test]
    fn undercollateralized_remainder_rejected() {
        let pos = long_position();
        // -9.5%: remainder equity goes below 1%
        let err = decrease_position(&pos, Amount::new(dec!(500)), price(dec!(1357.5)), Amount::zero(), Bps::new(100), Timestamp::from_millis(1)).unwrap_err();
        assert!(matches!(err, PositionError::UndercollateralizedDecrease { .. }));
    }

    #[test]
    fn apply_fill_routes_by_side() {
        let open = apply_fill(None, key(), Side::Long, Amount::new(dec!(1000)), price(dec!(1500)), Amount::new(dec!(100)), dec!(0.5), Bps::new(100), Timestamp::from_millis(0)).unwrap();
        assert_eq!(open.kind, FillKind::Opened);
        let pos = open.position.unwrap();
        assert_eq!(pos.funding_snapshot, dec!(0.5));

        let inc = apply_fill(Some(&pos), key(), Side::Long, Amount::new(dec!(10)), price(dec!(1500)), Amount::new(dec!(1)), dec!(0.5), Bps::new(100), Timestamp::from_millis(0)).unwrap();
        assert_eq!(inc.kind, FillKind::Increased);

        let close = apply_fill(Some(&pos), key(), Side::Short, Amount::new(dec!(1000)), price(dec!(1500)), Amount::zero(), dec!(0.5), Bps::new(100), Timestamp::from_millis(0)).unwrap();
        assert_eq!(close.kind, FillKind::Closed);
        assert_eq!(close.payout.value(), dec!(100));
    }

    #[test]
    fn ledger_tracks_open_interest() {
        let mut ledger = PositionLedger::new();
        let eth = AssetId::new("ETH");
        ledger.increase_oi(&eth, &MarketId::new("ETH-USD"), Side::Long, Amount::new(dec!(10)));
        ledger.increase_oi(&eth, &MarketId::new("BTC-USD"), Side::Short, Amount::new(dec!(5)));
        assert_eq!(ledger.open_interest(&eth).value(), dec!(15));

        ledger.decrease_oi(&eth, &MarketId::new("ETH-USD"), Side::Long, Amount::new(dec!(10)));
        assert_eq!(ledger.open_interest(&eth).value(), dec!(5));
        assert_eq!(ledger.open_interest_of(&eth, &MarketId::new("BTC-USD")).short.value(), dec!(5));

        ledger.store(&key(), Some(long_position()));
        assert_eq!(ledger.positions_of(&AccountId::new("alice")).count(), 1);
        assert_eq!(ledger.collateral(&eth).value(), dec!(100));
        ledger.store(&key(), None);
        assert!(ledger.is_empty());
    }
}
