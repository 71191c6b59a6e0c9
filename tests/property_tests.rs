//! Property-based tests for the pure trading math.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use synth_perps::*;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $1 to $100,000
}

fn amount_strategy() -> impl Strategy<Value = Amount> {
    (1u64..1_000_000_000_000_000_000u64).prop_map(|x| Amount::new(Decimal::from(x)))
}

fn bps_strategy() -> impl Strategy<Value = Bps> {
    (0i32..=1_000i32).prop_map(Bps::new)
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn position(side: Side, size: Amount, entry: Decimal, collateral: Amount) -> Position {
    Position::open(
        PositionKey::new(AccountId::new("alice"), AssetId::new("ETH"), MarketId::new("ETH-USD")),
        side,
        size,
        Price::new_unchecked(entry),
        collateral,
        Decimal::ZERO,
        Timestamp::from_millis(0),
    )
}

proptest! {
    /// Fee is floor(size * bps / 10000), never more than the size.
    #[test]
    fn fee_is_floored_bps_of_size(size in amount_strategy(), bps in bps_strategy()) {
        let fee = compute_fee(size, bps);
        let exact = size.value() * Decimal::from(bps.value()) / dec!(10000);

        prop_assert!(fee.value() <= exact);
        prop_assert!(exact - fee.value() < Decimal::ONE);
        prop_assert_eq!(fee.value().fract(), Decimal::ZERO);
        prop_assert!(fee <= size);
    }

    /// Reduce-only orders escrow the fee only, everything else margin + fee.
    #[test]
    fn escrow_matches_order_kind(margin in amount_strategy(), fee in amount_strategy()) {
        prop_assert_eq!(required_escrow(margin, fee, false), margin.add(fee));
        prop_assert_eq!(required_escrow(margin, fee, true), fee);
    }

    /// `mul_div` agrees with exact integer math to within one base unit, even when
    /// the product is far beyond what a `Decimal` can hold.
    #[test]
    fn mul_div_tracks_exact_quotient(
        a in 1u64..10_000_000_000_000_000_000u64,
        b in 1u64..10_000_000_000_000_000_000u64,
        c in 100_000_000_000_000u64..10_000_000_000_000_000_000u64,
    ) {
        // quotient stays below 1e24
        let exact = u128::from(a) * u128::from(b) / u128::from(c);
        let exact = Decimal::from_i128_with_scale(exact as i128, 0);
        let got = mul_div(Decimal::from(a), Decimal::from(b), Decimal::from(c)).floor();
        let diff = (got - exact).abs();
        prop_assert!(diff <= Decimal::ONE, "{} * {} / {} = {}, got {}", a, b, c, exact, got);
    }

    /// No pnl at the entry price.
    #[test]
    fn pnl_zero_at_entry(side in side_strategy(), size in amount_strategy(), entry in price_strategy()) {
        let entry = Price::new_unchecked(entry);
        prop_assert_eq!(calculate_pnl(side, size, entry, entry), Amount::zero());
    }

    /// Longs win when the price rises, shorts when it falls. the floor never
    /// hands out more than the exact figure.
    #[test]
    fn pnl_sign_follows_side(
        side in side_strategy(),
        size in amount_strategy(),
        entry in price_strategy(),
        mark in price_strategy(),
    ) {
        let pnl = calculate_pnl(side, size, Price::new_unchecked(entry), Price::new_unchecked(mark));
        let exact = size.value() * (mark - entry) / entry * side.sign();

        prop_assert!(pnl.value() <= exact);
        prop_assert!(exact - pnl.value() < Decimal::ONE);
        if exact >= Decimal::ONE {
            prop_assert!(pnl.is_positive());
        }
        if exact < Decimal::ZERO {
            prop_assert!(pnl.is_negative());
        }
    }

    /// Long margin ratio rises with the price, short ratio falls.
    #[test]
    fn margin_ratio_moves_with_price(
        side in side_strategy(),
        size in (1_000_000u64..1_000_000_000_000_000_000u64).prop_map(|x| Amount::new(Decimal::from(x))),
        entry in price_strategy(),
        bump in 1i64..500i64,
    ) {
        let collateral = Amount::new((size.value() / dec!(10)).floor());
        let pos = position(side, size, entry, collateral);
        let low = Price::new_unchecked(entry);
        let high = Price::new_unchecked(entry * (Decimal::ONE + Decimal::new(bump, 4)));

        match side {
            Side::Long => prop_assert!(pos.margin_ratio_bps(high) >= pos.margin_ratio_bps(low)),
            Side::Short => prop_assert!(pos.margin_ratio_bps(high) <= pos.margin_ratio_bps(low)),
        }
    }

    /// Liquidation split: reward and fee come out of what is left, the rest goes
    /// to the pool, and nothing beyond the collateral is ever paid out.
    #[test]
    fn liquidation_payout_is_bounded(
        collateral in amount_strategy(),
        pnl_raw in -2_000_000_000_000_000_000i64..2_000_000_000_000_000_000i64,
        reward_bps in 0i32..=2_500i32,
        fee_bps in 0i32..=2_500i32,
    ) {
        let params = LiquidationParams {
            liquidator_reward_bps: Bps::new(reward_bps),
            liquidation_fee_bps: Bps::new(fee_bps),
        };
        let pnl = Amount::new(Decimal::from(pnl_raw));
        let payout = calculate_payout(collateral, pnl, &params);

        prop_assert!(!payout.remaining.is_negative());
        prop_assert!(payout.remaining <= collateral);
        prop_assert!(payout.reward.add(payout.fee) <= payout.remaining);
        prop_assert!(!payout.to_pool.is_negative());
        prop_assert_eq!(payout.total(), collateral);
        prop_assert!(!payout.bad_debt.is_negative());
        if collateral.add(pnl).is_negative() {
            prop_assert_eq!(payout.remaining, Amount::zero());
            prop_assert_eq!(payout.bad_debt, collateral.add(pnl).abs());
        }
    }

    /// A partial decrease either leaves a remainder above the threshold or is refused.
    #[test]
    fn partial_decrease_keeps_remainder_healthy(
        side in side_strategy(),
        size_units in 10i64..1_000i64,
        leverage in 1i64..=50i64,
        fraction in 1i64..100i64,
        move_bps in -300i64..300i64,
    ) {
        let one = dec!(1_000_000_000_000_000);
        let size = Amount::new(Decimal::from(size_units) * one);
        let collateral = Amount::new((size.value() / Decimal::from(leverage)).floor());
        let pos = position(side, size, dec!(1500), collateral);
        let close = Amount::new((size.value() * Decimal::new(fraction, 2)).floor());
        let price = Price::new_unchecked(dec!(1500) * (Decimal::ONE + Decimal::new(move_bps, 4)));
        let threshold = Bps::new(100);

        match decrease_position(&pos, close, price, Amount::zero(), threshold, Timestamp::from_millis(1)) {
            Ok(update) => {
                let rest = update.position.expect("partial decrease keeps a position");
                prop_assert!(rest.margin_ratio_bps(price) > threshold.as_decimal());
                prop_assert_eq!(rest.collateral.add(update.released_collateral), collateral);
                prop_assert!(!update.payout.is_negative());
                prop_assert_eq!(update.kind, FillKind::Decreased);
            }
            Err(err) => {
                let is_undercollateralized = matches!(err, PositionError::UndercollateralizedDecrease { .. });
                prop_assert!(is_undercollateralized);
            }
        }
    }

    /// Decreasing by more than the open size never succeeds.
    #[test]
    fn oversize_decrease_is_a_flip(
        side in side_strategy(),
        size in amount_strategy(),
        extra in 1u64..1_000_000u64,
    ) {
        let pos = position(side, size, dec!(1500), size);
        let fill = size.add(Amount::new(Decimal::from(extra)));
        let result = decrease_position(&pos, fill, Price::new_unchecked(dec!(1500)), Amount::zero(), Bps::new(100), Timestamp::from_millis(1));
        prop_assert_eq!(result, Err(PositionError::FlipRejected { size: fill, open: size }));
    }

    /// Funding is rounded against the trader.
    #[test]
    fn funding_owed_rounds_up(
        side in side_strategy(),
        size in amount_strategy(),
        index_raw in -1_000_000i64..1_000_000i64,
    ) {
        let pos = position(side, size, dec!(1500), size);
        let index = Decimal::new(index_raw, 9);
        let owed = funding_owed(&pos, index);
        let exact = index * size.value() * side.sign();

        prop_assert!(owed.value() >= exact);
        prop_assert!(owed.value() - exact < Decimal::ONE);
    }

    /// Settling funding never takes more collateral than the position holds.
    #[test]
    fn funding_settlement_never_overdraws(
        side in side_strategy(),
        size in amount_strategy(),
        collateral in amount_strategy(),
        index_raw in -1_000_000i64..1_000_000i64,
    ) {
        let pos = position(side, size, dec!(1500), collateral);
        let index = Decimal::new(index_raw, 6);
        let (settled, charge) = settle_funding(&pos, index, Timestamp::from_millis(5));

        prop_assert!(!settled.collateral.is_negative());
        prop_assert!(charge.paid <= collateral);
        prop_assert_eq!(settled.funding_snapshot, index);
        prop_assert_eq!(settled.collateral, collateral.sub(charge.paid).add(charge.received));
    }

    /// The index only moves forward in time, and in the direction of the imbalance.
    #[test]
    fn funding_index_follows_imbalance(
        long in 0u64..1_000_000u64,
        short in 0u64..1_000_000u64,
        elapsed_secs in 0i64..1_000_000i64,
        factor in 0i32..=20_000i32,
    ) {
        let oi = OpenInterest {
            long: Amount::new(Decimal::from(long)),
            short: Amount::new(Decimal::from(short)),
        };
        let state = FundingState::new(Timestamp::from_secs(1_000));
        let next = advance(&state, &oi, Bps::new(factor), Timestamp::from_secs(1_000 + elapsed_secs));

        prop_assert!(imbalance(&oi).abs() <= Decimal::ONE);
        if long > short && elapsed_secs > 0 && factor > 0 {
            prop_assert!(next.index > Decimal::ZERO);
        }
        if long < short && elapsed_secs > 0 && factor > 0 {
            prop_assert!(next.index < Decimal::ZERO);
        }
        if long == short || elapsed_secs == 0 {
            prop_assert_eq!(next.index, Decimal::ZERO);
        }

        let rewound = advance(&next, &oi, Bps::new(factor), Timestamp::from_secs(500));
        prop_assert_eq!(rewound, next);
    }

    /// Trigger rules: a valid placement is never immediately executable at the oracle.
    #[test]
    fn valid_placement_is_not_already_triggered(
        is_long in any::<bool>(),
        is_stop in any::<bool>(),
        oracle in price_strategy(),
        offset_bps in -2_000i64..2_000i64,
    ) {
        let side = Side::from_is_long(is_long);
        let kind = if is_stop { OrderKind::Stop } else { OrderKind::Limit };
        let oracle = Price::new_unchecked(oracle);
        let trigger = Price::new_unchecked(oracle.value() * (Decimal::ONE + Decimal::new(offset_bps, 4)));
        let condition = TriggerCondition::for_order(kind, side).expect("limit and stop have a trigger");

        if condition.is_valid_placement(trigger, oracle, Bps::new(10)) {
            prop_assert!(!can_execute(kind, side, Some(trigger), oracle));
            prop_assert!(trigger_distance_bps(trigger, oracle).abs() >= dec!(10));
        }
        prop_assert!(can_execute(kind, side, Some(trigger), trigger));
    }
}
