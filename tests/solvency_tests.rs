//! Solvency invariant tests.
//!
//! These tests verify the accounting invariants that must hold for the pool
//! and custody to stay whole under any sequence of trades.

mod common;

use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use synth_perps::*;

#[derive(Debug, Clone)]
enum Step {
    Open { trader: usize, is_long: bool, margin: u32, leverage: u32 },
    Close { trader: usize, percent: u32 },
    Move { bps: i32 },
    Wait { hours: u32 },
    Liquidate { trader: usize },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..TRADERS.len(), any::<bool>(), 1u32..5, 1u32..50)
            .prop_map(|(trader, is_long, margin, leverage)| Step::Open { trader, is_long, margin, leverage }),
        (0..TRADERS.len(), 1u32..=100).prop_map(|(trader, percent)| Step::Close { trader, percent }),
        (-400i32..400).prop_map(|bps| Step::Move { bps }),
        (1u32..72).prop_map(|hours| Step::Wait { hours }),
        (0..TRADERS.len()).prop_map(|trader| Step::Liquidate { trader }),
    ]
}

// outcomes are ignored: refused steps are part of the sequence
fn run(p: &mut TestProcessor, step: &Step) {
    match *step {
        Step::Open { trader: t, is_long, margin, leverage } => {
            let margin = Decimal::from(margin);
            let size = margin * Decimal::from(leverage);
            if let Ok(id) = p.submit(&trader(TRADERS[t]), market_order(is_long, margin, size), eth(margin + size)) {
                let _ = p.execute_at_oracle(id, &keeper());
            }
        }
        Step::Close { trader: t, percent } => {
            let owner = trader(TRADERS[t]);
            let Some(position) = p.position(&owner, &native(), &eth_usd()).cloned() else {
                return;
            };
            let size = (position.size.value() * Decimal::from(percent) / dec!(100)).floor();
            let request = OrderRequest::market(
                eth_usd().as_str(),
                AssetParams::NATIVE,
                !position.side.is_long(),
                Decimal::ZERO,
                size,
            )
            .reduce_only();
            if let Ok(id) = p.submit(&owner, request, eth(dec!(1))) {
                let _ = p.execute_at_oracle(id, &keeper());
            }
        }
        Step::Move { bps } => {
            let current = p.oracle_price(&eth_usd()).map(|price| price.value()).unwrap_or(dec!(1500));
            let next = (current * (Decimal::ONE + Decimal::new(bps.into(), 4))).round_dp(2);
            set_price(p, next.max(dec!(100)));
        }
        Step::Wait { hours } => {
            p.advance_time(i64::from(hours) * 3_600_000);
            let _ = p.update_funding(&native(), &eth_usd(), &keeper());
        }
        Step::Liquidate { trader: t } => {
            if let Some(price) = p.oracle_price(&eth_usd()) {
                let _ = p.liquidate(&trader(TRADERS[t]), &eth_usd(), &native(), price, &liquidator());
            }
        }
    }
}

fn position_sizes(p: &TestProcessor) -> (Amount, Amount) {
    TRADERS
        .iter()
        .flat_map(|name| p.positions_of(&trader(name)))
        .fold((Amount::zero(), Amount::zero()), |(long, short), position| match position.side {
            Side::Long => (long.add(position.size), short),
            Side::Short => (long, short.add(position.size)),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Value is only ever moved, never created or destroyed.
    #[test]
    fn asset_is_conserved(steps in proptest::collection::vec(step_strategy(), 1..40)) {
        let mut p = processor();
        let total = p.settlement().total(&native());

        for step in &steps {
            run(&mut p, step);
            prop_assert_eq!(p.settlement().total(&native()), total, "after {:?}", step);
        }
    }

    /// Custody holds exactly the open collateral plus pending escrow.
    #[test]
    fn custody_backs_every_position(steps in proptest::collection::vec(step_strategy(), 1..40)) {
        let mut p = processor();
        for step in &steps {
            run(&mut p, step);
            prop_assert!(custody_matches_book(&p), "custody drifted after {:?}", step);
        }
    }

    /// Open interest always equals the sum of open position sizes, per side.
    #[test]
    fn open_interest_tracks_positions(steps in proptest::collection::vec(step_strategy(), 1..40)) {
        let mut p = processor();
        for step in &steps {
            run(&mut p, step);
            let (long, short) = position_sizes(&p);
            let oi = p.open_interest_of(&native(), &eth_usd());
            prop_assert_eq!(oi.long, long);
            prop_assert_eq!(oi.short, short);
        }
    }

    /// No bucket ever goes negative and no stored position is empty.
    #[test]
    fn balances_and_positions_stay_sane(steps in proptest::collection::vec(step_strategy(), 1..40)) {
        let mut p = processor();
        for step in &steps {
            run(&mut p, step);
            prop_assert!(!p.settlement().pool(&native()).is_negative());
            prop_assert!(!p.settlement().custody(&native()).is_negative());
            for name in TRADERS {
                prop_assert!(!wallet(&p, &trader(name)).is_negative());
                for position in p.positions_of(&trader(name)) {
                    prop_assert!(position.size.is_positive());
                    prop_assert!(!position.collateral.is_negative());
                }
            }
        }
    }

    /// Every committed operation bumps the version by exactly one, refused ones not at all.
    #[test]
    fn version_counts_commits(steps in proptest::collection::vec(step_strategy(), 1..30)) {
        let mut p = processor();
        for step in &steps {
            let events_before = p.events().len();
            let version_before = p.version();
            run(&mut p, step);
            // each commit emits at least one event
            let commits = p.version() - version_before;
            prop_assert!(commits as usize <= p.events().len() - events_before);
        }
    }
}

/// Liquidating a whole book after a crash leaves nothing liquidatable and the pool
/// absorbs the losses without anyone being paid more than they posted.
#[test]
fn crash_liquidations_keep_the_pool_whole() {
    let mut p = processor();
    let total = p.settlement().total(&native());

    for (i, name) in TRADERS.iter().enumerate() {
        let leverage = Decimal::from(10 + i as u32 * 8);
        open(&mut p, &trader(name), true, dec!(1), leverage);
    }

    set_price(&mut p, dec!(1380));
    for name in TRADERS {
        let owner = trader(name);
        if let Ok(status) = p.liquidation_status(&owner, &native(), &eth_usd(), px(dec!(1380))) {
            if status.is_liquidatable() {
                let result = p.liquidate(&owner, &eth_usd(), &native(), px(dec!(1380)), &liquidator()).unwrap();
                assert!(result.liquidator_reward.add(result.liquidation_fee) <= result.remaining_collateral);
            }
        }
    }

    for name in TRADERS {
        if let Ok(status) = p.liquidation_status(&trader(name), &native(), &eth_usd(), px(dec!(1380))) {
            assert!(!status.is_liquidatable());
        }
    }
    assert_eq!(p.settlement().total(&native()), total);
    assert!(custody_matches_book(&p));
}
