//! Shared wiring for the integration tests: local config, a mock oracle at
//! 1500 for ETH-USD, funded wallets and a seeded pool.

#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use synth_perps::*;

pub type TestProcessor = Processor<MarketTable, AssetTable, MockOracle, RoleTable, Vault>;

/// 1 ETH in wei.
pub const ONE: Decimal = dec!(1_000_000_000_000_000_000);
pub const START_SECS: i64 = 1_700_000_000;

pub fn eth(amount: Decimal) -> Amount {
    Amount::new(amount * ONE)
}

pub fn px(value: Decimal) -> Price {
    Price::new_unchecked(value)
}

pub fn native() -> AssetId {
    AssetId::new(AssetParams::NATIVE)
}

pub fn eth_usd() -> MarketId {
    MarketId::new("ETH-USD")
}

pub fn keeper() -> AccountId {
    AccountId::new("keeper")
}

pub fn liquidator() -> AccountId {
    AccountId::new("liquidator")
}

pub fn trader(name: &str) -> AccountId {
    AccountId::new(name)
}

pub const TRADERS: [&str; 6] = ["alice", "bob", "carol", "dave", "erin", "frank"];

pub fn processor() -> TestProcessor {
    processor_with(EngineConfig::from_protocol(&ProtocolConfig::local()))
}

pub fn processor_with(config: EngineConfig) -> TestProcessor {
    build(&ProtocolConfig::local(), config)
}

/// Same wiring on top of a custom protocol config.
pub fn processor_from(protocol: &ProtocolConfig) -> TestProcessor {
    build(protocol, EngineConfig::from_protocol(protocol))
}

fn build(protocol: &ProtocolConfig, config: EngineConfig) -> TestProcessor {
    let mut vault = Vault::new();
    vault.seed_pool(&native(), eth(dec!(1000)));
    for name in TRADERS {
        vault.fund_wallet(&trader(name), &native(), eth(dec!(100)));
    }

    let mut oracle = MockOracle::new();
    oracle.set_price(&eth_usd(), px(dec!(1500)));
    oracle.set_price(&MarketId::new("BTC-USD"), px(dec!(50000)));

    ProcessorBuilder::new()
        .markets(protocol.market_table())
        .assets(protocol.asset_table())
        .oracle(oracle)
        .roles(
            RoleTable::new()
                .grant(keeper(), Role::Executor)
                .grant(liquidator(), Role::Liquidator),
        )
        .settlement(vault)
        .config(config)
        .starting_at(Timestamp::from_secs(START_SECS))
        .build()
}

/// Market order on ETH-USD, margin and size in whole ETH.
pub fn market_order(is_long: bool, margin: Decimal, size: Decimal) -> OrderRequest {
    OrderRequest::market(eth_usd().as_str(), AssetParams::NATIVE, is_long, margin * ONE, size * ONE)
}

pub fn set_price(p: &mut TestProcessor, value: Decimal) {
    p.oracle_mut().set_price(&eth_usd(), px(value));
}

/// Submits and fills a market order at the current oracle price.
pub fn open(p: &mut TestProcessor, owner: &AccountId, is_long: bool, margin: Decimal, size: Decimal) -> ExecutionResult {
    let id = p
        .submit(owner, market_order(is_long, margin, size), eth(margin + size))
        .unwrap();
    p.execute_at_oracle(id, &keeper()).unwrap()
}

/// Reduce-only close of `size` ETH at the current oracle price.
pub fn close(p: &mut TestProcessor, owner: &AccountId, position_is_long: bool, size: Decimal) -> Result<ExecutionResult, EngineError> {
    let id = p.submit(owner, market_order(!position_is_long, Decimal::ZERO, size).reduce_only(), eth(size))?;
    p.execute_at_oracle(id, &keeper())
}

pub fn wallet(p: &TestProcessor, owner: &AccountId) -> Amount {
    p.settlement().wallet(owner, &native())
}

/// Custody has to hold every open position's collateral plus every pending escrow.
pub fn custody_matches_book(p: &TestProcessor) -> bool {
    let collateral: Amount = TRADERS
        .iter()
        .flat_map(|name| p.positions_of(&trader(name)))
        .map(|position| position.collateral)
        .sum();
    let escrowed: Amount = p.pending_orders().map(|order| order.escrow()).sum();
    p.settlement().custody(&native()) == collateral.add(escrowed)
}
