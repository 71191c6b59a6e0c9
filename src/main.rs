//! Synthetic perps simulation.
//!
//! Runs scripted scenarios against the in-memory oracle, role table and vault:
//! open/close, trigger orders, funding, liquidation and a multi-threaded burst.
//! Pass a protocol config json path as the first argument to override the presets.
//! Log level follows RUST_LOG (default: info).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::thread;
use synth_perps::*;
use tracing_subscriber::EnvFilter;

type SimProcessor = Processor<MarketTable, AssetTable, MockOracle, RoleTable, Vault>;

const ONE_ETH: Decimal = dec!(1_000_000_000_000_000_000);

fn eth(amount: Decimal) -> Amount {
    Amount::new(amount * ONE_ETH)
}

fn price(value: Decimal) -> Result<Price, Box<dyn Error>> {
    Price::new(value).ok_or_else(|| format!("invalid price {value}").into())
}

struct Sim {
    processor: SimProcessor,
    keeper: AccountId,
    asset: AssetId,
    market: MarketId,
}

impl Sim {
    fn new(config: &ProtocolConfig) -> Result<Self, Box<dyn Error>> {
        let keeper = AccountId::new("keeper");
        let asset = AssetId::new(AssetParams::NATIVE);
        let market = MarketId::new("ETH-USD");

        let mut vault = Vault::new();
        vault.seed_pool(&asset, eth(dec!(1000)));
        for trader in ["alice", "bob", "carol"] {
            vault.fund_wallet(&AccountId::new(trader), &asset, eth(dec!(100)));
        }

        let mut oracle = MockOracle::new();
        oracle.set_price(&market, price(dec!(1500))?);

        let processor = ProcessorBuilder::new()
            .markets(config.market_table())
            .assets(config.asset_table())
            .oracle(oracle)
            .roles(
                RoleTable::new()
                    .grant(keeper.clone(), Role::Executor)
                    .grant(AccountId::new("liquidator"), Role::Liquidator),
            )
            .settlement(vault)
            .config(EngineConfig::from_protocol(config))
            .build();

        Ok(Self {
            processor,
            keeper,
            asset,
            market,
        })
    }

    fn set_oracle(&mut self, value: Decimal) -> Result<(), Box<dyn Error>> {
        let market = self.market.clone();
        self.processor.oracle_mut().set_price(&market, price(value)?);
        Ok(())
    }

    fn request(&self, is_long: bool, margin: Decimal, size: Decimal) -> OrderRequest {
        OrderRequest::market(self.market.as_str(), self.asset.as_str(), is_long, margin * ONE_ETH, size * ONE_ETH)
    }

    fn wallet(&self, trader: &AccountId) -> Amount {
        self.processor.settlement().wallet(trader, &self.asset)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ProtocolConfig::load(path)?,
        None => ProtocolConfig::mainnet(),
    };

    println!("Synthetic Perps Simulation");
    println!("{:?} config, {} markets\n", config.environment, config.markets.len());

    scenario_1_open_and_close(&config)?;
    scenario_2_limit_trigger(&config)?;
    scenario_3_funding(&config)?;
    scenario_4_liquidation(&config)?;
    scenario_5_shared_processor(&config)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// Market long, price rises, reduce-only close.
fn scenario_1_open_and_close(config: &ProtocolConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Open and Close\n");
    let mut sim = Sim::new(config)?;
    let alice = AccountId::new("alice");

    let open = sim.request(true, dec!(1), dec!(5));
    let id = sim.processor.submit(&alice, open, eth(dec!(2)))?;
    let order = sim.processor.order(id).ok_or("order missing")?;
    println!("  Alice submits long 5 ETH notional on 1 ETH margin, escrow {}", order.escrow());

    let keeper = sim.keeper.clone();
    sim.processor.execute(id, price(dec!(1500))?, &keeper)?;
    println!("  Filled at 1500, open interest {}", sim.processor.open_interest(&sim.asset));

    sim.set_oracle(dec!(1550))?;
    let close = sim.request(false, dec!(0), dec!(5)).reduce_only();
    let close_id = sim.processor.submit(&alice, close, eth(dec!(1)))?;
    let result = sim.processor.execute(close_id, price(dec!(1550))?, &keeper)?;

    println!("  Closed at 1550: pnl {}, payout {}", result.realized_pnl, result.payout);
    println!("  Alice wallet {}, open interest {}\n", sim.wallet(&alice), sim.processor.open_interest(&sim.asset));
    Ok(())
}

/// Limit buy at 1450 only fills once the price reaches it.
fn scenario_2_limit_trigger(config: &ProtocolConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Limit Trigger\n");
    let mut sim = Sim::new(config)?;
    let bob = AccountId::new("bob");
    let keeper = sim.keeper.clone();

    let limit = sim.request(true, dec!(1), dec!(5)).limit(dec!(1450));
    let id = sim.processor.submit(&bob, limit, eth(dec!(1.005)))?;
    println!("  Bob places limit buy at 1450 with oracle at 1500");

    sim.set_oracle(dec!(1460))?;
    match sim.processor.execute(id, price(dec!(1460))?, &keeper) {
        Ok(_) => println!("  unexpected fill at 1460"),
        Err(err) => println!("  Execute at 1460 rejected: {err}"),
    }
    println!("  Order status: {:?}", sim.processor.order_status(id));

    sim.set_oracle(dec!(1440))?;
    let result = sim.processor.execute(id, price(dec!(1440))?, &keeper)?;
    println!("  Filled at {} ({:?})\n", result.price, result.fill);
    Ok(())
}

/// One-sided open interest makes longs pay over time.
fn scenario_3_funding(config: &ProtocolConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Funding\n");
    let mut sim = Sim::new(config)?;
    let carol = AccountId::new("carol");
    let keeper = sim.keeper.clone();

    let open = sim.request(true, dec!(2), dec!(10));
    let id = sim.processor.submit(&carol, open, eth(dec!(3)))?;
    sim.processor.execute(id, price(dec!(1500))?, &keeper)?;

    sim.processor.advance_time(30 * 24 * 3600 * 1000);
    let (asset, market) = (sim.asset.clone(), sim.market.clone());
    let index = sim.processor.update_funding(&asset, &market, &keeper)?;
    let owed = sim.processor.pending_funding(&carol, &asset, &market)?;
    println!("  After 30 days fully long: index {index}, carol owes {owed}\n");
    Ok(())
}

/// Price drop pushes a leveraged long under the threshold.
fn scenario_4_liquidation(config: &ProtocolConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Liquidation\n");
    let mut sim = Sim::new(config)?;
    let alice = AccountId::new("alice");
    let liquidator = AccountId::new("liquidator");
    let keeper = sim.keeper.clone();

    let open = sim.request(true, dec!(1), dec!(40));
    let id = sim.processor.submit(&alice, open, eth(dec!(2)))?;
    sim.processor.execute(id, price(dec!(1500))?, &keeper)?;
    let (asset, market) = (sim.asset.clone(), sim.market.clone());
    if let Some(liq) = sim.processor.liquidation_price(&alice, &asset, &market)? {
        println!("  Alice 40x long, liquidation price {liq}");
    }

    sim.set_oracle(dec!(1465))?;
    let result = sim.processor.liquidate(&alice, &market, &asset, price(dec!(1465))?, &liquidator)?;
    println!(
        "  Liquidated at 1465: ratio {} bps, reward {}, fee {}",
        result.margin_ratio_bps.round_dp(2),
        result.liquidator_reward,
        result.liquidation_fee
    );
    println!("  Liquidator wallet {}\n", sim.wallet(&liquidator));
    Ok(())
}

/// Several threads submitting through one shared handle.
fn scenario_5_shared_processor(config: &ProtocolConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 5: Shared Processor\n");
    let sim = Sim::new(config)?;
    let request = sim.request(true, dec!(1), dec!(2));
    let shared = SharedProcessor::new(sim.processor);

    let handles: Vec<_> = ["alice", "bob", "carol"]
        .into_iter()
        .map(|trader| {
            let shared = shared.clone();
            let request = request.clone();
            thread::spawn(move || shared.submit(&AccountId::new(trader), request, eth(dec!(2))))
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(Ok(id)) => println!("  submitted {id}"),
            Ok(Err(err)) => println!("  rejected: {err}"),
            Err(_) => println!("  submitter thread panicked"),
        }
    }
    println!("  version after burst: {}", shared.version());
    Ok(())
}
