//! Market and asset parameters.
//!
//! Both are owned by external append-only stores. The processor reads them through
//! the `MarketConfig` / `AssetConfig` traits and never mutates them; `MarketTable`
//! and `AssetTable` are the in-memory stores used by tests and the simulator.

use crate::types::{AssetId, Bps, MarketId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCategory {
    Crypto,
    Fx,
    Commodities,
    Indices,
}

/// Per-market trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    pub id: MarketId,
    /// Human-readable name (e.g., "Ethereum / U.S. Dollar")
    pub name: String,
    pub category: MarketCategory,
    /// Upper bound on size / margin.
    pub max_leverage: Decimal,
    /// Max distance between an executor price and the oracle reference.
    pub max_deviation_bps: Bps,
    /// Trading fee charged on size.
    pub fee_bps: Bps,
    /// Margin ratio at or below which a position is liquidatable.
    pub liq_threshold_bps: Bps,
    /// Min distance between a limit/stop trigger and the oracle price at submission.
    pub min_trigger_distance_bps: Bps,
    /// Annualised funding rate paid by the heavier side at full imbalance.
    pub funding_factor_bps: Bps,
    /// Oracle feed reference.
    pub oracle_feed: String,
    /// Executors may fill at the oracle's own price.
    pub allow_oracle_execution: bool,
    pub is_closed: bool,
    /// Kill switch: only reduce-only orders are accepted.
    pub is_reduce_only: bool,
    /// Cap on each side's open interest, in collateral base units. `None` is uncapped.
    #[serde(default)]
    pub max_open_interest: Option<Decimal>,
}

impl MarketParams {
    pub fn new(id: &str, name: &str, category: MarketCategory, max_leverage: u32, fee_bps: i32) -> Self {
        // maintenance ratio at half the initial margin required at max leverage
        let leverage = i32::try_from(max_leverage.max(1)).unwrap_or(i32::MAX);
        let liq_threshold = (Bps::DIVIDER / leverage / 2).max(1);
        Self {
            id: MarketId::new(id),
            name: name.to_string(),
            category,
            max_leverage: Decimal::from(max_leverage),
            max_deviation_bps: Bps::new(500),
            fee_bps: Bps::new(fee_bps),
            liq_threshold_bps: Bps::new(liq_threshold),
            min_trigger_distance_bps: Bps::new(10),
            funding_factor_bps: Bps::new(10_000),
            oracle_feed: String::new(),
            allow_oracle_execution: true,
            is_closed: false,
            is_reduce_only: false,
            max_open_interest: None,
        }
    }

    pub fn eth_usd() -> Self {
        Self::new("ETH-USD", "Ethereum / U.S. Dollar", MarketCategory::Crypto, 50, 10)
    }

    pub fn btc_usd() -> Self {
        Self::new("BTC-USD", "Bitcoin / U.S. Dollar", MarketCategory::Crypto, 50, 10)
    }

    pub fn eur_usd() -> Self {
        Self::new("EUR-USD", "Euro / U.S. Dollar", MarketCategory::Fx, 100, 3)
    }

    pub fn xau_usd() -> Self {
        Self::new("XAU-USD", "Gold / U.S. Dollar", MarketCategory::Commodities, 20, 10)
    }

    pub fn spx500() -> Self {
        Self::new("SPX500", "S&P 500", MarketCategory::Indices, 20, 10)
    }

    pub fn with_feed(mut self, feed: &str) -> Self {
        self.oracle_feed = feed.to_string();
        self
    }
}

/// Per-collateral-asset parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetParams {
    pub id: AssetId,
    pub symbol: String,
    pub decimals: u32,
    /// Smallest order size accepted, in base units.
    pub min_order_size: Decimal,
    pub oracle_feed: String,
}

impl AssetParams {
    pub const NATIVE: &'static str = "0x0000000000000000000000000000000000000000";
    pub const USDC: &'static str = "0xff970a61a04b1ca14834a43f5de4533ebddb5cc8";

    /// Native coin, 18 decimals, min size 0.01.
    pub fn eth() -> Self {
        Self {
            id: AssetId::new(Self::NATIVE),
            symbol: "ETH".to_string(),
            decimals: 18,
            min_order_size: Decimal::from(10_000_000_000_000_000u64),
            oracle_feed: String::new(),
        }
    }

    /// USDC, 6 decimals, min size 10.
    pub fn usdc() -> Self {
        Self {
            id: AssetId::new(Self::USDC),
            symbol: "USDC".to_string(),
            decimals: 6,
            min_order_size: Decimal::from(10_000_000u64),
            oracle_feed: String::new(),
        }
    }
}

/// Read-only market config store.
pub trait MarketConfig {
    fn get(&self, market: &MarketId) -> Option<&MarketParams>;
}

/// Read-only asset config store.
pub trait AssetConfig {
    fn get(&self, asset: &AssetId) -> Option<&AssetParams>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketTable {
    markets: HashMap<MarketId, MarketParams>,
}

impl MarketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, params: MarketParams) -> Self {
        self.insert(params);
        self
    }

    pub fn insert(&mut self, params: MarketParams) {
        self.markets.insert(params.id.clone(), params);
    }

    pub fn get_mut(&mut self, market: &MarketId) -> Option<&mut MarketParams> {
        self.markets.get_mut(market)
    }

    pub fn ids(&self) -> impl Iterator<Item = &MarketId> {
        self.markets.keys()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

impl MarketConfig for MarketTable {
    fn get(&self, market: &MarketId) -> Option<&MarketParams> {
        self.markets.get(market)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetTable {
    assets: HashMap<AssetId, AssetParams>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, params: AssetParams) -> Self {
        self.insert(params);
        self
    }

    pub fn insert(&mut self, params: AssetParams) {
        self.assets.insert(params.id.clone(), params);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetConfig for AssetTable {
    fn get(&self, asset: &AssetId) -> Option<&AssetParams> {
        self.assets.get(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn preset_thresholds_follow_leverage() {
        let eth = MarketParams::eth_usd();
        assert_eq!(eth.max_leverage, dec!(50));
        assert_eq!(eth.fee_bps, Bps::new(10));
        // 50x -> 200 bps initial, 100 bps maintenance
        assert_eq!(eth.liq_threshold_bps, Bps::new(100));

        let eur = MarketParams::eur_usd();
        assert_eq!(eur.liq_threshold_bps, Bps::new(50));

        let xau = MarketParams::xau_usd();
        assert_eq!(xau.liq_threshold_bps, Bps::new(250));
        assert_eq!(xau.max_open_interest, None);
    }

    #[test]
    fn extreme_leverage_keeps_a_positive_threshold() {
        let wild = MarketParams::new("WILD", "Wild", MarketCategory::Crypto, u32::MAX, 10);
        assert_eq!(wild.liq_threshold_bps, Bps::new(1));
        assert_eq!(wild.max_leverage, Decimal::from(u32::MAX));
    }

    #[test]
    fn table_lookup() {
        let table = MarketTable::new().with(MarketParams::eth_usd());
        assert!(table.get(&MarketId::new("ETH-USD")).is_some());
        assert!(table.get(&MarketId::new("DOGE-USD")).is_none());

        let assets = AssetTable::new().with(AssetParams::eth()).with(AssetParams::usdc());
        assert_eq!(assets.len(), 2);
        assert_eq!(assets.get(&AssetId::new(AssetParams::USDC)).unwrap().decimals, 6);
    }
}
