// 7.0 config.rs: all protocol settings in one place. market table, asset table,
// liquidation payout split. loadable from json, with presets per environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::liquidation::LiquidationParams;
use crate::market::{AssetParams, AssetTable, MarketCategory, MarketParams, MarketTable};
use crate::types::Bps;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("market {0} has invalid parameters: {1}")]
    InvalidMarket(String, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Mainnet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub environment: Environment,
    pub markets: Vec<MarketParams>,
    pub assets: Vec<AssetParams>,
    #[serde(default)]
    pub liquidation: LiquidationParams,
}

impl ProtocolConfig {
    /// Full market list. deviation limit 5%.
    pub fn mainnet() -> Self {
        let markets = vec![
            MarketParams::eth_usd(),
            MarketParams::btc_usd(),
            MarketParams::eur_usd(),
            MarketParams::xau_usd(),
            MarketParams::new("DOGE-USD", "Dogecoin / U.S. Dollar", MarketCategory::Crypto, 5, 65),
            MarketParams::new("LINK-USD", "Chainlink / U.S. Dollar", MarketCategory::Crypto, 5, 30),
            MarketParams::new("SOL-USD", "Solana / U.S. Dollar", MarketCategory::Crypto, 5, 30),
            MarketParams::new("BNB-USD", "Binance / U.S. Dollar", MarketCategory::Crypto, 10, 20),
            MarketParams::new("AUD-USD", "Australian Dollar / U.S. Dollar", MarketCategory::Fx, 100, 5),
            MarketParams::spx500(),
        ];

        Self {
            environment: Environment::Mainnet,
            markets,
            assets: vec![AssetParams::eth(), AssetParams::usdc()],
            liquidation: LiquidationParams::default(),
        }
    }

    /// Same markets with the deviation check effectively off, for local testing.
    pub fn local() -> Self {
        let mut config = Self::mainnet();
        config.environment = Environment::Local;
        for market in &mut config.markets {
            market.max_deviation_bps = Bps::new(Bps::DIVIDER);
        }
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for market in &self.markets {
            let id = market.id.to_string();
            if market.max_leverage < rust_decimal::Decimal::ONE {
                return Err(ConfigError::InvalidMarket(id, "max_leverage below 1"));
            }
            if market.fee_bps.value() < 0 || market.fee_bps.value() > Bps::DIVIDER {
                return Err(ConfigError::InvalidMarket(id, "fee_bps out of range"));
            }
            if market.liq_threshold_bps.value() <= 0 {
                return Err(ConfigError::InvalidMarket(id, "liq_threshold_bps must be positive"));
            }
        }
        Ok(())
    }

    pub fn market_table(&self) -> MarketTable {
        self.markets
            .iter()
            .cloned()
            .fold(MarketTable::new(), |table, market| table.with(market))
    }

    pub fn asset_table(&self) -> AssetTable {
        self.assets
            .iter()
            .cloned()
            .fold(AssetTable::new(), |table, asset| table.with(asset))
    }
}
