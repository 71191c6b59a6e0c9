//! Position and open interest queries.

use super::core::Processor;
use super::results::EngineError;
use crate::funding::settle_funding;
use crate::liquidation::{evaluate_liquidation, liquidation_price, LiquidationStatus};
use crate::market::{AssetConfig, MarketConfig};
use crate::oracle::PriceOracle;
use crate::position::{OpenInterest, Position, PositionKey};
use crate::roles::RoleRegistry;
use crate::settlement::SettlementGateway;
use crate::types::{AccountId, Amount, AssetId, MarketId, Price};
use rust_decimal::Decimal;

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    pub fn position(&self, owner: &AccountId, asset: &AssetId, market: &MarketId) -> Option<&Position> {
        self.ledger
            .get(&PositionKey::new(owner.clone(), asset.clone(), market.clone()))
    }

    pub fn positions_of(&self, owner: &AccountId) -> Vec<&Position> {
        let mut positions: Vec<_> = self.ledger.positions_of(owner).collect();
        positions.sort_by(|a, b| a.key.cmp(&b.key));
        positions
    }

    /// Long + short across every market settled in `asset`.
    pub fn open_interest(&self, asset: &AssetId) -> Amount {
        self.ledger.open_interest(asset)
    }

    pub fn open_interest_of(&self, asset: &AssetId, market: &MarketId) -> OpenInterest {
        self.ledger.open_interest_of(asset, market)
    }

    /// Margin ratio at `price`, with funding accrued up to now.
    pub fn margin_ratio_bps(
        &self,
        owner: &AccountId,
        asset: &AssetId,
        market: &MarketId,
        price: Price,
    ) -> Result<Decimal, EngineError> {
        Ok(self.settled_view(owner, asset, market)?.margin_ratio_bps(price))
    }

    pub fn liquidation_status(
        &self,
        owner: &AccountId,
        asset: &AssetId,
        market: &MarketId,
        price: Price,
    ) -> Result<LiquidationStatus, EngineError> {
        let params = self
            .markets
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))?;
        let position = self.settled_view(owner, asset, market)?;
        Ok(evaluate_liquidation(&position, price, params.liq_threshold_bps))
    }

    pub fn liquidation_price(&self, owner: &AccountId, asset: &AssetId, market: &MarketId) -> Result<Option<Price>, EngineError> {
        let params = self
            .markets
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))?;
        let position = self.settled_view(owner, asset, market)?;
        Ok(liquidation_price(&position, params.liq_threshold_bps))
    }

    // the position as it would look after a funding touch right now. nothing is stored
    fn settled_view(&self, owner: &AccountId, asset: &AssetId, market: &MarketId) -> Result<Position, EngineError> {
        let params = self
            .markets
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))?;
        let position = self
            .position(owner, asset, market)
            .ok_or(EngineError::PositionNotFound)?;
        let index = self.projected_index(asset, params);
        Ok(settle_funding(position, index, self.current_time).0)
    }
}
