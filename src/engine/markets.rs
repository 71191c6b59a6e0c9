//! Market gating and price validation shared by submit, execute and liquidate.

use super::core::{Processor, Transition};
use super::results::EngineError;
use crate::events::{EventPayload, MarketPauseChangedEvent};
use crate::market::{AssetConfig, AssetParams, MarketConfig, MarketParams};
use crate::oracle::PriceOracle;
use crate::position::PositionKey;
use crate::roles::{Role, RoleRegistry};
use crate::settlement::SettlementGateway;
use crate::types::{AccountId, Amount, AssetId, MarketId, Price, Side};
use tracing::{debug, info};

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    /// Executor-only pause switch. a paused market rejects submissions, executions and liquidations.
    /// closed markets still accept liquidations.
    pub fn set_market_paused(&mut self, market: &MarketId, paused: bool, caller: &AccountId) -> Result<(), EngineError> {
        let ctx = self.authorize(caller, &[Role::Executor])?;
        if self.markets.get(market).is_none() {
            return Err(EngineError::UnknownMarket(market.clone()));
        }

        let transition = Transition {
            pause: Some((market.clone(), paused)),
            events: vec![EventPayload::MarketPauseChanged(MarketPauseChangedEvent {
                market: market.clone(),
                paused,
                by: caller.clone(),
            })],
            ..Transition::default()
        };
        self.commit(&ctx, transition)?;
        info!(market = %market, paused, by = %caller, "market pause changed");
        Ok(())
    }

    /// Fresh oracle price, if there is one.
    pub fn oracle_price(&self, market: &MarketId) -> Option<Price> {
        self.oracle.get_price(market).and_then(|quote| quote.usable())
    }

    // known, open, not paused
    pub(super) fn tradable_market(&self, market: &MarketId) -> Result<&MarketParams, EngineError> {
        let params = self
            .markets
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))?;
        if params.is_closed {
            return Err(EngineError::MarketClosed(market.clone()));
        }
        if self.is_paused(market) {
            return Err(EngineError::TradingPaused(market.clone()));
        }
        Ok(params)
    }

    // known and not paused. closed markets stay liquidatable so no position is stranded
    pub(super) fn liquidatable_market(&self, key: &PositionKey) -> Result<&MarketParams, EngineError> {
        let params = self
            .markets
            .get(&key.market)
            .ok_or_else(|| EngineError::UnknownMarket(key.market.clone()))?;
        if self.is_paused(&key.market) {
            return Err(EngineError::TradingPaused(key.market.clone()));
        }
        Ok(params)
    }

    /// Rejects fills that would push one side's open interest past the market cap.
    pub(super) fn check_open_interest(
        &self,
        market: &MarketParams,
        asset: &AssetId,
        side: Side,
        size: Amount,
    ) -> Result<(), EngineError> {
        let Some(cap) = market.max_open_interest else {
            return Ok(());
        };
        let projected = self.ledger.open_interest_of(asset, &market.id).side(side).add(size);
        if projected.value() > cap {
            debug!(market = %market.id, ?side, %projected, %cap, "open interest cap reached");
            return Err(EngineError::OpenInterestCapExceeded {
                market: market.id.clone(),
                side,
                projected,
                cap: Amount::new(cap),
            });
        }
        Ok(())
    }

    pub(super) fn supported_asset(&self, asset: &AssetId) -> Result<&AssetParams, EngineError> {
        self.assets
            .get(asset)
            .ok_or_else(|| EngineError::UnknownAsset(asset.clone()))
    }

    pub(super) fn reference_price(&self, market: &MarketId) -> Result<Price, EngineError> {
        self.oracle_price(market).ok_or_else(|| {
            debug!(market = %market, "oracle price missing or stale");
            EngineError::StaleOrDeviatedPrice(market.clone())
        })
    }

    /// A presented price must sit within `max_deviation_bps` of the oracle reference.
    pub(super) fn check_deviation(&self, market: &MarketParams, price: Price) -> Result<(), EngineError> {
        let reference = self.reference_price(&market.id)?;
        let deviation = price.deviation_bps(reference);
        if deviation > market.max_deviation_bps.as_decimal() {
            debug!(
                market = %market.id,
                %price,
                %reference,
                %deviation,
                "presented price deviates from oracle"
            );
            return Err(EngineError::StaleOrDeviatedPrice(market.id.clone()));
        }
        Ok(())
    }
}
