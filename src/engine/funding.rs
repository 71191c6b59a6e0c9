//! Funding index upkeep and settlement on position touch.

use super::core::{Processor, Transition};
use super::results::EngineError;
use crate::events::{EventPayload, FundingUpdatedEvent};
use crate::funding::{advance, funding_owed, settle_funding, FundingCharge};
use crate::market::{AssetConfig, MarketConfig, MarketParams};
use crate::oracle::PriceOracle;
use crate::position::{Position, PositionKey};
use crate::roles::{Role, RoleRegistry};
use crate::settlement::{SettlementGateway, SettlementInstruction, TransferReason};
use crate::types::{AccountId, Amount, AssetId, MarketId};
use rust_decimal::Decimal;
use tracing::info;

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    /// Keeper poke: advance the index for (asset, market) without touching positions.
    pub fn update_funding(&mut self, asset: &AssetId, market: &MarketId, caller: &AccountId) -> Result<Decimal, EngineError> {
        let ctx = self.authorize(caller, &[Role::Executor])?;
        let params = self
            .markets
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))?;
        self.supported_asset(asset)?;

        let state = self.funding.state(asset, market, self.current_time);
        let oi = self.ledger.open_interest_of(asset, market);
        let next = advance(&state, &oi, params.funding_factor_bps, self.current_time);

        let transition = Transition {
            funding: vec![(asset.clone(), market.clone(), next)],
            events: vec![EventPayload::FundingUpdated(FundingUpdatedEvent {
                asset: asset.clone(),
                market: market.clone(),
                index: next.index,
                increment: next.index - state.index,
                long_oi: oi.long,
                short_oi: oi.short,
            })],
            ..Transition::default()
        };
        self.commit(&ctx, transition)?;

        info!(asset = %asset, market = %market, index = %next.index, "funding updated");
        Ok(next.index)
    }

    pub fn funding_index(&self, asset: &AssetId, market: &MarketId) -> Decimal {
        self.funding.index(asset, market)
    }

    /// Funding the position would settle if touched now. positive = the trader pays.
    pub fn pending_funding(&self, owner: &AccountId, asset: &AssetId, market: &MarketId) -> Result<Amount, EngineError> {
        let params = self
            .markets
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))?;
        let key = PositionKey::new(owner.clone(), asset.clone(), market.clone());
        let position = self.ledger.get(&key).ok_or(EngineError::PositionNotFound)?;
        let index = self.projected_index(asset, params);
        Ok(funding_owed(position, index))
    }

    pub(super) fn projected_index(&self, asset: &AssetId, market: &MarketParams) -> Decimal {
        let state = self.funding.state(asset, &market.id, self.current_time);
        let oi = self.ledger.open_interest_of(asset, &market.id);
        advance(&state, &oi, market.funding_factor_bps, self.current_time).index
    }

    // 8.4: advances the index and settles the position under `key` against it, before
    // any size or collateral change. returns the settled position and the index used.
    // emits FundingUpdated whenever the index actually moved.
    pub(super) fn plan_funding_touch(
        &self,
        key: &PositionKey,
        market: &MarketParams,
        transition: &mut Transition,
    ) -> (Option<Position>, FundingCharge, Decimal) {
        let state = self.funding.state(&key.asset, &key.market, self.current_time);
        let oi = self.ledger.open_interest_of(&key.asset, &key.market);
        let next = advance(&state, &oi, market.funding_factor_bps, self.current_time);
        transition.funding.push((key.asset.clone(), key.market.clone(), next));
        if next.index != state.index {
            transition.events.push(EventPayload::FundingUpdated(FundingUpdatedEvent {
                asset: key.asset.clone(),
                market: key.market.clone(),
                index: next.index,
                increment: next.index - state.index,
                long_oi: oi.long,
                short_oi: oi.short,
            }));
        }

        let Some(position) = self.ledger.get(key) else {
            return (None, FundingCharge::default(), next.index);
        };

        let (settled, charge) = settle_funding(position, next.index, self.current_time);
        transition.batch.add(SettlementInstruction::Debit {
            account: key.owner.clone(),
            asset: key.asset.clone(),
            amount: charge.paid,
            reason: TransferReason::Funding,
        });
        transition.batch.add(SettlementInstruction::Credit {
            account: key.owner.clone(),
            asset: key.asset.clone(),
            amount: charge.received,
            reason: TransferReason::Funding,
        });
        (Some(settled), charge, next.index)
    }
}
