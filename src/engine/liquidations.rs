//! Forced closes of undercollateralized positions.

use super::core::{OiChange, Processor, Transition};
use super::results::{EngineError, LiquidationResult};
use crate::events::{EventPayload, PositionLiquidatedEvent};
use crate::liquidation::{calculate_payout, evaluate_liquidation};
use crate::market::{AssetConfig, MarketConfig};
use crate::oracle::PriceOracle;
use crate::position::PositionKey;
use crate::roles::{Role, RoleRegistry};
use crate::settlement::{SettlementGateway, SettlementInstruction, TransferReason};
use crate::types::{AccountId, AssetId, MarketId, Price};
use tracing::{debug, warn};

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    /// Executor or liquidator. closes the whole position at `price` once its margin
    /// ratio is at or below the market threshold. the caller earns the reward.
    pub fn liquidate(
        &mut self,
        owner: &AccountId,
        market: &MarketId,
        asset: &AssetId,
        price: Price,
        caller: &AccountId,
    ) -> Result<LiquidationResult, EngineError> {
        let ctx = self.authorize(caller, &[Role::Executor, Role::Liquidator])?;
        let key = PositionKey::new(owner.clone(), asset.clone(), market.clone());
        let (transition, result) = self.plan_liquidation(&key, price, caller).map_err(|err| {
            debug!(owner = %owner, market = %market, error = %err, "liquidation rejected");
            err
        })?;
        self.commit(&ctx, transition)?;

        warn!(
            owner = %owner,
            market = %market,
            price = %price,
            ratio_bps = %result.margin_ratio_bps,
            reward = %result.liquidator_reward,
            bad_debt = %result.bad_debt,
            liquidator = %caller,
            "position liquidated"
        );
        Ok(result)
    }

    fn plan_liquidation(
        &self,
        key: &PositionKey,
        price: Price,
        liquidator: &AccountId,
    ) -> Result<(Transition, LiquidationResult), EngineError> {
        let market = self.liquidatable_market(key)?;
        self.supported_asset(&key.asset)?;
        if self.ledger.get(key).is_none() {
            return Err(EngineError::PositionNotFound);
        }
        self.check_deviation(market, price)?;

        let mut transition = Transition::default();
        let (settled, _, _) = self.plan_funding_touch(key, market, &mut transition);
        let position = settled.ok_or(EngineError::PositionNotFound)?;

        let status = evaluate_liquidation(&position, price, market.liq_threshold_bps);
        if !status.is_liquidatable() {
            return Err(EngineError::PositionNotLiquidatable {
                ratio_bps: status.margin_ratio_bps(),
            });
        }

        let pnl = position.unrealized_pnl(price);
        let payout = calculate_payout(position.collateral, pnl, &self.config.liquidation);

        transition.batch.add(SettlementInstruction::Reward {
            account: liquidator.clone(),
            asset: key.asset.clone(),
            amount: payout.reward,
        });
        transition.batch.add(SettlementInstruction::Fee {
            account: key.owner.clone(),
            asset: key.asset.clone(),
            amount: payout.fee,
        });
        transition.batch.add(SettlementInstruction::Debit {
            account: key.owner.clone(),
            asset: key.asset.clone(),
            amount: payout.to_pool,
            reason: TransferReason::Liquidation,
        });
        transition
            .open_interest
            .push((key.asset.clone(), key.market.clone(), position.side, position.size, OiChange::Decrease));
        transition.positions.push((key.clone(), None));
        transition.events.push(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            owner: key.owner.clone(),
            market: key.market.clone(),
            asset: key.asset.clone(),
            side: position.side,
            size: position.size,
            entry_price: position.entry_price,
            price,
            margin_ratio_bps: status.margin_ratio_bps(),
            realized_pnl: pnl,
            remaining_collateral: payout.remaining,
            liquidator_reward: payout.reward,
            liquidation_fee: payout.fee,
            liquidator: liquidator.clone(),
        }));

        let result = LiquidationResult {
            owner: key.owner.clone(),
            market: key.market.clone(),
            asset: key.asset.clone(),
            size: position.size,
            price,
            margin_ratio_bps: status.margin_ratio_bps(),
            realized_pnl: pnl,
            remaining_collateral: payout.remaining,
            liquidator_reward: payout.reward,
            liquidation_fee: payout.fee,
            bad_debt: payout.bad_debt,
        };
        Ok((transition, result))
    }
}
