//! Turning a pending order into a position change.

use super::core::{ExecutionContext, OiChange, Processor, Transition};
use super::results::{EngineError, ExecutionResult};
use crate::conditional::can_execute;
use crate::events::{
    CancelReason, EventPayload, OrderExecutedEvent, PositionClosedEvent, PositionDecreasedEvent,
    PositionIncreasedEvent,
};
use crate::market::{AssetConfig, MarketConfig};
use crate::oracle::PriceOracle;
use crate::order::{Order, OrderKind, OrderStatus};
use crate::position::{apply_fill, FillKind, PositionKey};
use crate::roles::{Role, RoleRegistry};
use crate::settlement::{SettlementGateway, SettlementInstruction, TransferReason};
use crate::types::{AccountId, OrderId, Price};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
enum PriceSource {
    Presented(Price),
    Oracle,
}

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    /// Executor-only. fills `order_id` at `price`, which must sit within the market's
    /// deviation bound of the oracle. limit/stop orders that cannot fill stay pending;
    /// market orders that cannot fill are cancelled and refunded.
    pub fn execute(&mut self, order_id: OrderId, price: Price, caller: &AccountId) -> Result<ExecutionResult, EngineError> {
        self.execute_with(order_id, PriceSource::Presented(price), caller)
    }

    /// Same as `execute` at the oracle's own price, for markets that allow it.
    pub fn execute_at_oracle(&mut self, order_id: OrderId, caller: &AccountId) -> Result<ExecutionResult, EngineError> {
        self.execute_with(order_id, PriceSource::Oracle, caller)
    }

    fn execute_with(&mut self, order_id: OrderId, source: PriceSource, caller: &AccountId) -> Result<ExecutionResult, EngineError> {
        let ctx = self.authorize(caller, &[Role::Executor])?;
        let order = self.pending_order(order_id)?.clone();
        if order.is_expired(self.current_time) {
            return Err(EngineError::OrderExpired(order_id));
        }

        let (transition, result) = match self.plan_execution(&order, source, caller) {
            Ok(planned) => planned,
            Err(err) => return Err(self.fail_execution(&ctx, &order, err)),
        };
        if let Err(err) = self.commit(&ctx, transition) {
            return Err(self.fail_execution(&ctx, &order, err));
        }

        info!(
            order_id = %order_id,
            owner = %order.owner,
            market = %order.market,
            price = %result.price,
            fill = ?result.fill,
            pnl = %result.realized_pnl,
            "order executed"
        );
        Ok(result)
    }

    // market orders do not wait around: any failure cancels them with a full refund
    fn fail_execution(&mut self, ctx: &ExecutionContext, order: &Order, err: EngineError) -> EngineError {
        if order.kind != OrderKind::Market {
            debug!(order_id = %order.id, error = %err, "execution failed, order stays pending");
            return err;
        }

        let mut transition = Transition::default();
        self.plan_cancel(order, CancelReason::ExecutionFailed, &mut transition);
        self.plan_linked_cancel(order, &mut transition);
        match self.commit(ctx, transition) {
            Ok(()) => warn!(order_id = %order.id, error = %err, "market order cancelled after failed execution"),
            Err(refund_err) => warn!(
                order_id = %order.id,
                error = %err,
                refund_error = %refund_err,
                "market order could not be refunded"
            ),
        }
        err
    }

    fn plan_execution(
        &self,
        order: &Order,
        source: PriceSource,
        executor: &AccountId,
    ) -> Result<(Transition, ExecutionResult), EngineError> {
        let market = self.tradable_market(&order.market)?;
        if market.is_reduce_only && !order.reduce_only {
            return Err(EngineError::TradingPaused(order.market.clone()));
        }
        self.supported_asset(&order.asset)?;

        let price = match source {
            PriceSource::Presented(price) => {
                self.check_deviation(market, price)?;
                price
            }
            PriceSource::Oracle => {
                if !market.allow_oracle_execution {
                    return Err(EngineError::TradingPaused(order.market.clone()));
                }
                self.reference_price(&order.market)?
            }
        };

        if !can_execute(order.kind, order.side, order.price, price) {
            return Err(EngineError::InvalidTriggerPrice("price has not reached the trigger"));
        }

        let key = PositionKey::new(order.owner.clone(), order.asset.clone(), order.market.clone());
        let mut transition = Transition::default();
        let (existing, charge, index) = self.plan_funding_touch(&key, market, &mut transition);

        if order.reduce_only {
            match &existing {
                Some(position) if position.side == order.side.opposite() && position.size >= order.size => {}
                _ => {
                    return Err(EngineError::ReduceOnlyViolation(
                        "no opposing position of at least the order size",
                    ))
                }
            }
        }

        let update = apply_fill(
            existing.as_ref(),
            key.clone(),
            order.side,
            order.size,
            price,
            order.margin,
            index,
            market.liq_threshold_bps,
            self.current_time,
        )?;

        transition.batch.add(SettlementInstruction::Fee {
            account: order.owner.clone(),
            asset: order.asset.clone(),
            amount: order.fee,
        });

        match update.kind {
            FillKind::Opened | FillKind::Increased => {
                self.check_open_interest(market, &key.asset, order.side, order.size)?;
                transition
                    .open_interest
                    .push((key.asset.clone(), key.market.clone(), order.side, order.size, OiChange::Increase));
                if let Some(position) = &update.position {
                    transition.events.push(EventPayload::PositionIncreased(PositionIncreasedEvent {
                        owner: key.owner.clone(),
                        market: key.market.clone(),
                        asset: key.asset.clone(),
                        side: position.side,
                        size_delta: order.size,
                        margin_delta: order.margin,
                        new_size: position.size,
                        entry_price: position.entry_price,
                        collateral: position.collateral,
                        price,
                    }));
                }
            }
            FillKind::Decreased | FillKind::Closed => {
                // existing is always Some on a decrease
                let Some(before) = existing.as_ref() else {
                    return Err(EngineError::PositionNotFound);
                };
                if update.pool_delta.is_positive() {
                    transition.batch.add(SettlementInstruction::Credit {
                        account: order.owner.clone(),
                        asset: order.asset.clone(),
                        amount: update.pool_delta,
                        reason: TransferReason::Pnl,
                    });
                } else {
                    transition.batch.add(SettlementInstruction::Debit {
                        account: order.owner.clone(),
                        asset: order.asset.clone(),
                        amount: update.pool_delta.abs(),
                        reason: TransferReason::Pnl,
                    });
                }
                transition.batch.add(SettlementInstruction::Release {
                    account: order.owner.clone(),
                    asset: order.asset.clone(),
                    amount: update.payout,
                });
                transition
                    .open_interest
                    .push((key.asset.clone(), key.market.clone(), before.side, order.size, OiChange::Decrease));

                let event = match &update.position {
                    Some(rest) => EventPayload::PositionDecreased(PositionDecreasedEvent {
                        owner: key.owner.clone(),
                        market: key.market.clone(),
                        asset: key.asset.clone(),
                        side: rest.side,
                        size_delta: order.size,
                        new_size: rest.size,
                        collateral: rest.collateral,
                        price,
                        realized_pnl: update.realized_pnl,
                        payout: update.payout,
                    }),
                    None => EventPayload::PositionClosed(PositionClosedEvent {
                        owner: key.owner.clone(),
                        market: key.market.clone(),
                        asset: key.asset.clone(),
                        side: before.side,
                        size: before.size,
                        entry_price: before.entry_price,
                        price,
                        realized_pnl: update.realized_pnl,
                        payout: update.payout,
                    }),
                };
                transition.events.push(event);
            }
        }

        transition.positions.push((key, update.position.clone()));
        transition.statuses.push((order.id, OrderStatus::Executed));
        transition.events.push(EventPayload::OrderExecuted(OrderExecutedEvent {
            order_id: order.id,
            owner: order.owner.clone(),
            market: order.market.clone(),
            asset: order.asset.clone(),
            side: order.side,
            size: order.size,
            price,
            fee: order.fee,
            fill: update.kind,
            executor: executor.clone(),
        }));
        let linked_cancelled = self.plan_linked_cancel(order, &mut transition);

        let result = ExecutionResult {
            order_id: order.id,
            price,
            fill: update.kind,
            fee: order.fee,
            realized_pnl: update.realized_pnl,
            payout: update.payout,
            funding_owed: charge.owed,
            linked_cancelled,
        };
        Ok((transition, result))
    }
}
