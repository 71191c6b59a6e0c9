//! Order submission, cancellation and expiry.

use super::core::{Processor, Transition};
use super::results::EngineError;
use crate::conditional::TriggerCondition;
use crate::events::{CancelReason, EventPayload, NewOrderEvent, OrderCancelledEvent};
use crate::market::{AssetConfig, MarketConfig};
use crate::oracle::PriceOracle;
use crate::order::{compute_fee, required_escrow, Order, OrderKind, OrderRequest, OrderStatus};
use crate::position::PositionKey;
use crate::roles::{Role, RoleRegistry};
use crate::settlement::{SettlementGateway, SettlementInstruction};
use crate::types::{AccountId, Amount, AssetId, MarketId, OrderId};
use rust_decimal::Decimal;
use tracing::{debug, info};

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    /// Validate, escrow margin + fee out of `value`, and store the order as pending.
    /// Only the required escrow is taken; any excess in `value` stays with the owner.
    pub fn submit(&mut self, owner: &AccountId, request: OrderRequest, value: Amount) -> Result<OrderId, EngineError> {
        let ctx = self.as_owner(owner);
        let transition = self.plan_submit(owner, &request, value).map_err(|err| {
            info!(owner = %owner, market = %request.market, error = %err, "order rejected");
            err
        })?;

        let order_id = self.book.peek_id();
        self.commit(&ctx, transition)?;
        info!(
            order_id = %order_id,
            owner = %owner,
            market = %request.market,
            is_long = request.is_long,
            size = %request.size,
            "order submitted"
        );
        Ok(order_id)
    }

    fn plan_submit(&self, owner: &AccountId, request: &OrderRequest, value: Amount) -> Result<Transition, EngineError> {
        let market_id = MarketId::new(request.market.as_str());
        let market = self
            .markets
            .get(&market_id)
            .ok_or_else(|| EngineError::UnknownMarket(market_id.clone()))?;
        if market.is_closed {
            return Err(EngineError::MarketClosed(market_id));
        }
        if self.is_paused(&market_id) || (market.is_reduce_only && !request.is_reduce_only) {
            return Err(EngineError::TradingPaused(market_id));
        }

        let asset_id = AssetId::new(request.asset.as_str());
        let asset = self.supported_asset(&asset_id)?;
        let kind = OrderKind::try_from(request.order_type).map_err(EngineError::InvalidOrderType)?;
        let side = request.side();

        let size = Amount::new(request.size);
        let minimum = Amount::new(asset.min_order_size);
        if !size.is_positive() || size < minimum {
            return Err(EngineError::BelowMinSize { size, minimum });
        }

        // reduce-only orders never post margin; anything sent for it stays in the wallet
        let margin = if request.is_reduce_only {
            Amount::zero()
        } else {
            Amount::new(request.margin)
        };
        if request.is_reduce_only {
            let key = PositionKey::new(owner.clone(), asset_id.clone(), market_id.clone());
            match self.ledger.get(&key) {
                Some(position) if position.side == side.opposite() && position.size >= size => {}
                _ => {
                    return Err(EngineError::ReduceOnlyViolation(
                        "no opposing position of at least the order size",
                    ))
                }
            }
        } else {
            if !margin.is_positive() {
                return Err(EngineError::LeverageOutOfBounds {
                    leverage: Decimal::MAX,
                    max: market.max_leverage,
                });
            }
            let leverage = size.value() / margin.value();
            if leverage < Decimal::ONE || leverage > market.max_leverage {
                return Err(EngineError::LeverageOutOfBounds {
                    leverage,
                    max: market.max_leverage,
                });
            }
            self.check_open_interest(market, &asset_id, side, size)?;
        }

        let trigger = match TriggerCondition::for_order(kind, side) {
            None => {
                if !request.price.is_zero() {
                    return Err(EngineError::InvalidTriggerPrice("market orders carry no price"));
                }
                None
            }
            Some(condition) => {
                let trigger = request
                    .trigger_price()
                    .ok_or(EngineError::InvalidTriggerPrice("limit and stop orders need a positive price"))?;
                let oracle = self.reference_price(&market_id)?;
                if !condition.is_valid_placement(trigger, oracle, market.min_trigger_distance_bps) {
                    debug!(%trigger, %oracle, ?kind, ?side, "trigger placement rejected");
                    return Err(EngineError::InvalidTriggerPrice(
                        "trigger on the wrong side of the oracle price or too close to it",
                    ));
                }
                Some(trigger)
            }
        };

        let fee = compute_fee(size, market.fee_bps);
        let escrow = required_escrow(margin, fee, request.is_reduce_only);
        if value < escrow {
            return Err(EngineError::InsufficientEscrow {
                provided: value,
                required: escrow,
            });
        }

        let order = Order {
            id: self.book.peek_id(),
            owner: owner.clone(),
            market: market_id.clone(),
            asset: asset_id.clone(),
            side,
            margin,
            size,
            price: trigger,
            kind,
            reduce_only: request.is_reduce_only,
            expiry: request.expiry(),
            cancel_order_id: request.cancel_order_id(),
            fee,
            created_at: self.current_time,
        };

        let mut transition = Transition::default();
        transition.batch.add(SettlementInstruction::Escrow {
            account: owner.clone(),
            asset: asset_id.clone(),
            amount: escrow,
        });
        transition.events.push(EventPayload::NewOrder(NewOrderEvent {
            order_id: order.id,
            owner: owner.clone(),
            market: market_id,
            asset: asset_id,
            is_long: request.is_long,
            margin,
            size,
            price: request.price,
            fee,
            order_type: request.order_type,
            is_reduce_only: request.is_reduce_only,
            expiry: request.expiry,
            cancel_order_id: request.cancel_order_id,
        }));
        transition.new_order = Some(order);
        Ok(transition)
    }

    /// Cancel a pending order and refund its escrow to the owner.
    /// Owners, executors and liquidators may cancel; anyone may cancel an expired order.
    pub fn cancel(&mut self, order_id: OrderId, caller: &AccountId) -> Result<Amount, EngineError> {
        let order = self.pending_order(order_id)?.clone();
        let expired = order.is_expired(self.current_time);

        let (ctx, reason) = if &order.owner == caller {
            let reason = if expired { CancelReason::Expired } else { CancelReason::OwnerRequested };
            (self.as_owner(caller), reason)
        } else if expired {
            (self.as_owner(caller), CancelReason::Expired)
        } else {
            (self.authorize(caller, &[Role::Executor, Role::Liquidator])?, CancelReason::Operator)
        };

        let mut transition = Transition::default();
        self.plan_cancel(&order, reason, &mut transition);
        let linked = self.plan_linked_cancel(&order, &mut transition);
        self.commit(&ctx, transition)?;

        info!(
            order_id = %order_id,
            owner = %order.owner,
            caller = %caller,
            ?reason,
            linked = ?linked,
            refund = %order.escrow(),
            "order cancelled"
        );
        Ok(order.escrow())
    }

    /// Sweeps every pending order past its expiry. returns the ids swept.
    pub fn cancel_expired(&mut self, caller: &AccountId) -> Result<Vec<OrderId>, EngineError> {
        let expired = self.book.expired_ids(self.current_time);
        if expired.is_empty() {
            return Ok(expired);
        }

        let mut transition = Transition::default();
        for id in &expired {
            if let Some(order) = self.book.pending(*id) {
                self.plan_cancel(order, CancelReason::Expired, &mut transition);
            }
        }
        let ctx = self.as_owner(caller);
        self.commit(&ctx, transition)?;
        info!(caller = %caller, count = expired.len(), "expired orders swept");
        Ok(expired)
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.book.get(order_id)
    }

    pub fn order_status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.book.status(order_id)
    }

    pub fn orders_of(&self, owner: &AccountId) -> Vec<(&Order, OrderStatus)> {
        self.book.orders_of(owner).collect()
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &Order> {
        self.book.pending_orders()
    }

    pub(super) fn pending_order(&self, order_id: OrderId) -> Result<&Order, EngineError> {
        match self.book.status(order_id) {
            None => Err(EngineError::UnknownOrder(order_id)),
            Some(OrderStatus::Pending) => self.book.get(order_id).ok_or(EngineError::UnknownOrder(order_id)),
            Some(_) => Err(EngineError::OrderNotPending(order_id)),
        }
    }

    /// Refund + terminal status for one order. expired orders end as Expired.
    pub(super) fn plan_cancel(&self, order: &Order, reason: CancelReason, transition: &mut Transition) {
        let status = if order.is_expired(self.current_time) {
            OrderStatus::Expired
        } else {
            OrderStatus::Cancelled
        };
        let refund = order.escrow();

        transition.batch.add(SettlementInstruction::Release {
            account: order.owner.clone(),
            asset: order.asset.clone(),
            amount: refund,
        });
        transition.statuses.push((order.id, status));
        transition.events.push(EventPayload::OrderCancelled(OrderCancelledEvent {
            order_id: order.id,
            owner: order.owner.clone(),
            market: order.market.clone(),
            asset: order.asset.clone(),
            refund,
            reason,
        }));
    }

    // best effort: skipped when the companion is gone, foreign, or already in this transition
    pub(super) fn plan_linked_cancel(&self, order: &Order, transition: &mut Transition) -> Option<OrderId> {
        let link = order.cancel_order_id?;
        let companion = self.book.pending(link)?;
        if companion.owner != order.owner || companion.id == order.id {
            debug!(order_id = %order.id, linked = %link, "linked order not cancelled");
            return None;
        }
        if transition.statuses.iter().any(|(id, _)| *id == link) {
            return None;
        }
        self.plan_cancel(companion, CancelReason::Linked, transition);
        Some(link)
    }
}
