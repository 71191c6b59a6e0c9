// 11.0: every committed state change produces an event. used for audit trails and
// for off-chain indexers. the EventPayload enum lists all event types.

use crate::position::FillKind;
use crate::types::{AccountId, Amount, AssetId, MarketId, OrderId, Price, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Order events
    NewOrder(NewOrderEvent),
    OrderExecuted(OrderExecutedEvent),
    OrderCancelled(OrderCancelledEvent),

    // Position events
    PositionIncreased(PositionIncreasedEvent),
    PositionDecreased(PositionDecreasedEvent),
    PositionClosed(PositionClosedEvent),
    PositionLiquidated(PositionLiquidatedEvent),

    // Market events
    FundingUpdated(FundingUpdatedEvent),
    MarketPauseChanged(MarketPauseChangedEvent),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::NewOrder(_) => "NewOrder",
            EventPayload::OrderExecuted(_) => "OrderExecuted",
            EventPayload::OrderCancelled(_) => "OrderCancelled",
            EventPayload::PositionIncreased(_) => "PositionIncreased",
            EventPayload::PositionDecreased(_) => "PositionDecreased",
            EventPayload::PositionClosed(_) => "PositionClosed",
            EventPayload::PositionLiquidated(_) => "PositionLiquidated",
            EventPayload::FundingUpdated(_) => "FundingUpdated",
            EventPayload::MarketPauseChanged(_) => "MarketPauseChanged",
        }
    }
}

/// Mirrors the submission parameters, zeros included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderEvent {
    pub order_id: OrderId,
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub is_long: bool,
    pub margin: Amount,
    pub size: Amount,
    pub price: Decimal,
    pub fee: Amount,
    pub order_type: u8,
    pub is_reduce_only: bool,
    pub expiry: i64,
    pub cancel_order_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExecutedEvent {
    pub order_id: OrderId,
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub side: Side,
    pub size: Amount,
    pub price: Price,
    pub fee: Amount,
    pub fill: FillKind,
    pub executor: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    OwnerRequested,
    /// Executor or liquidator cancelled on the owner's behalf.
    Operator,
    Expired,
    /// Companion order of one that executed or was cancelled.
    Linked,
    /// Market order that could not be filled.
    ExecutionFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: OrderId,
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub refund: Amount,
    pub reason: CancelReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionIncreasedEvent {
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub side: Side,
    pub size_delta: Amount,
    pub margin_delta: Amount,
    pub new_size: Amount,
    pub entry_price: Price,
    pub collateral: Amount,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDecreasedEvent {
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub side: Side,
    pub size_delta: Amount,
    pub new_size: Amount,
    pub collateral: Amount,
    pub price: Price,
    pub realized_pnl: Amount,
    pub payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub side: Side,
    pub size: Amount,
    pub entry_price: Price,
    pub price: Price,
    pub realized_pnl: Amount,
    pub payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub side: Side,
    pub size: Amount,
    pub entry_price: Price,
    pub price: Price,
    pub margin_ratio_bps: Decimal,
    pub realized_pnl: Amount,
    pub remaining_collateral: Amount,
    pub liquidator_reward: Amount,
    pub liquidation_fee: Amount,
    pub liquidator: AccountId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingUpdatedEvent {
    pub asset: AssetId,
    pub market: MarketId,
    pub index: Decimal,
    pub increment: Decimal,
    pub long_oi: Amount,
    pub short_oi: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPauseChangedEvent {
    pub market: MarketId,
    pub paused: bool,
    pub by: AccountId,
}
