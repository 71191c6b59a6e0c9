//! Orders and the pending-order book.
//!
//! An order escrows margin + fee at submission and waits for a trusted executor.
//! Market orders are eligible at once; limit and stop orders wait for their
//! trigger. Orders are immutable once created; only their status moves.

use crate::types::{AccountId, Amount, AssetId, Bps, MarketId, OrderId, Price, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Order type. Wire encoding is 0 / 1 / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

impl OrderKind {
    pub fn code(&self) -> u8 {
        match self {
            OrderKind::Market => 0,
            OrderKind::Limit => 1,
            OrderKind::Stop => 2,
        }
    }
}

impl TryFrom<u8> for OrderKind {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OrderKind::Market),
            1 => Ok(OrderKind::Limit),
            2 => Ok(OrderKind::Stop),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// Submission parameters as they arrive from outside. zero means "none" for
/// price, expiry and cancel_order_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market: String,
    pub asset: String,
    pub is_long: bool,
    pub margin: Decimal,
    pub size: Decimal,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub order_type: u8,
    #[serde(default)]
    pub is_reduce_only: bool,
    /// Unix seconds.
    #[serde(default)]
    pub expiry: i64,
    #[serde(default)]
    pub cancel_order_id: u64,
}

impl OrderRequest {
    pub fn market(market: &str, asset: &str, is_long: bool, margin: Decimal, size: Decimal) -> Self {
        Self {
            market: market.to_string(),
            asset: asset.to_string(),
            is_long,
            margin,
            size,
            price: Decimal::ZERO,
            order_type: OrderKind::Market.code(),
            is_reduce_only: false,
            expiry: 0,
            cancel_order_id: 0,
        }
    }

    pub fn limit(mut self, price: Decimal) -> Self {
        self.price = price;
        self.order_type = OrderKind::Limit.code();
        self
    }

    pub fn stop(mut self, price: Decimal) -> Self {
        self.price = price;
        self.order_type = OrderKind::Stop.code();
        self
    }

    /// Closing order: no margin, fee only.
    pub fn reduce_only(mut self) -> Self {
        self.is_reduce_only = true;
        self.margin = Decimal::ZERO;
        self
    }

    pub fn expiring_at(mut self, unix_secs: i64) -> Self {
        self.expiry = unix_secs;
        self
    }

    pub fn linked_to(mut self, order_id: OrderId) -> Self {
        self.cancel_order_id = order_id.0;
        self
    }

    pub fn side(&self) -> Side {
        Side::from_is_long(self.is_long)
    }

    pub fn trigger_price(&self) -> Option<Price> {
        Price::new(self.price)
    }

    pub fn expiry(&self) -> Option<Timestamp> {
        (self.expiry > 0).then(|| Timestamp::from_secs(self.expiry))
    }

    pub fn cancel_order_id(&self) -> Option<OrderId> {
        (self.cancel_order_id > 0).then_some(OrderId(self.cancel_order_id))
    }
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub side: Side,
    pub margin: Amount,
    pub size: Amount,
    /// `None` for market orders.
    pub price: Option<Price>,
    pub kind: OrderKind,
    pub reduce_only: bool,
    pub expiry: Option<Timestamp>,
    pub cancel_order_id: Option<OrderId>,
    pub fee: Amount,
    pub created_at: Timestamp,
}

impl Order {
    /// What the owner has locked up for this order.
    pub fn escrow(&self) -> Amount {
        required_escrow(self.margin, self.fee, self.reduce_only)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry.map(|expiry| now > expiry).unwrap_or(false)
    }

    pub fn is_buy(&self) -> bool {
        self.side.is_long()
    }
}

/// `floor(size * fee_bps / 10000)`
pub fn compute_fee(size: Amount, fee_bps: Bps) -> Amount {
    size.bps_of(fee_bps)
}

pub fn required_escrow(margin: Amount, fee: Amount, reduce_only: bool) -> Amount {
    if reduce_only {
        fee
    } else {
        margin.add(fee)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    order: Order,
    status: OrderStatus,
}

/// Every order ever issued, with its status. ids start at 1 and never repeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Entry>,
    next_id: u64,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            orders: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The id the next `insert` will use.
    pub fn peek_id(&self) -> OrderId {
        OrderId(self.next_id)
    }

    pub fn insert(&mut self, order: Order) {
        debug_assert_eq!(order.id, self.peek_id());
        self.next_id = order.id.0 + 1;
        self.orders.insert(
            order.id,
            Entry {
                order,
                status: OrderStatus::Pending,
            },
        );
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id).map(|entry| &entry.order)
    }

    pub fn status(&self, id: OrderId) -> Option<OrderStatus> {
        self.orders.get(&id).map(|entry| entry.status)
    }

    /// The order if it is still pending.
    pub fn pending(&self, id: OrderId) -> Option<&Order> {
        self.orders
            .get(&id)
            .filter(|entry| entry.status == OrderStatus::Pending)
            .map(|entry| &entry.order)
    }

    /// Moves a pending order to a terminal status. returns false if it was not pending.
    pub fn finalize(&mut self, id: OrderId, status: OrderStatus) -> bool {
        debug_assert!(status.is_terminal());
        match self.orders.get_mut(&id) {
            Some(entry) if entry.status == OrderStatus::Pending => {
                entry.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(|entry| entry.status == OrderStatus::Pending)
            .map(|entry| &entry.order)
    }

    pub fn orders_of(&self, owner: &AccountId) -> impl Iterator<Item = (&Order, OrderStatus)> + '_ {
        let owner = owner.clone();
        self.orders
            .values()
            .filter(move |entry| entry.order.owner == owner)
            .map(|entry| (&entry.order, entry.status))
    }

    /// Pending orders whose expiry has passed.
    pub fn expired_ids(&self, now: Timestamp) -> Vec<OrderId> {
        self.pending_orders()
            .filter(|order| order.is_expired(now))
            .map(|order| order.id)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_orders().count()
    }

    /// Total escrow still held for pending orders on `asset`.
    pub fn escrowed(&self, asset: &AssetId) -> Amount {
        self.pending_orders()
            .filter(|order| &order.asset == asset)
            .map(|order| order.escrow())
            .sum()
    }
}
