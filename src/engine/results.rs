// 8.0.2: result types and errors for processor operations.

use crate::position::{FillKind, PositionError};
use crate::settlement::SettlementError;
use crate::types::{AccountId, Amount, AssetId, MarketId, OrderId, Price, Side};
use rust_decimal::Decimal;

/// Outcome of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub order_id: OrderId,
    pub price: Price,
    pub fill: FillKind,
    pub fee: Amount,
    pub realized_pnl: Amount,
    /// Paid back to the owner on a decrease or close.
    pub payout: Amount,
    /// Funding settled on the position before the fill. positive = trader paid.
    pub funding_owed: Amount,
    /// Linked order cancelled along with this one, if any.
    pub linked_cancelled: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationResult {
    pub owner: AccountId,
    pub market: MarketId,
    pub asset: AssetId,
    pub size: Amount,
    pub price: Price,
    pub margin_ratio_bps: Decimal,
    pub realized_pnl: Amount,
    pub remaining_collateral: Amount,
    pub liquidator_reward: Amount,
    pub liquidation_fee: Amount,
    pub bad_debt: Amount,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("market {0} not found")]
    UnknownMarket(MarketId),

    #[error("asset {0} not supported")]
    UnknownAsset(AssetId),

    #[error("market {0} is closed")]
    MarketClosed(MarketId),

    #[error("trading paused on {0}")]
    TradingPaused(MarketId),

    #[error("size {size} below minimum {minimum}")]
    BelowMinSize { size: Amount, minimum: Amount },

    #[error("leverage {leverage} outside [1, {max}]")]
    LeverageOutOfBounds { leverage: Decimal, max: Decimal },

    #[error("escrow {provided} below required {required}")]
    InsufficientEscrow { provided: Amount, required: Amount },

    #[error("invalid trigger price: {0}")]
    InvalidTriggerPrice(&'static str),

    #[error("no fresh oracle price within bounds for {0}")]
    StaleOrDeviatedPrice(MarketId),

    #[error("order {0} not pending")]
    OrderNotPending(OrderId),

    #[error("order {0} does not exist")]
    UnknownOrder(OrderId),

    #[error("order {0} has expired")]
    OrderExpired(OrderId),

    #[error("unknown order type {0}")]
    InvalidOrderType(u8),

    #[error("{side:?} open interest on {market} would reach {projected}, cap {cap}")]
    OpenInterestCapExceeded {
        market: MarketId,
        side: Side,
        projected: Amount,
        cap: Amount,
    },

    #[error("reduce-only violation: {0}")]
    ReduceOnlyViolation(&'static str),

    #[error("fill of {size} would flip a position of {open}")]
    PositionFlipRejected { size: Amount, open: Amount },

    #[error("decrease would leave the position at {ratio_bps} bps")]
    UndercollateralizedDecrease { ratio_bps: Decimal },

    #[error("position not liquidatable at {ratio_bps} bps")]
    PositionNotLiquidatable { ratio_bps: Decimal },

    #[error("no open position")]
    PositionNotFound,

    #[error("{0} is not authorized")]
    Unauthorized(AccountId),

    #[error("settlement failed: {0}")]
    Settlement(#[from] SettlementError),
}

impl From<PositionError> for EngineError {
    fn from(err: PositionError) -> Self {
        match err {
            PositionError::FlipRejected { size, open } => EngineError::PositionFlipRejected { size, open },
            PositionError::UndercollateralizedDecrease { ratio_bps, .. } => {
                EngineError::UndercollateralizedDecrease { ratio_bps }
            }
        }
    }
}
