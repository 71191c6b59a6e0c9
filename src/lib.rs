// synth-perps: leveraged perpetual futures on synthetic markets.
// traders escrow collateral, trusted executors fill orders against an oracle,
// positions accrue funding and get liquidated below the maintenance ratio.
// all state lives in one processor; money moves through a settlement gateway.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, AssetId, Side, Price, Amount, Bps, Timestamp
//   2.x  order.rs: orders, fee/escrow math, the pending-order book
//   2.1x conditional.rs: limit/stop trigger placement and execution rules
//   4.x  position.rs: position struct, PnL, margin ratio, open/increase/decrease, ledger
//   5.x  funding.rs: imbalance-driven funding index, settlement on touch
//   6.x  liquidation.rs: liquidation status, payout split, liquidation price
//   7.x  config.rs: protocol config, market presets, json loading
//   8.x  engine/: the processor: orders, execution, funding, liquidations
//   9.0  oracle.rs: reference price interface (mocked)
//   9.1  settlement.rs: settlement batches + gateway interface
//   9.2  custody.rs: in-memory vault behind the gateway (mocked)
//   10.x roles.rs: executor / liquidator role registry
//   11.x events.rs: state transition events for audit
//   12.x market.rs: market + asset params and their read-only stores

// core trading modules
pub mod engine;
pub mod events;
pub mod funding;
pub mod liquidation;
pub mod market;
pub mod order;
pub mod position;
pub mod types;

// trigger rules
pub mod conditional;

// integration modules
pub mod config;
pub mod custody;
pub mod oracle;
pub mod roles;
pub mod settlement;

// re exports for convenience
pub use conditional::*;
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use liquidation::*;
pub use market::*;
pub use order::*;
pub use position::*;
pub use types::*;
pub use config::{ConfigError, Environment, ProtocolConfig};
pub use custody::Vault;
pub use oracle::{MockOracle, OracleQuote, PriceOracle};
pub use roles::{Role, RoleRegistry, RoleTable};
pub use settlement::{SettlementBatch, SettlementError, SettlementGateway, SettlementInstruction, TransferReason};
