// 9.1 settlement.rs: the gateway between the processor and pooled collateral.
// every operation builds one batch; the gateway applies it all-or-nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{AccountId, Amount, AssetId};

// Types of money movement the processor can request.
// custody = escrow + position collateral held on behalf of traders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementInstruction {
    // trader wallet -> custody (order escrow)
    Escrow {
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    },

    // custody -> trader wallet (refunds, released collateral)
    Release {
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    },

    // pool -> custody, credited to the trader's position
    Credit {
        account: AccountId,
        asset: AssetId,
        amount: Amount,
        reason: TransferReason,
    },

    // custody -> pool, debited from the trader's position
    Debit {
        account: AccountId,
        asset: AssetId,
        amount: Amount,
        reason: TransferReason,
    },

    // custody -> fee sink
    Fee {
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    },

    // custody -> liquidator wallet
    Reward {
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    },
}

// Why pool money is moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    Pnl,
    Funding,
    Liquidation,
}

/// Where a unit of an asset sits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    Wallet(AccountId, AssetId),
    Custody(AssetId),
    Pool(AssetId),
    Fees(AssetId),
}

impl SettlementInstruction {
    pub fn amount(&self) -> Amount {
        match self {
            Self::Escrow { amount, .. }
            | Self::Release { amount, .. }
            | Self::Credit { amount, .. }
            | Self::Debit { amount, .. }
            | Self::Fee { amount, .. }
            | Self::Reward { amount, .. } => *amount,
        }
    }

    // (from, to)
    pub fn route(&self) -> (Bucket, Bucket) {
        match self {
            Self::Escrow { account, asset, .. } => {
                (Bucket::Wallet(account.clone(), asset.clone()), Bucket::Custody(asset.clone()))
            }
            Self::Release { account, asset, .. } | Self::Reward { account, asset, .. } => {
                (Bucket::Custody(asset.clone()), Bucket::Wallet(account.clone(), asset.clone()))
            }
            Self::Credit { asset, .. } => (Bucket::Pool(asset.clone()), Bucket::Custody(asset.clone())),
            Self::Debit { asset, .. } => (Bucket::Custody(asset.clone()), Bucket::Pool(asset.clone())),
            Self::Fee { asset, .. } => (Bucket::Custody(asset.clone()), Bucket::Fees(asset.clone())),
        }
    }
}

// A batch of instructions executed atomically
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub instructions: Vec<SettlementInstruction>,
}

impl SettlementBatch {
    pub fn new() -> Self {
        Self::default()
    }

    // zero amounts are dropped, they would only add noise to the audit trail
    pub fn add(&mut self, instruction: SettlementInstruction) {
        if !instruction.amount().is_zero() {
            self.instructions.push(instruction);
        }
    }

    pub fn extend(&mut self, other: SettlementBatch) {
        self.instructions.extend(other.instructions);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    // Net change per bucket
    pub fn net_flows(&self) -> HashMap<Bucket, Decimal> {
        let mut flows = HashMap::new();
        for instruction in &self.instructions {
            let amount = instruction.amount().value();
            let (from, to) = instruction.route();
            *flows.entry(from).or_insert(Decimal::ZERO) -= amount;
            *flows.entry(to).or_insert(Decimal::ZERO) += amount;
        }
        flows
    }

    /// Total paid into trader or liquidator wallets for `asset`.
    pub fn paid_to(&self, account: &AccountId, asset: &AssetId) -> Amount {
        self.net_flows()
            .get(&Bucket::Wallet(account.clone(), asset.clone()))
            .copied()
            .map(Amount::new)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("negative amount in settlement instruction: {0}")]
    NegativeAmount(Amount),

    #[error("insufficient funds in {bucket}: required {required}, available {available}")]
    InsufficientFunds {
        bucket: String,
        required: Decimal,
        available: Decimal,
    },
}

/// Moves collateral between traders, custody, the liquidity pool and fee sinks.
pub trait SettlementGateway {
    /// Apply every instruction or none of them.
    fn settle(&mut self, batch: &SettlementBatch) -> Result<(), SettlementError>;
}
