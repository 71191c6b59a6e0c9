// 9.2 custody.rs: MOCKED. in-memory balances standing in for token transfers.
// wallets, custody, the liquidity pool and the fee sink, per asset.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::settlement::{Bucket, SettlementBatch, SettlementError, SettlementGateway};
use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, Default)]
pub struct Vault {
    balances: HashMap<Bucket, Decimal>,
    // every batch applied, in order
    history: Vec<SettlementBatch>,
    // test hook: refuse the next batch as if the transfer reverted
    reject_next: bool,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund_wallet(&mut self, account: &AccountId, asset: &AssetId, amount: Amount) {
        *self
            .balances
            .entry(Bucket::Wallet(account.clone(), asset.clone()))
            .or_insert(Decimal::ZERO) += amount.value();
    }

    /// LP capital the pool pays profits from.
    pub fn seed_pool(&mut self, asset: &AssetId, amount: Amount) {
        *self.balances.entry(Bucket::Pool(asset.clone())).or_insert(Decimal::ZERO) += amount.value();
    }

    pub fn reject_next(&mut self) {
        self.reject_next = true;
    }

    pub fn balance(&self, bucket: &Bucket) -> Amount {
        Amount::new(self.balances.get(bucket).copied().unwrap_or(Decimal::ZERO))
    }

    pub fn wallet(&self, account: &AccountId, asset: &AssetId) -> Amount {
        self.balance(&Bucket::Wallet(account.clone(), asset.clone()))
    }

    pub fn custody(&self, asset: &AssetId) -> Amount {
        self.balance(&Bucket::Custody(asset.clone()))
    }

    pub fn pool(&self, asset: &AssetId) -> Amount {
        self.balance(&Bucket::Pool(asset.clone()))
    }

    pub fn fees(&self, asset: &AssetId) -> Amount {
        self.balance(&Bucket::Fees(asset.clone()))
    }

    /// Sum over every bucket holding `asset`. settlement only moves value, so this never changes.
    pub fn total(&self, asset: &AssetId) -> Amount {
        let total = self
            .balances
            .iter()
            .filter(|(bucket, _)| bucket_asset(bucket) == asset)
            .map(|(_, balance)| *balance)
            .sum();
        Amount::new(total)
    }

    pub fn history(&self) -> &[SettlementBatch] {
        &self.history
    }

    // Checks every resulting balance before anything is written.
    fn validate(&self, batch: &SettlementBatch) -> Result<Vec<(Bucket, Decimal)>, SettlementError> {
        if let Some(negative) = batch.instructions.iter().find(|i| i.amount().is_negative()) {
            return Err(SettlementError::NegativeAmount(negative.amount()));
        }

        let mut updates = Vec::new();
        for (bucket, delta) in batch.net_flows() {
            let available = self.balances.get(&bucket).copied().unwrap_or(Decimal::ZERO);
            let next = available + delta;
            if next < Decimal::ZERO {
                return Err(SettlementError::InsufficientFunds {
                    bucket: describe(&bucket),
                    required: -delta,
                    available,
                });
            }
            updates.push((bucket, next));
        }
        Ok(updates)
    }
}

impl SettlementGateway for Vault {
    fn settle(&mut self, batch: &SettlementBatch) -> Result<(), SettlementError> {
        if self.reject_next {
            self.reject_next = false;
            return Err(SettlementError::InsufficientFunds {
                bucket: "rejected".to_string(),
                required: Decimal::ZERO,
                available: Decimal::ZERO,
            });
        }

        let updates = self.validate(batch)?;
        for (bucket, next) in updates {
            self.balances.insert(bucket, next);
        }
        if !batch.is_empty() {
            self.history.push(batch.clone());
        }
        Ok(())
    }
}

fn bucket_asset(bucket: &Bucket) -> &AssetId {
    match bucket {
        Bucket::Wallet(_, asset) | Bucket::Custody(asset) | Bucket::Pool(asset) | Bucket::Fees(asset) => asset,
    }
}

fn describe(bucket: &Bucket) -> String {
    match bucket {
        Bucket::Wallet(account, asset) => format!("wallet {account}/{asset}"),
        Bucket::Custody(asset) => format!("custody {asset}"),
        Bucket::Pool(asset) => format!("pool {asset}"),
        Bucket::Fees(asset) => format!("fees {asset}"),
    }
}
