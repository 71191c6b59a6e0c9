//! Role registry.
//!
//! Permission lookups happen once, in the processor, before any operation is
//! dispatched. Components below it receive an already authorized context.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Trusted executor: fills orders at a presented price, pokes funding, pauses markets.
    Executor,
    /// May liquidate positions and cancel orders on behalf of their owners.
    Liquidator,
}

pub trait RoleRegistry {
    fn has_role(&self, account: &AccountId, role: Role) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    grants: HashMap<AccountId, HashSet<Role>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, account: AccountId, role: Role) -> Self {
        self.grants.entry(account).or_default().insert(role);
        self
    }

    pub fn revoke(&mut self, account: &AccountId, role: Role) {
        if let Some(roles) = self.grants.get_mut(account) {
            roles.remove(&role);
        }
    }
}

impl RoleRegistry for RoleTable {
    fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.grants
            .get(account)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}
