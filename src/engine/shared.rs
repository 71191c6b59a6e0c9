//! Thread-safe handle. one lock around the whole processor keeps it single-writer.

use super::core::Processor;
use super::results::{EngineError, ExecutionResult, LiquidationResult};
use crate::market::{AssetConfig, MarketConfig};
use crate::oracle::PriceOracle;
use crate::order::OrderRequest;
use crate::roles::RoleRegistry;
use crate::settlement::SettlementGateway;
use crate::types::{AccountId, Amount, AssetId, MarketId, OrderId, Price};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

#[derive(Debug)]
pub struct SharedProcessor<M, A, O, R, S> {
    inner: Arc<Mutex<Processor<M, A, O, R, S>>>,
}

impl<M, A, O, R, S> Clone for SharedProcessor<M, A, O, R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M, A, O, R, S> SharedProcessor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    pub fn new(processor: Processor<M, A, O, R, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(processor)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Processor<M, A, O, R, S>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("recovered from poisoned processor lock");
                poisoned.into_inner()
            }
        }
    }

    /// Run `f` with exclusive access.
    pub fn with<T>(&self, f: impl FnOnce(&mut Processor<M, A, O, R, S>) -> T) -> T {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    pub fn submit(&self, owner: &AccountId, request: OrderRequest, value: Amount) -> Result<OrderId, EngineError> {
        self.lock().submit(owner, request, value)
    }

    pub fn cancel(&self, order_id: OrderId, caller: &AccountId) -> Result<Amount, EngineError> {
        self.lock().cancel(order_id, caller)
    }

    pub fn execute(&self, order_id: OrderId, price: Price, caller: &AccountId) -> Result<ExecutionResult, EngineError> {
        self.lock().execute(order_id, price, caller)
    }

    pub fn liquidate(
        &self,
        owner: &AccountId,
        market: &MarketId,
        asset: &AssetId,
        price: Price,
        caller: &AccountId,
    ) -> Result<LiquidationResult, EngineError> {
        self.lock().liquidate(owner, market, asset, price, caller)
    }

    pub fn version(&self) -> u64 {
        self.lock().version()
    }

    /// The processor back, if this is the last handle.
    pub fn into_inner(self) -> Option<Processor<M, A, O, R, S>> {
        let mutex = Arc::try_unwrap(self.inner).ok()?;
        Some(match mutex.into_inner() {
            Ok(processor) => processor,
            Err(poisoned) => poisoned.into_inner(),
        })
    }
}
