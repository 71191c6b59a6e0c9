// 8.0 engine/core.rs: the processor. owns every collaborator plus the order book,
// position ledger and funding tracker. all mutation funnels through `commit`.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::events::{Event, EventId, EventPayload};
use crate::funding::{FundingState, FundingTracker};
use crate::market::{AssetConfig, MarketConfig};
use crate::oracle::PriceOracle;
use crate::order::{Order, OrderBook, OrderStatus};
use crate::position::{Position, PositionKey, PositionLedger};
use crate::roles::{Role, RoleRegistry};
use crate::settlement::{SettlementBatch, SettlementGateway};
use crate::types::{AccountId, Amount, AssetId, MarketId, OrderId, Side, Timestamp};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Proof that the caller passed the capability check for one operation.
/// Only the processor can create one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    caller: AccountId,
    role: Option<Role>,
}

impl ExecutionContext {
    pub fn caller(&self) -> &AccountId {
        &self.caller
    }

    /// `None` when the caller acts on their own orders.
    pub fn role(&self) -> Option<Role> {
        self.role
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OiChange {
    Increase,
    Decrease,
}

/// Everything one operation will change, planned up front and applied in one go.
#[derive(Debug, Default)]
pub(super) struct Transition {
    pub batch: SettlementBatch,
    pub new_order: Option<Order>,
    pub statuses: Vec<(OrderId, OrderStatus)>,
    pub positions: Vec<(PositionKey, Option<Position>)>,
    pub open_interest: Vec<(AssetId, MarketId, Side, Amount, OiChange)>,
    pub funding: Vec<(AssetId, MarketId, FundingState)>,
    pub pause: Option<(MarketId, bool)>,
    pub events: Vec<EventPayload>,
}

/** 8.1: main processor struct. all state lives here */
#[derive(Debug)]
pub struct Processor<M, A, O, R, S> {
    pub(super) config: EngineConfig,
    pub(super) markets: M,
    pub(super) assets: A,
    pub(super) oracle: O,
    pub(super) roles: R,
    pub(super) gateway: S,
    pub(super) book: OrderBook,
    pub(super) ledger: PositionLedger,
    pub(super) funding: FundingTracker,
    pub(super) paused: HashSet<MarketId>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    pub(super) version: u64,
}

/// Wires a processor. `build` only exists once every collaborator is set.
#[derive(Debug)]
pub struct ProcessorBuilder<M, A, O, R, S> {
    markets: M,
    assets: A,
    oracle: O,
    roles: R,
    gateway: S,
    config: EngineConfig,
    start: Timestamp,
}

impl Default for ProcessorBuilder<(), (), (), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorBuilder<(), (), (), (), ()> {
    pub fn new() -> Self {
        Self {
            markets: (),
            assets: (),
            oracle: (),
            roles: (),
            gateway: (),
            config: EngineConfig::default(),
            start: Timestamp::from_millis(0),
        }
    }
}

impl<M, A, O, R, S> ProcessorBuilder<M, A, O, R, S> {
    pub fn markets<M2: MarketConfig>(self, markets: M2) -> ProcessorBuilder<M2, A, O, R, S> {
        ProcessorBuilder {
            markets,
            assets: self.assets,
            oracle: self.oracle,
            roles: self.roles,
            gateway: self.gateway,
            config: self.config,
            start: self.start,
        }
    }

    pub fn assets<A2: AssetConfig>(self, assets: A2) -> ProcessorBuilder<M, A2, O, R, S> {
        ProcessorBuilder {
            markets: self.markets,
            assets,
            oracle: self.oracle,
            roles: self.roles,
            gateway: self.gateway,
            config: self.config,
            start: self.start,
        }
    }

    pub fn oracle<O2: PriceOracle>(self, oracle: O2) -> ProcessorBuilder<M, A, O2, R, S> {
        ProcessorBuilder {
            markets: self.markets,
            assets: self.assets,
            oracle,
            roles: self.roles,
            gateway: self.gateway,
            config: self.config,
            start: self.start,
        }
    }

    pub fn roles<R2: RoleRegistry>(self, roles: R2) -> ProcessorBuilder<M, A, O, R2, S> {
        ProcessorBuilder {
            markets: self.markets,
            assets: self.assets,
            oracle: self.oracle,
            roles,
            gateway: self.gateway,
            config: self.config,
            start: self.start,
        }
    }

    pub fn settlement<S2: SettlementGateway>(self, gateway: S2) -> ProcessorBuilder<M, A, O, R, S2> {
        ProcessorBuilder {
            markets: self.markets,
            assets: self.assets,
            oracle: self.oracle,
            roles: self.roles,
            gateway,
            config: self.config,
            start: self.start,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn starting_at(mut self, start: Timestamp) -> Self {
        self.start = start;
        self
    }
}

impl<M, A, O, R, S> ProcessorBuilder<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    pub fn build(self) -> Processor<M, A, O, R, S> {
        Processor {
            config: self.config,
            markets: self.markets,
            assets: self.assets,
            oracle: self.oracle,
            roles: self.roles,
            gateway: self.gateway,
            book: OrderBook::new(),
            ledger: PositionLedger::new(),
            funding: FundingTracker::new(),
            paused: HashSet::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_time: self.start,
            version: 0,
        }
    }
}

impl<M, A, O, R, S> Processor<M, A, O, R, S>
where
    M: MarketConfig,
    A: AssetConfig,
    O: PriceOracle,
    R: RoleRegistry,
    S: SettlementGateway,
{
    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis().saturating_add(millis));
    }

    /// Moves the clock to wall time.
    pub fn sync_clock(&mut self) {
        self.current_time = Timestamp::now();
    }

    /// Bumped by exactly one per committed transition.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_paused(&self, market: &MarketId) -> bool {
        self.paused.contains(market)
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn settlement(&self) -> &S {
        &self.gateway
    }

    pub fn settlement_mut(&mut self) -> &mut S {
        &mut self.gateway
    }

    pub fn market_config(&self) -> &M {
        &self.markets
    }

    /// The owned market store, for operators flipping `is_closed` / `is_reduce_only`.
    pub fn market_config_mut(&mut self) -> &mut M {
        &mut self.markets
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // 8.2: the single capability check. every privileged path goes through here.
    pub(super) fn authorize(&self, caller: &AccountId, allowed: &[Role]) -> Result<ExecutionContext, EngineError> {
        match allowed.iter().find(|role| self.roles.has_role(caller, **role)) {
            Some(role) => Ok(ExecutionContext {
                caller: caller.clone(),
                role: Some(*role),
            }),
            None => {
                warn!(caller = %caller, ?allowed, "unauthorized call");
                Err(EngineError::Unauthorized(caller.clone()))
            }
        }
    }

    /// Context for someone acting on their own behalf.
    pub(super) fn as_owner(&self, caller: &AccountId) -> ExecutionContext {
        ExecutionContext {
            caller: caller.clone(),
            role: None,
        }
    }

    // 8.3: settle first. if the gateway refuses, nothing below runs and no state moves.
    pub(super) fn commit(&mut self, ctx: &ExecutionContext, transition: Transition) -> Result<(), EngineError> {
        if let Err(err) = self.gateway.settle(&transition.batch) {
            warn!(caller = %ctx.caller(), error = %err, "settlement refused, transition dropped");
            return Err(err.into());
        }

        let Transition {
            batch,
            new_order,
            statuses,
            positions,
            open_interest,
            funding,
            pause,
            events,
        } = transition;

        for (asset, market, state) in funding {
            self.funding.commit(&asset, &market, state);
        }
        if let Some(order) = new_order {
            self.book.insert(order);
        }
        for (id, status) in statuses {
            self.book.finalize(id, status);
        }
        for (key, position) in positions {
            self.ledger.store(&key, position);
        }
        for (asset, market, side, size, change) in open_interest {
            match change {
                OiChange::Increase => self.ledger.increase_oi(&asset, &market, side, size),
                OiChange::Decrease => self.ledger.decrease_oi(&asset, &market, side, size),
            }
        }
        if let Some((market, paused)) = pause {
            if paused {
                self.paused.insert(market);
            } else {
                self.paused.remove(&market);
            }
        }

        self.version += 1;
        debug!(
            caller = %ctx.caller(),
            version = self.version,
            transfers = batch.len(),
            "transition committed"
        );

        for payload in events {
            self.emit_event(payload);
        }
        Ok(())
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            info!(event_id = event.id.0, kind = event.payload.name(), payload = ?event.payload, "event");
        } else {
            debug!(event_id = event.id.0, kind = event.payload.name(), "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
