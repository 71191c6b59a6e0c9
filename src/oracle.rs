// Price Oracle
//
// The processor is agnostic to where reference prices come from (Chainlink,
// Pyth, a CEX aggregator). It only needs the current price per market plus a
// staleness flag, which it uses as the reference for the deviation check.

use crate::types::{MarketId, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A reference price with its staleness flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleQuote {
    pub price: Price,
    pub is_stale: bool,
}

impl OracleQuote {
    pub fn fresh(price: Price) -> Self {
        Self { price, is_stale: false }
    }

    /// The price when it can be relied on.
    pub fn usable(&self) -> Option<Price> {
        (!self.is_stale).then_some(self.price)
    }
}

pub trait PriceOracle {
    /// `None` means the feed is missing entirely.
    fn get_price(&self, market: &MarketId) -> Option<OracleQuote>;
}

/// In-memory oracle. a price goes stale once it is older than `max_age_ms`
/// relative to the clock passed to `set_clock`.
#[derive(Debug, Clone)]
pub struct MockOracle {
    prices: HashMap<MarketId, (Price, Timestamp)>,
    forced_stale: HashMap<MarketId, bool>,
    clock: Timestamp,
    max_age_ms: i64,
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            forced_stale: HashMap::new(),
            clock: Timestamp::from_millis(0),
            max_age_ms: i64::MAX,
        }
    }

    pub fn with_max_age(mut self, max_age_ms: i64) -> Self {
        self.max_age_ms = max_age_ms;
        self
    }

    pub fn set_price(&mut self, market: &MarketId, price: Price) {
        self.prices.insert(market.clone(), (price, self.clock));
        self.forced_stale.remove(market);
    }

    pub fn set_stale(&mut self, market: &MarketId, stale: bool) {
        self.forced_stale.insert(market.clone(), stale);
    }

    pub fn remove(&mut self, market: &MarketId) {
        self.prices.remove(market);
    }

    pub fn set_clock(&mut self, now: Timestamp) {
        self.clock = now;
    }
}

impl PriceOracle for MockOracle {
    fn get_price(&self, market: &MarketId) -> Option<OracleQuote> {
        let (price, updated_at) = self.prices.get(market)?;
        let too_old = self.clock.as_millis().saturating_sub(updated_at.as_millis()) > self.max_age_ms;
        let forced = self.forced_stale.get(market).copied().unwrap_or(false);
        Some(OracleQuote {
            price: *price,
            is_stale: too_old || forced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_feed_is_none() {
        let oracle = MockOracle::new();
        assert!(oracle.get_price(&MarketId::new("ETH-USD")).is_none());
    }

    #[test]
    fn price_goes_stale_with_age() {
        let eth = MarketId::new("ETH-USD");
        let mut oracle = MockOracle::new().with_max_age(60_000);
        oracle.set_price(&eth, Price::new_unchecked(dec!(1500)));

        assert!(oracle.get_price(&eth).unwrap().usable().is_some());

        oracle.set_clock(Timestamp::from_millis(61_000));
        let quote = oracle.get_price(&eth).unwrap();
        assert!(quote.is_stale);
        assert!(quote.usable().is_none());
    }

    #[test]
    fn forced_stale_clears_on_update() {
        let eth = MarketId::new("ETH-USD");
        let mut oracle = MockOracle::new();
        oracle.set_price(&eth, Price::new_unchecked(dec!(1500)));
        oracle.set_stale(&eth, true);
        assert!(oracle.get_price(&eth).unwrap().is_stale);

        oracle.set_price(&eth, Price::new_unchecked(dec!(1501)));
        assert!(!oracle.get_price(&eth).unwrap().is_stale);
    }
}
