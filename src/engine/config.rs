//! Processor configuration options.

use crate::config::ProtocolConfig;
use crate::liquidation::LiquidationParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Log every emitted event at info level instead of debug.
    pub verbose: bool,
    pub liquidation: LiquidationParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
            liquidation: LiquidationParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_protocol(protocol: &ProtocolConfig) -> Self {
        Self {
            liquidation: protocol.liquidation.clone(),
            ..Self::default()
        }
    }
}
