// 8.0: the processor. validates and stores orders, executes them for trusted
// callers, keeps positions, funding and open interest, and liquidates.
// every operation plans a transition, settles it, then commits it in one step.

mod config;
mod core;
mod execution;
mod funding;
mod liquidations;
mod markets;
mod orders;
mod positions;
mod results;
mod shared;

pub use config::EngineConfig;
pub use core::{ExecutionContext, Processor, ProcessorBuilder};
pub use results::{EngineError, ExecutionResult, LiquidationResult};
pub use shared::SharedProcessor;
