//! # Trading Engine
//!
//! The update-and-react loop. Each `wait_update` round hands the changed contracts to every
//! `InstrumentTrader`. A trader re-evaluates its refreshed bar window through the strategy,
//! advances its `PositionMachine`, sizes and sends orders, and keeps itself on the main
//! contract.
//!
//! `Runner` owns the traders, watches the cancellation token and reopens faulted sessions.

pub mod error;
pub mod position;
pub mod report;
pub mod roll;
pub mod runner;
pub mod trader;

pub use error::EngineError;
pub use position::{PositionMachine, Transition};
pub use report::{InstrumentReport, SessionEnd, SessionReport};
pub use roll::{ContractRoller, RollCadence};
pub use runner::{Runner, RunnerSettings};
pub use trader::{FeedSettings, InstrumentTrader};
