//! # Executor Crate
//!
//! This crate provides the replay side of execution: a `ReplayApi` that implements the
//! `TradingApi` trait over recorded bars, and a `SimAccount` that tracks the account the
//! replayed orders fill against.
//!
//! ## Architectural Principles
//!
//! - **Drop-in Feed:** `ReplayApi` is driven through the same `TradingApi` trait as the live
//!   gateway client, so the engine cannot tell a replay from a live session.
//! - **State vs. Pricing Decoupling:** `SimAccount` only applies fills it is handed; picking
//!   the fill price and the clock belongs to the replay.
//!
//! ## Public API
//!
//! - `ReplayApi`: The "virtual broker" for backtesting.
//! - `SimAccount`: The in-memory state of a simulated futures account.
//! - `OrderRecord`: One accepted order, as logged by the replay.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod account;
pub mod error;
pub mod replay;

// Re-export the key components to provide a clean, public-facing API.
pub use account::{Holding, OrderRecord, SimAccount};
pub use error::ExecutorError;
pub use replay::{MainContractEntry, ReplayApi, SCHEDULE_FILE};
