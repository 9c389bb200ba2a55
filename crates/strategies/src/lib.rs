//! # Strategy Library
//!
//! This crate contains the signal-generation logic. It defines a universal `Strategy`
//! trait and the Williams %R trend strategy that every traded instrument runs.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No knowledge of the feed, the account or order routing. A strategy
//!   reads a bar window and answers with a `Signal` or with nothing.
//! - **Stateless Evaluation:** Indicators are rebuilt from the window on every call, so a
//!   contract roll that swaps the window needs no reset step.
//!
//! ## Public API
//!
//! - `Strategy`: The trait the engine evaluates.
//! - `WrTrend`: The MA / Williams %R / ADX trend strategy.
//! - `indicators`: `WilliamsR`, `AverageDirectionalIndex` and the Wilder-smoothed
//!   `WilderAverageTrueRange`, which `ta` does not ship.

pub mod error;
pub mod indicators;
pub mod wr_trend;

pub use error::StrategyError;
pub use indicators::{AverageDirectionalIndex, WilderAverageTrueRange, WilliamsR};
pub use wr_trend::WrTrend;

use core_types::{Bar, Signal};

/// The core trait that signal generators implement.
///
/// The `Send + Sync` bounds let the engine hold strategies inside spawned tasks.
pub trait Strategy: Send + Sync {
    /// Evaluates the strategy over the latest bar window (oldest bar first).
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Signal))` - the indicator readings for the last bar.
    /// * `Ok(None)` - the window is too short or the readings are not usable.
    /// * `Err(StrategyError)` - an indicator could not be computed.
    fn evaluate(&self, bars: &[Bar]) -> Result<Option<Signal>, StrategyError>;

    /// The smallest window `evaluate` will compute on.
    fn required_bars(&self) -> usize;
}
