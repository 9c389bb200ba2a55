//! # Position Sizing
//!
//! Turns a risk budget into a lot count. The engine asks a `PositionSizer` for the size
//! of every entry; it never sizes a trade itself.

pub mod error;
pub mod instruments;
pub mod sizing;

pub use error::RiskError;
pub use instruments::InstrumentTable;
pub use sizing::{FixedSizer, RiskBudgetSizer};

use rust_decimal::Decimal;

/// Everything a sizer may look at when an entry is about to be placed.
#[derive(Debug, Clone, Copy)]
pub struct SizingRequest<'a> {
    /// The resolved concrete contract, e.g. "CZCE.SA601".
    pub symbol: &'a str,
    pub balance: Decimal,
    pub price: Decimal,
    pub atr: Decimal,
}

/// The seam between the position state machine and the sizing policy.
pub trait PositionSizer: Send + Sync {
    /// Whether `size` reads the account balance. Fixed sizers skip the balance query.
    fn needs_balance(&self) -> bool {
        true
    }

    /// Returns the unsigned lot count for an entry.
    fn size(&self, request: &SizingRequest<'_>) -> Result<u32, RiskError>;
}
