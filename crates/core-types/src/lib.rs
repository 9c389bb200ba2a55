pub mod enums;
pub mod error;
pub mod structs;
pub mod symbol;

// Re-export the core types to provide a clean public API.
pub use enums::{ExitReason, PositionSide};
pub use error::CoreError;
pub use structs::{Bar, Position, Signal, TradeStats};
pub use symbol::{base_code, is_option, split_symbol};
