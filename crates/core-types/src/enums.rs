use serde::{Deserialize, Serialize};
use std::fmt;

/// The side of a per-instrument position. At most one of `Long`/`Short` holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionSide {
    /// Returns the sign applied to a lot count when targeting this side.
    pub fn direction(&self) -> i64 {
        match self {
            PositionSide::Flat => 0,
            PositionSide::Long => 1,
            PositionSide::Short => -1,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionSide::Flat)
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionSide::Flat => "flat",
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        };
        f.write_str(s)
    }
}

/// Why an open position was flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop-loss",
            ExitReason::TakeProfit => "take-profit",
            ExitReason::Signal => "exit-signal",
        };
        f.write_str(s)
    }
}
