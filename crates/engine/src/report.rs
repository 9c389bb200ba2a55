use core_types::{PositionSide, TradeStats};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionEnd {
    /// The replayed feed ran out of data.
    Finished,
    /// The cancellation token fired.
    Cancelled,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Finished => f.write_str("finished"),
            SessionEnd::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentReport {
    /// The configured base symbol.
    pub symbol: String,
    /// The contract the instrument was bound to when the report was taken.
    pub contract: Option<String>,
    pub side: PositionSide,
    pub stats: TradeStats,
}

/// The end-of-run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub end: SessionEnd,
    /// The balance when the first session started.
    pub starting_balance: Option<Decimal>,
    /// `None` when the balance could not be read before the session closed.
    pub final_balance: Option<Decimal>,
    /// Wall time since the runner was built.
    pub elapsed: Duration,
    pub instruments: Vec<InstrumentReport>,
}

impl SessionReport {
    /// Emits the report as structured `info` events.
    pub fn log(&self) {
        tracing::info!(
            end = %self.end,
            final_balance = ?self.final_balance,
            profit = ?self.profit(),
            elapsed_secs = self.elapsed.as_secs_f64(),
            instruments = self.instruments.len(),
            "Session report"
        );
        for instrument in &self.instruments {
            tracing::info!(
                symbol = %instrument.symbol,
                contract = instrument.contract.as_deref().unwrap_or("-"),
                side = %instrument.side,
                total_trades = instrument.stats.total_trades,
                stop_loss_hits = instrument.stats.stop_loss_hits,
                take_profit_hits = instrument.stats.take_profit_hits,
                signal_exits = instrument.stats.signal_exits,
                "Instrument summary"
            );
        }
    }

    /// Final minus starting balance, when both were read.
    pub fn profit(&self) -> Option<Decimal> {
        Some(self.final_balance? - self.starting_balance?)
    }

    pub fn total_trades(&self) -> u64 {
        self.instruments.iter().map(|i| i.stats.total_trades).sum()
    }
}
