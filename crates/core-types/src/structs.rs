use crate::enums::{ExitReason, PositionSide};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar of one concrete contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub datetime: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

// The `ta` crate works on `f64`; these impls let its indicators consume bars directly.
impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high.to_f64().unwrap_or(f64::NAN)
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low.to_f64().unwrap_or(f64::NAN)
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close.to_f64().unwrap_or(f64::NAN)
    }
}

/// The trade intents derived from one bar window.
///
/// A fixed-shape value: recomputed on every bar update and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Distance from the entry price to the stop-loss price.
    pub stop_loss_offset: Decimal,
    /// Distance from the entry price to the take-profit price.
    pub take_profit_offset: Decimal,
    pub long_open: bool,
    pub short_open: bool,
    pub long_exit: bool,
    pub short_exit: bool,
    /// The ATR reading the offsets were derived from, reused by position sizing.
    pub atr: Decimal,
}

impl Signal {
    /// A signal that asks for nothing.
    pub fn neutral() -> Self {
        Self {
            stop_loss_offset: Decimal::ZERO,
            take_profit_offset: Decimal::ZERO,
            long_open: false,
            short_open: false,
            long_exit: false,
            short_exit: false,
            atr: Decimal::ZERO,
        }
    }
}

/// The per-instrument position record.
///
/// While `side` is `Flat` the price fields hold whatever the last trade left behind
/// and must not be read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    /// The concrete contract the position task is bound to, if resolved yet.
    pub resolved_contract_id: Option<String>,
}

/// Trade counters for one instrument. Only ever incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: u64,
    pub stop_loss_hits: u64,
    pub take_profit_hits: u64,
    pub signal_exits: u64,
}

impl TradeStats {
    pub fn record_entry(&mut self) {
        self.total_trades += 1;
    }

    pub fn record_exit(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::StopLoss => self.stop_loss_hits += 1,
            ExitReason::TakeProfit => self.take_profit_hits += 1,
            ExitReason::Signal => self.signal_exits += 1,
        }
    }
}
