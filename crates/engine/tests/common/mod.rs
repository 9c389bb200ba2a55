#![allow(dead_code)]

use api_client::{ApiError, TradingApi, UpdateEvent};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use core_types::{Bar, Signal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strategies::{Strategy, StrategyError};

pub fn at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 4, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + ChronoDuration::minutes(minutes)
}

pub fn bar(minutes: i64, close: Decimal) -> Bar {
    Bar {
        datetime: at(minutes),
        open: close,
        high: close + dec!(1),
        low: close - dec!(1),
        close,
        volume: dec!(10),
    }
}

pub fn changed(symbols: &[&str]) -> BTreeSet<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

/// What the fake broker saw and what it will answer.
#[derive(Default)]
pub struct FakeState {
    pub windows: HashMap<String, Vec<Bar>>,
    /// Base symbol ("CZCE.SA") to current main contract.
    pub main_contracts: HashMap<String, String>,
    pub events: VecDeque<Result<UpdateEvent, ApiError>>,
    pub subscriptions: Vec<String>,
    pub orders: Vec<(String, i64)>,
    pub main_queries: usize,
    pub balance: Decimal,
    pub reject_orders: bool,
    pub closed: bool,
}

/// A scripted in-memory `TradingApi`.
///
/// `wait_update` pops the next scripted event and never returns once the script is empty,
/// like a live feed with nothing to say.
#[derive(Default)]
pub struct FakeApi {
    pub state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.state.lock().unwrap().balance = dec!(100000);
        Arc::new(api)
    }

    pub fn set_main(&self, base: &str, contract: &str) {
        self.state
            .lock()
            .unwrap()
            .main_contracts
            .insert(base.to_string(), contract.to_string());
    }

    pub fn push_bar(&self, contract: &str, bar: Bar) {
        self.state
            .lock()
            .unwrap()
            .windows
            .entry(contract.to_string())
            .or_default()
            .push(bar);
    }

    /// Rewrites the newest bar in place, like a tick on the forming bar.
    pub fn replace_last_bar(&self, contract: &str, bar: Bar) {
        let mut state = self.state.lock().unwrap();
        let window = state.windows.entry(contract.to_string()).or_default();
        window.pop();
        window.push(bar);
    }

    pub fn script(&self, event: Result<UpdateEvent, ApiError>) {
        self.state.lock().unwrap().events.push_back(event);
    }

    pub fn orders(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn main_queries(&self) -> usize {
        self.state.lock().unwrap().main_queries
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn reject_orders(&self, reject: bool) {
        self.state.lock().unwrap().reject_orders = reject;
    }
}

#[async_trait]
impl TradingApi for FakeApi {
    async fn subscribe_klines(
        &self,
        symbol: &str,
        _period_secs: u64,
        _window_len: usize,
    ) -> Result<(), ApiError> {
        self.state.lock().unwrap().subscriptions.push(symbol.to_string());
        Ok(())
    }

    async fn kline_window(&self, symbol: &str, _period_secs: u64) -> Result<Vec<Bar>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .windows
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }

    async fn wait_update(&self, _deadline: Duration) -> Result<UpdateEvent, ApiError> {
        let next = self.state.lock().unwrap().events.pop_front();
        match next {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn account_balance(&self) -> Result<Decimal, ApiError> {
        Ok(self.state.lock().unwrap().balance)
    }

    async fn query_main_contract(&self, exchange: &str, product: &str) -> Result<String, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.main_queries += 1;
        state
            .main_contracts
            .get(&format!("{}.{}", exchange, product))
            .cloned()
            .ok_or_else(|| ApiError::UnknownSymbol(format!("{}.{}", exchange, product)))
    }

    async fn set_target_volume(&self, symbol: &str, lots: i64) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_orders {
            return Err(ApiError::Rejected("risk check failed".to_string()));
        }
        state.orders.push((symbol.to_string(), lots));
        Ok(())
    }

    async fn close(&self) -> Result<(), ApiError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// A strategy that answers with whatever signal the test set last.
pub struct ScriptedStrategy {
    signal: Mutex<Option<Signal>>,
}

impl ScriptedStrategy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signal: Mutex::new(None),
        })
    }

    pub fn set(&self, signal: Signal) {
        *self.signal.lock().unwrap() = Some(signal);
    }
}

impl Strategy for ScriptedStrategy {
    fn evaluate(&self, bars: &[Bar]) -> Result<Option<Signal>, StrategyError> {
        if bars.is_empty() {
            return Ok(None);
        }
        Ok(*self.signal.lock().unwrap())
    }

    fn required_bars(&self) -> usize {
        1
    }
}

/// Offsets of 30 below / 60 above the entry for every signal.
pub fn signal() -> Signal {
    Signal {
        stop_loss_offset: dec!(30),
        take_profit_offset: dec!(60),
        atr: dec!(10),
        ..Signal::neutral()
    }
}

pub fn long_open() -> Signal {
    Signal {
        long_open: true,
        ..signal()
    }
}

pub fn short_open() -> Signal {
    Signal {
        short_open: true,
        ..signal()
    }
}
