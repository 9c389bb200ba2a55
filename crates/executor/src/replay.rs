use crate::account::{OrderRecord, SimAccount};
use crate::error::ExecutorError;
use api_client::{ApiError, TradingApi, UpdateEvent};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use configuration::InstrumentSpec;
use core_types::{Bar, base_code};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The file holding the main-contract schedule inside a replay directory.
pub const SCHEDULE_FILE: &str = "main_contracts.csv";

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// From `datetime` on, `base` resolves to `contract`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainContractEntry {
    pub datetime: NaiveDateTime,
    pub base: String,
    pub contract: String,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    datetime: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    datetime: String,
    base: String,
    contract: String,
}

fn parse_datetime(raw: &str, path: &Path) -> Result<NaiveDateTime, ExecutorError> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| ExecutorError::InvalidData {
            path: path.to_path_buf(),
            message: format!("unparseable datetime '{}'", raw),
        })
}

fn read_bars(path: &Path) -> Result<Vec<Bar>, ExecutorError> {
    let mut reader = csv::Reader::from_reader(BufReader::new(File::open(path)?));
    let mut bars = Vec::new();
    for row in reader.deserialize() {
        let row: BarRow = row?;
        bars.push(Bar {
            datetime: parse_datetime(&row.datetime, path)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    bars.sort_by_key(|b| b.datetime);
    Ok(bars)
}

fn read_schedule(path: &Path) -> Result<Vec<MainContractEntry>, ExecutorError> {
    let mut reader = csv::Reader::from_reader(BufReader::new(File::open(path)?));
    let mut entries = Vec::new();
    for row in reader.deserialize() {
        let row: ScheduleRow = row?;
        entries.push(MainContractEntry {
            datetime: parse_datetime(&row.datetime, path)?,
            base: row.base.trim().to_string(),
            contract: row.contract.trim().to_string(),
        });
    }
    Ok(entries)
}

#[derive(Debug)]
struct ReplayState {
    bars: HashMap<String, Vec<Bar>>,
    schedule: Vec<MainContractEntry>,
    timeline: Vec<NaiveDateTime>,
    /// Index into `timeline` of the current clock. `None` before the first update.
    cursor: Option<usize>,
    subscriptions: HashMap<String, usize>,
    account: SimAccount,
    orders: Vec<OrderRecord>,
    closed: bool,
}

impl ReplayState {
    fn clock(&self) -> Option<NaiveDateTime> {
        self.cursor.and_then(|i| self.timeline.get(i).copied())
    }

    /// Bars of `symbol` up to and including the clock.
    fn visible(&self, symbol: &str) -> Result<&[Bar], ExecutorError> {
        let bars = self
            .bars
            .get(symbol)
            .ok_or_else(|| ExecutorError::UnknownSymbol(symbol.to_string()))?;
        let Some(clock) = self.clock() else {
            return Ok(&[]);
        };
        let end = bars.partition_point(|b| b.datetime <= clock);
        Ok(&bars[..end])
    }

    fn last_close(&self, symbol: &str) -> Option<Decimal> {
        self.visible(symbol).ok()?.last().map(|b| b.close)
    }

    fn has_bar_at(&self, symbol: &str, at: NaiveDateTime) -> bool {
        self.bars
            .get(symbol)
            .is_some_and(|bars| bars.binary_search_by_key(&at, |b| b.datetime).is_ok())
    }

    fn ensure_open(&self) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        Ok(())
    }
}

/// A `TradingApi` that replays recorded bars and fills orders against a `SimAccount`.
///
/// Time only moves inside `wait_update`: each call steps the clock to the next timestamp at
/// which a subscribed contract has a bar.
pub struct ReplayApi {
    state: Mutex<ReplayState>,
    /// Point values keyed by base code.
    point_values: HashMap<String, Decimal>,
}

impl ReplayApi {
    /// Builds a replay from in-memory bars keyed by concrete contract.
    pub fn new(
        bars: HashMap<String, Vec<Bar>>,
        mut schedule: Vec<MainContractEntry>,
        initial_balance: Decimal,
        instruments: &[InstrumentSpec],
    ) -> Self {
        let timeline: BTreeSet<NaiveDateTime> = bars
            .values()
            .flat_map(|series| series.iter().map(|b| b.datetime))
            .collect();
        schedule.sort_by_key(|e| e.datetime);

        Self {
            state: Mutex::new(ReplayState {
                bars,
                schedule,
                timeline: timeline.into_iter().collect(),
                cursor: None,
                subscriptions: HashMap::new(),
                account: SimAccount::new(initial_balance),
                orders: Vec::new(),
                closed: false,
            }),
            point_values: instruments
                .iter()
                .map(|spec| (spec.code.clone(), spec.point_value))
                .collect(),
        }
    }

    /// Loads every `<contract>.csv` in `dir` plus the `main_contracts.csv` schedule.
    pub fn load(
        dir: impl AsRef<Path>,
        initial_balance: Decimal,
        instruments: &[InstrumentSpec],
    ) -> Result<Self, ExecutorError> {
        let dir = dir.as_ref();
        let mut bars = HashMap::new();
        let mut schedule = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if path.file_name().and_then(|n| n.to_str()) == Some(SCHEDULE_FILE) {
                schedule = read_schedule(&path)?;
            } else {
                let series = read_bars(&path)?;
                tracing::debug!(contract = stem, bars = series.len(), "Loaded bar file");
                bars.insert(stem.to_string(), series);
            }
        }

        if bars.is_empty() {
            return Err(ExecutorError::NoData(dir.to_path_buf()));
        }
        tracing::info!(
            contracts = bars.len(),
            schedule_entries = schedule.len(),
            dir = %dir.display(),
            "Replay data loaded"
        );
        Ok(Self::new(bars, schedule, initial_balance, instruments))
    }

    /// Every order accepted so far, oldest first.
    pub async fn order_log(&self) -> Vec<OrderRecord> {
        self.state.lock().await.orders.clone()
    }

    /// The replay clock, `None` before the first update.
    pub async fn clock(&self) -> Option<NaiveDateTime> {
        self.state.lock().await.clock()
    }

    fn point_value(&self, symbol: &str) -> Result<Decimal, ExecutorError> {
        let code = base_code(symbol).map_err(|_| ExecutorError::UnknownSymbol(symbol.to_string()))?;
        self.point_values
            .get(&code)
            .copied()
            .ok_or(ExecutorError::UnknownSymbol(code))
    }
}

#[async_trait]
impl TradingApi for ReplayApi {
    async fn subscribe_klines(
        &self,
        symbol: &str,
        _period_secs: u64,
        window_len: usize,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        if !state.bars.contains_key(symbol) {
            return Err(ExecutorError::UnknownSymbol(symbol.to_string()).into());
        }
        state.subscriptions.insert(symbol.to_string(), window_len);
        Ok(())
    }

    async fn kline_window(&self, symbol: &str, _period_secs: u64) -> Result<Vec<Bar>, ApiError> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        let window_len = *state
            .subscriptions
            .get(symbol)
            .ok_or_else(|| ExecutorError::NotSubscribed(symbol.to_string()))?;
        let visible = state.visible(symbol)?;
        let start = visible.len().saturating_sub(window_len);
        Ok(visible[start..].to_vec())
    }

    async fn wait_update(&self, _deadline: Duration) -> Result<UpdateEvent, ApiError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;

        let mut next = state.cursor.map_or(0, |i| i + 1);
        while let Some(&at) = state.timeline.get(next) {
            let changed: BTreeSet<String> = state
                .subscriptions
                .keys()
                .filter(|symbol| state.has_bar_at(symbol, at))
                .cloned()
                .collect();
            if !changed.is_empty() {
                state.cursor = Some(next);
                return Ok(UpdateEvent::Changed(changed));
            }
            next += 1;
        }

        state.cursor = Some(state.timeline.len().saturating_sub(1));
        Ok(UpdateEvent::Finished)
    }

    async fn account_balance(&self) -> Result<Decimal, ApiError> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        Ok(state.account.balance(|symbol| state.last_close(symbol)))
    }

    async fn query_main_contract(&self, exchange: &str, product: &str) -> Result<String, ApiError> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        let base = format!("{}.{}", exchange, product);
        // Before the first update the replay stands at the first timestamp.
        let clock = state.clock().or_else(|| state.timeline.first().copied());

        let mut candidates = state.schedule.iter().filter(|e| e.base == base).peekable();
        let first = candidates
            .peek()
            .map(|e| e.contract.clone())
            .ok_or_else(|| ExecutorError::UnknownSymbol(base.clone()))?;
        let current = candidates
            .take_while(|e| clock.is_none_or(|c| e.datetime <= c))
            .last()
            .map(|e| e.contract.clone());
        Ok(current.unwrap_or(first))
    }

    async fn set_target_volume(&self, symbol: &str, lots: i64) -> Result<(), ApiError> {
        let point_value = self.point_value(symbol)?;
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let price = state
            .last_close(symbol)
            .ok_or_else(|| ExecutorError::NoPrice(symbol.to_string()))?;
        let datetime = state
            .clock()
            .ok_or_else(|| ExecutorError::NoPrice(symbol.to_string()))?;

        let from_volume = state.account.volume(symbol);
        if let Some(realized_pnl) = state.account.set_target(symbol, lots, price, point_value) {
            tracing::info!(
                symbol,
                from = from_volume,
                to = lots,
                %price,
                %realized_pnl,
                "Replay fill"
            );
            state.orders.push(OrderRecord {
                id: Uuid::new_v4(),
                datetime,
                symbol: symbol.to_string(),
                from_volume,
                to_volume: lots,
                price,
                realized_pnl,
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        if !state.closed {
            tracing::info!(orders = state.orders.len(), "Closing replay session");
        }
        state.closed = true;
        Ok(())
    }
}
