use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trading: Trading,
    #[serde(default)]
    pub strategy: StrategyParams,
    #[serde(default)]
    pub sizing: SizingParams,
    /// The contract specification table used by position sizing.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentSpec>,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

/// What to trade and how often to look at it.
#[derive(Debug, Clone, Deserialize)]
pub struct Trading {
    /// Base symbols (e.g. "CZCE.SA") or literal option contracts.
    pub symbols: Vec<String>,
    /// The K-line period in seconds.
    #[serde(default = "default_bar_period_secs")]
    pub bar_period_secs: u64,
    /// How many bars the feed keeps per contract.
    #[serde(default = "default_bar_window_len")]
    pub bar_window_len: usize,
    /// A fixed lot count per entry. Zero hands sizing to the risk-budget policy.
    #[serde(default)]
    pub fixed_size: u32,
    /// Main-contract lookups happen every this many bars while flat. 1 means every bar.
    #[serde(default = "default_roll_check_interval")]
    pub roll_check_interval_bars: u32,
    /// Upper bound on a single `wait_update` call.
    #[serde(default = "default_wait_deadline_secs")]
    pub wait_deadline_secs: u64,
}

/// Parameters for the Williams %R trend strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub ma_short_period: usize,
    pub ma_long_period: usize,
    pub wr_period: usize,
    /// %R below this is oversold (short entry / long exit band).
    pub wr_oversold: Decimal,
    /// %R above this is overbought (long entry / short exit band).
    pub wr_overbought: Decimal,
    pub atr_period: usize,
    pub adx_period: usize,
    /// ADX threshold to confirm trend strength.
    pub adx_threshold: Decimal,
    pub stop_loss_atr_multiplier: Decimal,
    /// Reward:risk ratio applied on top of the stop-loss distance.
    pub take_profit_ratio: Decimal,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            ma_short_period: 55,
            ma_long_period: 144,
            wr_period: 21,
            wr_oversold: dec!(-70),
            wr_overbought: dec!(-30),
            atr_period: 21,
            adx_period: 21,
            adx_threshold: dec!(25),
            stop_loss_atr_multiplier: dec!(3.0),
            take_profit_ratio: dec!(2.0),
        }
    }
}

/// Contains parameters for the risk-budget position sizing policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizingParams {
    /// The fraction of account balance to risk on a single trade (e.g., 0.05 for 5%).
    pub risk_ratio: Decimal,
    /// The margin rate assumed per lot.
    pub margin_ratio: Decimal,
    /// The share of balance that may be committed as margin.
    pub margin_headroom: Decimal,
    /// The stop distance in ATRs assumed when costing a lot.
    pub stop_atr_multiplier: Decimal,
    /// ATR readings are floored here to avoid dividing by zero.
    pub min_atr: Decimal,
    /// Divide the balance evenly across all traded symbols before sizing.
    pub split_balance: bool,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            risk_ratio: dec!(0.05),
            margin_ratio: dec!(0.15),
            margin_headroom: dec!(0.8),
            stop_atr_multiplier: dec!(6),
            min_atr: dec!(0.001),
            split_balance: false,
        }
    }
}

/// One row of the contract specification table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstrumentSpec {
    /// Base code, e.g. "SHFE.rb".
    pub code: String,
    /// Money per one point of price movement per lot.
    pub point_value: Decimal,
    /// The smallest tradable lot count.
    #[serde(default = "default_min_volume")]
    pub min_volume: u32,
}

/// Session supervision parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Consecutive failed sessions tolerated before giving up.
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_secs: u64,
    /// Pause after a per-bar error before the loop continues.
    pub error_pause_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 10,
            reconnect_backoff_secs: 30,
            error_pause_secs: 5,
        }
    }
}

/// Log verbosity, mirrored onto `tracing` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// When set, logs go to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Connection details for the broker gateway used by live trading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7777".to_string(),
            user: String::new(),
            password: String::new(),
            request_timeout_secs: 30,
        }
    }
}

/// Contains parameters for a replayed run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Directory holding `<contract>.csv` files and `main_contracts.csv`.
    pub data_dir: PathBuf,
    /// The initial starting capital for the simulation.
    pub initial_balance: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            initial_balance: dec!(100000),
        }
    }
}

fn default_bar_period_secs() -> u64 {
    30 * 60
}

fn default_bar_window_len() -> usize {
    200
}

fn default_roll_check_interval() -> u32 {
    100
}

fn default_wait_deadline_secs() -> u64 {
    300
}

/// The contracts traded so far, used when the file has no `[[instruments]]` table.
fn default_instruments() -> Vec<InstrumentSpec> {
    [
        ("SHFE.rb", dec!(10)),
        ("SHFE.hc", dec!(10)),
        ("DCE.m", dec!(10)),
        ("CZCE.FG", dec!(20)),
        ("CZCE.SA", dec!(20)),
        ("DCE.c", dec!(10)),
    ]
    .into_iter()
    .map(|(code, point_value)| InstrumentSpec {
        code: code.to_string(),
        point_value,
        min_volume: default_min_volume(),
    })
    .collect()
}

fn default_min_volume() -> u32 {
    1
}
