pub use crate::error::ApiError;
use async_trait::async_trait;
use core_types::Bar;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub mod error;
pub mod http;
pub mod responses;
// --- Public API ---
pub use http::HttpApi;
pub use responses::{AccountResponse, GatewayErrorResponse, MainContractResponse, WaitUpdateResponse};

/// What a single `wait_update` call observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// At least one subscribed bar window changed. Carries the concrete contracts that did.
    Changed(BTreeSet<String>),
    /// The deadline passed without any change.
    Timeout,
    /// A replayed feed ran out of data. Live feeds never return this.
    Finished,
}

/// The generic, abstract interface for a futures broker session.
/// This trait is the contract the trading engine uses, allowing the
/// underlying implementation (live gateway, replay or test fake) to be swapped out.
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Starts maintaining a rolling window of `window_len` bars of `period_secs` for `symbol`.
    async fn subscribe_klines(
        &self,
        symbol: &str,
        period_secs: u64,
        window_len: usize,
    ) -> Result<(), ApiError>;

    /// Returns the current window of a subscribed symbol, oldest bar first.
    async fn kline_window(&self, symbol: &str, period_secs: u64) -> Result<Vec<Bar>, ApiError>;

    /// Blocks until subscribed data changes or `deadline` elapses.
    async fn wait_update(&self, deadline: Duration) -> Result<UpdateEvent, ApiError>;

    /// The account's current balance (equity).
    async fn account_balance(&self) -> Result<Decimal, ApiError>;

    /// Resolves a product (e.g. "CZCE", "SA") to its current main contract ("CZCE.SA601").
    async fn query_main_contract(&self, exchange: &str, product: &str) -> Result<String, ApiError>;

    /// Asks the broker to converge the net position of `symbol` to `lots` (signed).
    async fn set_target_volume(&self, symbol: &str, lots: i64) -> Result<(), ApiError>;

    /// Releases the session. Further calls may fail with `ApiError::Closed`.
    async fn close(&self) -> Result<(), ApiError>;
}

/// A position-target binding for one concrete contract.
///
/// Replaced wholesale when the contract rolls, so an order can never reach the old contract
/// through a stale binding.
#[derive(Clone)]
pub struct TargetPosTask {
    api: Arc<dyn TradingApi>,
    symbol: String,
}

impl TargetPosTask {
    pub fn new(api: Arc<dyn TradingApi>, symbol: impl Into<String>) -> Self {
        Self {
            api,
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn set_target_volume(&self, lots: i64) -> Result<(), ApiError> {
        tracing::debug!(symbol = %self.symbol, lots, "Setting target volume");
        self.api.set_target_volume(&self.symbol, lots).await
    }
}

impl std::fmt::Debug for TargetPosTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetPosTask")
            .field("symbol", &self.symbol)
            .finish()
    }
}
