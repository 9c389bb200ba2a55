use crate::error::EngineError;
use crate::report::{SessionEnd, SessionReport};
use crate::roll::{ContractRoller, RollCadence};
use crate::trader::{FeedSettings, InstrumentTrader};
use api_client::{TradingApi, UpdateEvent};
use configuration::Config;
use risk::{FixedSizer, InstrumentTable, PositionSizer, RiskBudgetSizer};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use strategies::{Strategy, WrTrend};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Timing and retry policy of the update loop.
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub wait_deadline: Duration,
    pub error_pause: Duration,
    pub reconnect_backoff: Duration,
    pub max_reconnect_attempts: u32,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wait_deadline: Duration::from_secs(config.trading.wait_deadline_secs),
            error_pause: Duration::from_secs(config.runner.error_pause_secs),
            reconnect_backoff: Duration::from_secs(config.runner.reconnect_backoff_secs),
            max_reconnect_attempts: config.runner.max_reconnect_attempts,
        }
    }
}

/// Sleeps for `duration` unless cancelled first. Returns `false` on cancellation.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Drives every configured instrument through one `TradingApi` session at a time.
pub struct Runner {
    traders: Vec<InstrumentTrader>,
    settings: RunnerSettings,
    cancel: CancellationToken,
    /// `Changed` rounds handled over the runner's lifetime.
    updates_processed: u64,
    /// Balance read when the first session started.
    starting_balance: Option<Decimal>,
    started: Instant,
}

impl Runner {
    pub fn new(
        traders: Vec<InstrumentTrader>,
        settings: RunnerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            traders,
            settings,
            cancel,
            updates_processed: 0,
            starting_balance: None,
            started: Instant::now(),
        }
    }

    /// Wires one trader per configured symbol, sharing the strategy and the sizing policy.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, EngineError> {
        let trading = &config.trading;
        let strategy: Arc<dyn Strategy> = Arc::new(WrTrend::new(config.strategy.clone())?);
        let sizer: Arc<dyn PositionSizer> = if trading.fixed_size > 0 {
            Arc::new(FixedSizer::new(trading.fixed_size)?)
        } else {
            Arc::new(RiskBudgetSizer::new(
                config.sizing.clone(),
                InstrumentTable::new(config.instruments.iter().cloned()),
                trading.symbols.len(),
            )?)
        };

        let cadence = RollCadence::from_interval(trading.roll_check_interval_bars);
        let feed = FeedSettings {
            period_secs: trading.bar_period_secs,
            window_len: trading.bar_window_len,
        };
        let traders = trading
            .symbols
            .iter()
            .map(|symbol| {
                InstrumentTrader::new(
                    ContractRoller::new(symbol.clone(), cadence),
                    Arc::clone(&strategy),
                    Arc::clone(&sizer),
                    feed,
                )
            })
            .collect();

        tracing::info!(
            instruments = trading.symbols.len(),
            fixed_size = trading.fixed_size,
            ?cadence,
            "Runner configured"
        );
        Ok(Self::new(traders, RunnerSettings::from_config(config), cancel))
    }

    pub fn traders(&self) -> &[InstrumentTrader] {
        &self.traders
    }

    pub fn report(&self, end: SessionEnd, final_balance: Option<Decimal>) -> SessionReport {
        SessionReport {
            end,
            starting_balance: self.starting_balance,
            final_balance,
            elapsed: self.started.elapsed(),
            instruments: self.traders.iter().map(InstrumentTrader::report).collect(),
        }
    }

    /// Runs one live session until the token is cancelled or the session faults.
    ///
    /// Positions start Flat and every instrument is bound before the first update. A per-bar
    /// error is followed by `error_pause`.
    pub async fn run_session(&mut self, api: &Arc<dyn TradingApi>) -> Result<SessionEnd, EngineError> {
        let error_pause = self.settings.error_pause;
        self.session(api, error_pause).await
    }

    async fn session(
        &mut self,
        api: &Arc<dyn TradingApi>,
        error_pause: Duration,
    ) -> Result<SessionEnd, EngineError> {
        if self.starting_balance.is_none() {
            self.starting_balance = Self::read_balance(api).await;
        }
        for trader in &mut self.traders {
            trader.begin_session();
            trader.ensure_bound(api).await?;
        }
        tracing::info!(instruments = self.traders.len(), "Session started");

        loop {
            if self.cancel.is_cancelled() {
                return Ok(SessionEnd::Cancelled);
            }
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                event = api.wait_update(self.settings.wait_deadline) => event?,
            };

            match event {
                UpdateEvent::Finished => {
                    tracing::info!("Feed finished");
                    return Ok(SessionEnd::Finished);
                }
                UpdateEvent::Timeout => {
                    tracing::debug!("No update before the deadline");
                }
                UpdateEvent::Changed(changed) => {
                    self.process(api, &changed, error_pause).await?;
                    self.updates_processed += 1;
                }
            }
        }
    }

    /// Lets every trader react to one update. Only session faults abort the round.
    ///
    /// Cancellation cuts a pause short but the remaining traders still see the update.
    async fn process(
        &mut self,
        api: &Arc<dyn TradingApi>,
        changed: &BTreeSet<String>,
        error_pause: Duration,
    ) -> Result<(), EngineError> {
        let cancel = self.cancel.clone();
        for trader in &mut self.traders {
            if let Err(e) = trader.on_update(api, changed).await {
                if e.is_session_fault() {
                    return Err(e);
                }
                tracing::error!(symbol = trader.base_symbol(), error = %e, "Bar processing failed");
                if !error_pause.is_zero() {
                    pause(&cancel, error_pause).await;
                }
            }
        }
        Ok(())
    }

    /// Runs a single session to its end and closes the API. Used for replays, so per-bar
    /// errors do not pause the feed.
    pub async fn run(&mut self, api: Arc<dyn TradingApi>) -> Result<SessionReport, EngineError> {
        let result = self.session(&api, Duration::ZERO).await;
        let final_balance = Self::read_balance(&api).await;
        Self::close(&api).await;

        let report = self.report(result?, final_balance);
        report.log();
        Ok(report)
    }

    /// Keeps opening sessions through `connect` until one ends normally or too many fail in a row.
    ///
    /// A session that handled at least one update resets the failure count.
    pub async fn supervise<F, Fut>(&mut self, mut connect: F) -> Result<SessionReport, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Arc<dyn TradingApi>, EngineError>>,
    {
        let mut failures = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let processed_before = self.updates_processed;
            let outcome = match connect().await {
                Ok(api) => {
                    let result = self.run_session(&api).await;
                    let final_balance = match result {
                        Ok(_) => Self::read_balance(&api).await,
                        Err(_) => None,
                    };
                    Self::close(&api).await;
                    result.map(|end| (end, final_balance))
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok((end, final_balance)) => {
                    let report = self.report(end, final_balance);
                    report.log();
                    return Ok(report);
                }
                Err(e) => {
                    if self.updates_processed > processed_before {
                        failures = 0;
                    }
                    failures += 1;
                    tracing::warn!(
                        attempt = failures,
                        max_attempts = self.settings.max_reconnect_attempts,
                        error = %e,
                        "Session failed"
                    );
                    if failures >= self.settings.max_reconnect_attempts {
                        tracing::error!(attempts = failures, "Giving up on reconnecting");
                        return Err(EngineError::ReconnectExhausted {
                            attempts: failures,
                            last_error: e.to_string(),
                        });
                    }
                    tracing::info!(
                        backoff_secs = self.settings.reconnect_backoff.as_secs(),
                        "Reconnecting after backoff"
                    );
                    if !pause(&self.cancel, self.settings.reconnect_backoff).await {
                        break;
                    }
                }
            }
        }

        let report = self.report(SessionEnd::Cancelled, None);
        report.log();
        Ok(report)
    }

    async fn read_balance(api: &Arc<dyn TradingApi>) -> Option<Decimal> {
        match api.account_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read the account balance");
                None
            }
        }
    }

    async fn close(api: &Arc<dyn TradingApi>) {
        if let Err(e) = api.close().await {
            tracing::warn!(error = %e, "Closing the session failed");
        }
    }
}
