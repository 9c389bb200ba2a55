use crate::error::EngineError;
use crate::position::{PositionMachine, Transition};
use crate::report::InstrumentReport;
use crate::roll::ContractRoller;
use api_client::{TargetPosTask, TradingApi};
use core_types::{Bar, PositionSide, Signal};
use risk::{PositionSizer, SizingRequest};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use strategies::Strategy;

/// The feed subscription and order binding of the currently traded contract.
///
/// Replaced as a whole on a roll.
#[derive(Debug)]
struct Binding {
    task: TargetPosTask,
    /// The last bar as it looked when it was evaluated. The forming bar changes in place.
    last_bar: Option<Bar>,
}

struct RefreshedWindow {
    bars: Vec<Bar>,
    /// The last bar opened since the previous evaluation.
    new_bar: bool,
}

/// Feed parameters shared by every instrument.
#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub period_secs: u64,
    pub window_len: usize,
}

/// Trades one configured instrument. Every change to its bar window is evaluated, ticks on
/// the forming bar included; it drives the position machine, sizes and sends orders and
/// keeps the instrument on its main contract.
pub struct InstrumentTrader {
    roller: ContractRoller,
    strategy: Arc<dyn Strategy>,
    sizer: Arc<dyn PositionSizer>,
    feed: FeedSettings,
    machine: PositionMachine,
    binding: Option<Binding>,
}

impl InstrumentTrader {
    pub fn new(
        roller: ContractRoller,
        strategy: Arc<dyn Strategy>,
        sizer: Arc<dyn PositionSizer>,
        feed: FeedSettings,
    ) -> Self {
        Self {
            roller,
            strategy,
            sizer,
            feed,
            machine: PositionMachine::default(),
            binding: None,
        }
    }

    pub fn base_symbol(&self) -> &str {
        self.roller.base_symbol()
    }

    /// The contract orders currently go to, if bound.
    pub fn contract(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.task.symbol())
    }

    pub fn machine(&self) -> &PositionMachine {
        &self.machine
    }

    pub fn report(&self) -> InstrumentReport {
        InstrumentReport {
            symbol: self.base_symbol().to_string(),
            contract: self.contract().map(str::to_string),
            side: self.machine.side(),
            stats: self.machine.stats(),
        }
    }

    /// Forgets everything tied to the previous session. The counters survive.
    pub fn begin_session(&mut self) {
        self.binding = None;
        self.machine.reset();
    }

    /// Binds to the current contract unless already bound.
    pub async fn ensure_bound(&mut self, api: &Arc<dyn TradingApi>) -> Result<(), EngineError> {
        if self.binding.is_none() {
            self.roll(api).await?;
        }
        Ok(())
    }

    /// Re-resolves the main contract and rebinds if it changed. Returns whether it did.
    ///
    /// Nothing is assigned until every fallible call succeeded, so a failed roll leaves the
    /// previous binding in place.
    pub async fn roll(&mut self, api: &Arc<dyn TradingApi>) -> Result<bool, EngineError> {
        if self.roller.is_option() && self.binding.is_some() {
            return Ok(false);
        }

        let contract = self.roller.resolve(api.as_ref()).await?;
        self.roller.mark_checked();
        if self.contract() == Some(contract.as_str()) {
            return Ok(false);
        }

        api.subscribe_klines(&contract, self.feed.period_secs, self.feed.window_len)
            .await?;
        let previous = self.contract().map(str::to_string);
        tracing::info!(
            symbol = self.base_symbol(),
            from = previous.as_deref().unwrap_or("-"),
            to = %contract,
            "Rolled to main contract"
        );

        self.binding = Some(Binding {
            task: TargetPosTask::new(Arc::clone(api), contract.clone()),
            last_bar: None,
        });
        self.machine.set_contract(Some(contract));
        Ok(true)
    }

    /// Reacts to one `wait_update` round. At most one transition happens per call.
    pub async fn on_update(
        &mut self,
        api: &Arc<dyn TradingApi>,
        changed: &BTreeSet<String>,
    ) -> Result<(), EngineError> {
        self.ensure_bound(api).await?;
        let Some(contract) = self.contract().map(str::to_string) else {
            return Ok(());
        };
        if !changed.contains(&contract) {
            return Ok(());
        }

        let Some(refreshed) = self.refreshed_window(api, &contract).await? else {
            return Ok(());
        };
        let mut window = refreshed.bars;

        // Only a bar with a new timestamp counts towards the roll cadence.
        if refreshed.new_bar
            && self.roller.on_new_bar()
            && self.machine.side().is_flat()
            && self.roll(api).await?
        {
            // Evaluate the fresh contract right away instead of waiting for its next bar.
            let Some(contract) = self.contract().map(str::to_string) else {
                return Ok(());
            };
            match self.refreshed_window(api, &contract).await? {
                Some(fresh) => window = fresh.bars,
                None => return Ok(()),
            }
        }

        self.evaluate(api, &window).await
    }

    /// Fetches the window and returns it unless its last bar is exactly the one already
    /// evaluated. Ticks that move the forming bar come back for another evaluation.
    async fn refreshed_window(
        &mut self,
        api: &Arc<dyn TradingApi>,
        contract: &str,
    ) -> Result<Option<RefreshedWindow>, EngineError> {
        let bars = api.kline_window(contract, self.feed.period_secs).await?;
        let Some(last) = bars.last().cloned() else {
            return Ok(None);
        };
        let Some(binding) = self.binding.as_mut() else {
            return Ok(None);
        };
        if binding.last_bar.as_ref() == Some(&last) {
            return Ok(None);
        }
        let new_bar = binding.last_bar.as_ref().map(|b| b.datetime) != Some(last.datetime);
        binding.last_bar = Some(last);
        Ok(Some(RefreshedWindow { bars, new_bar }))
    }

    async fn evaluate(
        &mut self,
        api: &Arc<dyn TradingApi>,
        window: &[Bar],
    ) -> Result<(), EngineError> {
        let Some(price) = window.last().map(|b| b.close) else {
            return Ok(());
        };
        let signal = match self.strategy.evaluate(window) {
            Ok(Some(signal)) => signal,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(symbol = self.base_symbol(), error = %e, "No signal this bar");
                return Ok(());
            }
        };

        let Some(transition) = self.machine.decide(price, &signal) else {
            return Ok(());
        };
        self.execute(api, &transition, &signal, price).await
    }

    /// Sends the order for a transition and commits it once the order went out.
    async fn execute(
        &mut self,
        api: &Arc<dyn TradingApi>,
        transition: &Transition,
        signal: &Signal,
        price: Decimal,
    ) -> Result<(), EngineError> {
        let Some(task) = self.binding.as_ref().map(|b| b.task.clone()) else {
            return Ok(());
        };

        match *transition {
            Transition::Open {
                side,
                entry_price,
                stop_loss_price,
                take_profit_price,
            } => {
                let lots = self.size(api, task.symbol(), price, signal).await?;
                task.set_target_volume(transition.target_volume(lots)).await?;
                self.machine.commit(transition);
                tracing::info!(
                    symbol = self.base_symbol(),
                    contract = task.symbol(),
                    side = %side,
                    entry = %entry_price,
                    stop = %stop_loss_price,
                    target = %take_profit_price,
                    lots,
                    "Trade opened"
                );
            }
            Transition::Close { reason } => {
                let side = self.machine.side();
                let entry = self.machine.position().entry_price;
                task.set_target_volume(0).await?;
                self.machine.commit(transition);
                tracing::info!(
                    symbol = self.base_symbol(),
                    contract = task.symbol(),
                    side = %side,
                    entry = %entry,
                    exit = %price,
                    reason = %reason,
                    "Trade closed"
                );
                // A flat instrument may move to the new main contract before its next entry.
                self.roll(api).await?;
            }
        }
        Ok(())
    }

    async fn size(
        &self,
        api: &Arc<dyn TradingApi>,
        contract: &str,
        price: Decimal,
        signal: &Signal,
    ) -> Result<u32, EngineError> {
        let balance = if self.sizer.needs_balance() {
            api.account_balance().await?
        } else {
            Decimal::ZERO
        };
        let request = SizingRequest {
            symbol: contract,
            balance,
            price,
            atr: signal.atr,
        };
        self.sizer.size(&request).map_err(|e| {
            tracing::error!(symbol = self.base_symbol(), contract, error = %e, "Sizing failed, no order");
            EngineError::from(e)
        })
    }

    pub fn side(&self) -> PositionSide {
        self.machine.side()
    }
}
