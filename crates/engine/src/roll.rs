use crate::error::EngineError;
use api_client::TradingApi;
use core_types::{is_option, split_symbol};

/// How often a flat instrument re-checks its main contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollCadence {
    EveryBar,
    EveryNBars(u32),
}

impl RollCadence {
    /// Maps the configured interval; 1 means every bar.
    ///
    /// `Config::validate` rejects 0, so only callers building a cadence by hand can pass it;
    /// it is read as every bar.
    pub fn from_interval(bars: u32) -> Self {
        if bars <= 1 {
            RollCadence::EveryBar
        } else {
            RollCadence::EveryNBars(bars)
        }
    }

    fn interval(&self) -> u32 {
        match self {
            RollCadence::EveryBar => 1,
            RollCadence::EveryNBars(n) => *n,
        }
    }
}

impl Default for RollCadence {
    fn default() -> Self {
        RollCadence::EveryNBars(100)
    }
}

/// Resolves a configured base symbol to the contract that should be traded right now.
#[derive(Debug, Clone)]
pub struct ContractRoller {
    base_symbol: String,
    cadence: RollCadence,
    bars_since_check: u32,
}

impl ContractRoller {
    pub fn new(base_symbol: impl Into<String>, cadence: RollCadence) -> Self {
        Self {
            base_symbol: base_symbol.into(),
            cadence,
            bars_since_check: 0,
        }
    }

    pub fn base_symbol(&self) -> &str {
        &self.base_symbol
    }

    /// Options are traded as configured and never rolled.
    pub fn is_option(&self) -> bool {
        is_option(&self.base_symbol)
    }

    /// Counts a new bar and reports whether the periodic check is due.
    pub fn on_new_bar(&mut self) -> bool {
        self.bars_since_check = self.bars_since_check.saturating_add(1);
        self.bars_since_check >= self.cadence.interval()
    }

    /// Restarts the cadence. Called after every lookup, periodic or not.
    pub fn mark_checked(&mut self) {
        self.bars_since_check = 0;
    }

    /// Looks up the main contract. Options resolve to themselves without a query.
    pub async fn resolve(&self, api: &dyn TradingApi) -> Result<String, EngineError> {
        if self.is_option() {
            return Ok(self.base_symbol.clone());
        }
        let (exchange, product) = split_symbol(&self.base_symbol)?;
        let contract = api.query_main_contract(exchange, product).await?;
        tracing::debug!(base = %self.base_symbol, %contract, "Main contract lookup");
        Ok(contract)
    }
}
