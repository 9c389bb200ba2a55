use crate::error::RiskError;
use crate::instruments::InstrumentTable;
use crate::{PositionSizer, SizingRequest};
use configuration::SizingParams;
use core_types::is_option;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Always answers with the same configured lot count.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizer {
    lots: u32,
}

impl FixedSizer {
    pub fn new(lots: u32) -> Result<Self, RiskError> {
        if lots == 0 {
            return Err(RiskError::InvalidParameters(
                "fixed size must be at least one lot".to_string(),
            ));
        }
        Ok(Self { lots })
    }
}

impl PositionSizer for FixedSizer {
    fn needs_balance(&self) -> bool {
        false
    }

    fn size(&self, _request: &SizingRequest<'_>) -> Result<u32, RiskError> {
        Ok(self.lots)
    }
}

/// Sizes entries from a fraction of the account balance.
///
/// The lot count is the smaller of what the risk budget affords at an ATR-based stop
/// and what the margin headroom affords, floored at the instrument's minimum volume.
#[derive(Debug, Clone)]
pub struct RiskBudgetSizer {
    params: SizingParams,
    instruments: InstrumentTable,
    /// Number of instruments sharing the balance when `split_balance` is on.
    instrument_count: usize,
}

impl RiskBudgetSizer {
    /// Creates a new `RiskBudgetSizer` with the given configuration parameters.
    pub fn new(
        params: SizingParams,
        instruments: InstrumentTable,
        instrument_count: usize,
    ) -> Result<Self, RiskError> {
        // Validate that risk parameters are logical.
        if params.risk_ratio <= dec!(0) || params.risk_ratio >= dec!(1) {
            return Err(RiskError::InvalidParameters(
                "risk_ratio must be between 0 and 1".to_string(),
            ));
        }
        if params.margin_ratio <= dec!(0) || params.margin_headroom <= dec!(0) {
            return Err(RiskError::InvalidParameters(
                "margin_ratio and margin_headroom must be greater than 0".to_string(),
            ));
        }
        if params.stop_atr_multiplier <= dec!(0) || params.min_atr <= dec!(0) {
            return Err(RiskError::InvalidParameters(
                "stop_atr_multiplier and min_atr must be greater than 0".to_string(),
            ));
        }
        if instrument_count == 0 {
            return Err(RiskError::InvalidParameters(
                "at least one instrument must share the balance".to_string(),
            ));
        }
        Ok(Self {
            params,
            instruments,
            instrument_count,
        })
    }
}

impl PositionSizer for RiskBudgetSizer {
    fn size(&self, request: &SizingRequest<'_>) -> Result<u32, RiskError> {
        // Options trade in single lots and are not in the table.
        if is_option(request.symbol) {
            return Ok(1);
        }

        // --- 1. Validation ---
        let spec = self.instruments.lookup(request.symbol)?;
        if request.price <= dec!(0) {
            return Err(RiskError::InvalidEntryPrice(request.price));
        }
        if request.balance <= dec!(0) {
            return Err(RiskError::InsufficientEquity(request.balance));
        }

        // --- 2. Budget ---
        let balance = if self.params.split_balance {
            request.balance / Decimal::from(self.instrument_count)
        } else {
            request.balance
        };
        let atr = request.atr.max(self.params.min_atr);
        let risk_amount = balance * self.params.risk_ratio;

        // --- 3. Per-lot costs ---
        let margin_per_lot = request.price * spec.point_value * self.params.margin_ratio;
        let loss_per_lot = atr * self.params.stop_atr_multiplier * spec.point_value;

        let by_risk = risk_amount / loss_per_lot;
        let by_margin = balance * self.params.margin_headroom / margin_per_lot;
        let lots = by_risk.min(by_margin);

        tracing::info!(
            symbol = request.symbol,
            %by_risk,
            %by_margin,
            risk_bound = by_risk < by_margin,
            "Sizing: lots affordable by risk budget vs margin"
        );

        // --- 4. Round and floor at the instrument minimum ---
        let rounded = lots
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_u32()
            .ok_or_else(|| RiskError::Calculation(format!("lot count {} is out of range", lots)))?;

        Ok(rounded.max(spec.min_volume))
    }
}
