use crate::Strategy;
use crate::error::StrategyError;
use crate::indicators::{AverageDirectionalIndex, WilderAverageTrueRange, WilliamsR};
use configuration::StrategyParams;
use core_types::{Bar, Signal};
use rust_decimal::prelude::*;
use ta::Next;
use ta::indicators::SimpleMovingAverage as Sma;

/// The Williams %R trend strategy.
///
/// Entries need a confluence of three conditions:
/// 1. Momentum: %R beyond its band in the trade's direction.
/// 2. Trend strength: ADX above its threshold.
/// 3. Trend direction: short MA on the right side of the long MA.
///
/// Exits only need %R to cross back through the opposite band.
pub struct WrTrend {
    params: StrategyParams,
}

/// The raw indicator readings on the last bar of a window.
#[derive(Debug, Clone, Copy)]
struct Readings {
    ma_short: f64,
    ma_long: f64,
    atr: f64,
    wr: f64,
    adx: f64,
}

impl Readings {
    fn is_finite(&self) -> bool {
        [self.ma_short, self.ma_long, self.atr, self.wr, self.adx]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl WrTrend {
    /// Creates a new `WrTrend` instance with the given parameters.
    ///
    /// It performs validation to ensure the parameters are logical.
    pub fn new(params: StrategyParams) -> Result<Self, StrategyError> {
        if params.ma_short_period == 0
            || params.ma_long_period == 0
            || params.wr_period == 0
            || params.atr_period == 0
            || params.adx_period == 0
        {
            return Err(StrategyError::InvalidParameters(
                "Indicator periods cannot be zero".to_string(),
            ));
        }
        if params.ma_short_period >= params.ma_long_period {
            return Err(StrategyError::InvalidParameters(
                "Short MA period must be less than long MA period".to_string(),
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Runs every indicator across the window and keeps the final reading of each.
    fn readings(&self, bars: &[Bar]) -> Result<Readings, StrategyError> {
        let p = &self.params;
        let init = |name: &str, e: ta::errors::TaError| {
            StrategyError::InvalidParameters(format!("Failed to initialize {}: {:?}", name, e))
        };

        let mut ma_short = Sma::new(p.ma_short_period).map_err(|e| init("short MA", e))?;
        let mut ma_long = Sma::new(p.ma_long_period).map_err(|e| init("long MA", e))?;
        let mut atr = WilderAverageTrueRange::new(p.atr_period)?;
        let mut wr = WilliamsR::new(p.wr_period)?;
        let mut adx = AverageDirectionalIndex::new(p.adx_period)?;

        let mut last = Readings {
            ma_short: f64::NAN,
            ma_long: f64::NAN,
            atr: f64::NAN,
            wr: f64::NAN,
            adx: f64::NAN,
        };
        for bar in bars {
            let close = bar.close.to_f64().ok_or_else(|| {
                StrategyError::IndicatorError(format!("Failed to convert close {} to f64", bar.close))
            })?;
            last = Readings {
                ma_short: ma_short.next(close),
                ma_long: ma_long.next(close),
                atr: atr.next(bar),
                wr: wr.next(bar),
                adx: adx.next(bar),
            };
        }
        Ok(last)
    }
}

fn to_decimal(name: &str, value: f64) -> Result<Decimal, StrategyError> {
    Decimal::from_f64(value).ok_or_else(|| {
        StrategyError::IndicatorError(format!("{} reading {} is not representable", name, value))
    })
}

impl Strategy for WrTrend {
    fn required_bars(&self) -> usize {
        let p = &self.params;
        p.ma_short_period
            .max(p.ma_long_period)
            .max(p.wr_period)
            .max(p.atr_period + 1)
            .max(2 * p.adx_period)
    }

    fn evaluate(&self, bars: &[Bar]) -> Result<Option<Signal>, StrategyError> {
        let required = self.required_bars();
        if bars.len() < required {
            tracing::debug!(have = bars.len(), required, "WrTrend: window too short, no signal");
            return Ok(None);
        }

        let readings = self.readings(bars)?;
        if !readings.is_finite() {
            tracing::debug!(?readings, "WrTrend: non-finite indicator reading, no signal");
            return Ok(None);
        }

        let ma_short = to_decimal("short MA", readings.ma_short)?;
        let ma_long = to_decimal("long MA", readings.ma_long)?;
        let atr = to_decimal("ATR", readings.atr)?;
        let wr = to_decimal("%R", readings.wr)?;
        let adx = to_decimal("ADX", readings.adx)?;

        let p = &self.params;
        let trending = adx > p.adx_threshold;
        let ma_buy = ma_short > ma_long;
        let ma_sell = ma_short < ma_long;
        let wr_buy = wr > p.wr_overbought;
        let wr_sell = wr < p.wr_oversold;

        let stop_loss_offset = atr * p.stop_loss_atr_multiplier;
        let signal = Signal {
            stop_loss_offset,
            take_profit_offset: stop_loss_offset * p.take_profit_ratio,
            long_open: wr_buy && trending && ma_buy,
            short_open: wr_sell && trending && ma_sell,
            long_exit: wr_sell,
            short_exit: wr_buy,
            atr,
        };

        tracing::debug!(%adx, %ma_short, %ma_long, %wr, %atr, "WrTrend: readings");
        tracing::debug!(
            long_open = signal.long_open,
            short_open = signal.short_open,
            long_exit = signal.long_exit,
            short_exit = signal.short_exit,
            "WrTrend: intents"
        );

        Ok(Some(signal))
    }
}
