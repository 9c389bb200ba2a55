//! Indicators missing from `ta`, written against its `Next`/`Period`/`Reset` traits so
//! they compose with the library's own.

use crate::error::StrategyError;
use ta::indicators::{Maximum, Minimum};
use ta::{Close, High, Low, Next, Period, Reset};

/// Williams %R: where the close sits inside the highest-high / lowest-low range of the
/// last `period` bars, scaled to `[-100, 0]`.
///
/// A zero-width range reads as 0.
#[derive(Debug, Clone)]
pub struct WilliamsR {
    period: usize,
    highest: Maximum,
    lowest: Minimum,
}

impl WilliamsR {
    pub fn new(period: usize) -> Result<Self, StrategyError> {
        let err = |e| StrategyError::InvalidParameters(format!("Failed to initialize %R: {:?}", e));
        Ok(Self {
            period,
            highest: Maximum::new(period).map_err(err)?,
            lowest: Minimum::new(period).map_err(err)?,
        })
    }
}

impl Period for WilliamsR {
    fn period(&self) -> usize {
        self.period
    }
}

impl<T: High + Low + Close> Next<&T> for WilliamsR {
    type Output = f64;

    fn next(&mut self, input: &T) -> f64 {
        let highest = self.highest.next(input.high());
        let lowest = self.lowest.next(input.low());
        let range = highest - lowest;
        if range == 0.0 {
            0.0
        } else {
            -100.0 * (highest - input.close()) / range
        }
    }
}

impl Reset for WilliamsR {
    fn reset(&mut self) {
        self.highest.reset();
        self.lowest.reset();
    }
}

fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Average True Range with Wilder smoothing: the first reading is the mean of `period`
/// true ranges, after that `atr = (atr * (period - 1) + tr) / period`.
///
/// The first bar has no previous close, so output starts after `period + 1` bars.
/// `ta`'s own `AverageTrueRange` smooths exponentially and reads lower on widening ranges.
#[derive(Debug, Clone)]
pub struct WilderAverageTrueRange {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    sum: f64,
    atr: Option<f64>,
}

impl WilderAverageTrueRange {
    pub fn new(period: usize) -> Result<Self, StrategyError> {
        if period == 0 {
            return Err(StrategyError::InvalidParameters(
                "ATR period cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            period,
            prev_close: None,
            seen: 0,
            sum: 0.0,
            atr: None,
        })
    }
}

impl Period for WilderAverageTrueRange {
    fn period(&self) -> usize {
        self.period
    }
}

impl<T: High + Low + Close> Next<&T> for WilderAverageTrueRange {
    type Output = f64;

    fn next(&mut self, input: &T) -> f64 {
        let Some(prev_close) = self.prev_close.replace(input.close()) else {
            return f64::NAN;
        };
        let tr = true_range(input.high(), input.low(), prev_close);
        let n = self.period as f64;

        let atr = match self.atr {
            Some(prev) => (prev * (n - 1.0) + tr) / n,
            None => {
                self.sum += tr;
                self.seen += 1;
                if self.seen < self.period {
                    return f64::NAN;
                }
                self.sum / n
            }
        };
        self.atr = Some(atr);
        atr
    }
}

impl Reset for WilderAverageTrueRange {
    fn reset(&mut self) {
        self.prev_close = None;
        self.seen = 0;
        self.sum = 0.0;
        self.atr = None;
    }
}

/// Average Directional Index with Wilder smoothing, seeded the way TA-Lib seeds it.
///
/// `period - 1` deltas are summed into the true range and directional movement, every
/// later delta is folded in with `x - x / period + delta`, and the first `period` DX
/// readings are averaged into the first ADX. Outputs `NaN` until `2 * period` bars have
/// been seen.
#[derive(Debug, Clone)]
pub struct AverageDirectionalIndex {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    deltas: usize,
    tr: f64,
    plus_dm: f64,
    minus_dm: f64,
    dx_seen: usize,
    dx_sum: f64,
    adx: Option<f64>,
}

impl AverageDirectionalIndex {
    pub fn new(period: usize) -> Result<Self, StrategyError> {
        if period == 0 {
            return Err(StrategyError::InvalidParameters(
                "ADX period cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            period,
            prev: None,
            deltas: 0,
            tr: 0.0,
            plus_dm: 0.0,
            minus_dm: 0.0,
            dx_seen: 0,
            dx_sum: 0.0,
            adx: None,
        })
    }

    fn directional_index(&self) -> f64 {
        if self.tr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * self.plus_dm / self.tr;
        let minus_di = 100.0 * self.minus_dm / self.tr;
        let sum = plus_di + minus_di;
        if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        }
    }
}

impl Period for AverageDirectionalIndex {
    fn period(&self) -> usize {
        self.period
    }
}

impl<T: High + Low + Close> Next<&T> for AverageDirectionalIndex {
    type Output = f64;

    fn next(&mut self, input: &T) -> f64 {
        let (high, low, close) = (input.high(), input.low(), input.close());
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close)) else {
            return f64::NAN;
        };

        let true_range = true_range(high, low, prev_close);
        let up_move = high - prev_high;
        let down_move = prev_low - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        if self.deltas + 1 < self.period {
            self.tr += true_range;
            self.plus_dm += plus_dm;
            self.minus_dm += minus_dm;
            self.deltas += 1;
            return f64::NAN;
        }

        let n = self.period as f64;
        self.tr = self.tr - self.tr / n + true_range;
        self.plus_dm = self.plus_dm - self.plus_dm / n + plus_dm;
        self.minus_dm = self.minus_dm - self.minus_dm / n + minus_dm;

        let dx = self.directional_index();
        match self.adx {
            Some(prev) => {
                let adx = (prev * (n - 1.0) + dx) / n;
                self.adx = Some(adx);
                adx
            }
            None => {
                self.dx_sum += dx;
                self.dx_seen += 1;
                if self.dx_seen < self.period {
                    return f64::NAN;
                }
                let adx = self.dx_sum / n;
                self.adx = Some(adx);
                adx
            }
        }
    }
}

impl Reset for AverageDirectionalIndex {
    fn reset(&mut self) {
        self.prev = None;
        self.deltas = 0;
        self.tr = 0.0;
        self.plus_dm = 0.0;
        self.minus_dm = 0.0;
        self.dx_seen = 0;
        self.dx_sum = 0.0;
        self.adx = None;
    }
}
