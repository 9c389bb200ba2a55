use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// The net holding of one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    /// Signed lot count: positive is long, negative is short.
    pub volume: i64,
    pub avg_price: Decimal,
    pub point_value: Decimal,
}

impl Holding {
    fn pnl_at(&self, price: Decimal) -> Decimal {
        (price - self.avg_price) * Decimal::from(self.volume) * self.point_value
    }
}

/// One accepted target-volume change, kept for inspection after a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub datetime: NaiveDateTime,
    pub symbol: String,
    pub from_volume: i64,
    pub to_volume: i64,
    pub price: Decimal,
    /// PnL realized by the closing part of this fill.
    pub realized_pnl: Decimal,
}

/// Manages the state of a simulated futures account: realized PnL and open holdings.
/// Every fill happens at a single price with no fees or slippage.
#[derive(Debug, Clone)]
pub struct SimAccount {
    initial_balance: Decimal,
    realized_pnl: Decimal,
    holdings: HashMap<String, Holding>,
}

impl SimAccount {
    /// Creates a new `SimAccount` with a given amount of starting capital.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            realized_pnl: Decimal::ZERO,
            holdings: HashMap::new(),
        }
    }

    /// Moves the net holding of `symbol` to `target` lots at `price`.
    ///
    /// Returns the realized PnL of the fill, or `None` when the holding already sits at the
    /// target.
    pub fn set_target(
        &mut self,
        symbol: &str,
        target: i64,
        price: Decimal,
        point_value: Decimal,
    ) -> Option<Decimal> {
        let current = self.volume(symbol);
        if current == target {
            return None;
        }

        let mut realized = Decimal::ZERO;
        let mut holding = self.holdings.remove(symbol).unwrap_or(Holding {
            volume: 0,
            avg_price: Decimal::ZERO,
            point_value,
        });

        // --- Closing part: any reduction or a flip through zero. ---
        let same_side = current.signum() == target.signum();
        if current != 0 && (!same_side || target.abs() < current.abs()) {
            let closed = if same_side {
                current.abs() - target.abs()
            } else {
                current.abs()
            };
            realized = (price - holding.avg_price)
                * Decimal::from(closed * current.signum())
                * holding.point_value;
            holding.volume -= closed * current.signum();
        }

        // --- Opening part: whatever remains to reach the target. ---
        if holding.volume != target {
            let kept = Decimal::from(holding.volume.abs());
            let added = Decimal::from(target.abs() - holding.volume.abs());
            holding.avg_price = (holding.avg_price * kept + price * added) / Decimal::from(target.abs());
            holding.volume = target;
        }

        self.realized_pnl += realized;
        if holding.volume != 0 {
            self.holdings.insert(symbol.to_string(), holding);
        }
        Some(realized)
    }

    pub fn volume(&self, symbol: &str) -> i64 {
        self.holdings.get(symbol).map_or(0, |h| h.volume)
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Open PnL of every holding, marked with `price_of`. Holdings without a price count zero.
    pub fn unrealized_pnl(&self, price_of: impl Fn(&str) -> Option<Decimal>) -> Decimal {
        self.holdings
            .iter()
            .filter_map(|(symbol, holding)| price_of(symbol).map(|p| holding.pnl_at(p)))
            .sum()
    }

    /// Initial balance plus realized and unrealized PnL.
    pub fn balance(&self, price_of: impl Fn(&str) -> Option<Decimal>) -> Decimal {
        self.initial_balance + self.realized_pnl + self.unrealized_pnl(price_of)
    }
}
