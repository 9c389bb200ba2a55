use core_types::{ExitReason, Position, PositionSide, Signal, TradeStats};
use rust_decimal::Decimal;

/// The single state change a bar can cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Open {
        side: PositionSide,
        entry_price: Decimal,
        stop_loss_price: Decimal,
        take_profit_price: Decimal,
    },
    Close {
        reason: ExitReason,
    },
}

impl Transition {
    /// The signed target volume this transition asks the broker for.
    pub fn target_volume(&self, lots: u32) -> i64 {
        match self {
            Transition::Open { side, .. } => side.direction() * i64::from(lots),
            Transition::Close { .. } => 0,
        }
    }
}

/// The Flat/Long/Short machine of one instrument, with its trade counters.
///
/// Deciding and committing are separate steps so the caller can place the order in between
/// and only commit once the order went out.
#[derive(Debug, Clone, Default)]
pub struct PositionMachine {
    position: Position,
    stats: TradeStats,
}

impl PositionMachine {
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn stats(&self) -> TradeStats {
        self.stats
    }

    pub fn side(&self) -> PositionSide {
        self.position.side
    }

    pub fn set_contract(&mut self, contract: Option<String>) {
        self.position.resolved_contract_id = contract;
    }

    /// Drops the position back to Flat, keeping the counters.
    pub fn reset(&mut self) {
        self.position = Position::default();
    }

    /// Picks at most one transition for a bar closing at `price`.
    ///
    /// When open: stop-loss, then take-profit, then the exit signal.
    /// When flat: long entry, then short entry.
    pub fn decide(&self, price: Decimal, signal: &Signal) -> Option<Transition> {
        let p = &self.position;
        let reason = match p.side {
            PositionSide::Flat => {
                let side = if signal.long_open {
                    PositionSide::Long
                } else if signal.short_open {
                    PositionSide::Short
                } else {
                    return None;
                };
                let dir = Decimal::from(side.direction());
                return Some(Transition::Open {
                    side,
                    entry_price: price,
                    stop_loss_price: price - dir * signal.stop_loss_offset,
                    take_profit_price: price + dir * signal.take_profit_offset,
                });
            }
            PositionSide::Long => {
                if price <= p.stop_loss_price {
                    ExitReason::StopLoss
                } else if price >= p.take_profit_price {
                    ExitReason::TakeProfit
                } else if signal.long_exit {
                    ExitReason::Signal
                } else {
                    return None;
                }
            }
            PositionSide::Short => {
                if price >= p.stop_loss_price {
                    ExitReason::StopLoss
                } else if price <= p.take_profit_price {
                    ExitReason::TakeProfit
                } else if signal.short_exit {
                    ExitReason::Signal
                } else {
                    return None;
                }
            }
        };
        Some(Transition::Close { reason })
    }

    /// Applies a transition returned by `decide` and bumps the matching counter.
    pub fn commit(&mut self, transition: &Transition) {
        match *transition {
            Transition::Open {
                side,
                entry_price,
                stop_loss_price,
                take_profit_price,
            } => {
                self.position.side = side;
                self.position.entry_price = entry_price;
                self.position.stop_loss_price = stop_loss_price;
                self.position.take_profit_price = take_profit_price;
                self.stats.record_entry();
            }
            Transition::Close { reason } => {
                self.position.side = PositionSide::Flat;
                self.stats.record_exit(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal() -> Signal {
        Signal {
            stop_loss_offset: dec!(30),
            take_profit_offset: dec!(60),
            ..Signal::neutral()
        }
    }

    fn opened(side: PositionSide) -> PositionMachine {
        let mut machine = PositionMachine::default();
        let open = Signal {
            long_open: side == PositionSide::Long,
            short_open: side == PositionSide::Short,
            ..signal()
        };
        let t = machine.decide(dec!(1000), &open).unwrap();
        machine.commit(&t);
        machine
    }

    #[test]
    fn long_entry_sets_brackets_below_and_above() {
        let machine = opened(PositionSide::Long);
        let p = machine.position();
        assert_eq!(p.side, PositionSide::Long);
        assert_eq!(p.entry_price, dec!(1000));
        assert_eq!(p.stop_loss_price, dec!(970));
        assert_eq!(p.take_profit_price, dec!(1060));
        assert_eq!(machine.stats().total_trades, 1);
    }

    #[test]
    fn short_entry_mirrors_the_brackets() {
        let machine = opened(PositionSide::Short);
        let p = machine.position();
        assert_eq!(p.stop_loss_price, dec!(1030));
        assert_eq!(p.take_profit_price, dec!(940));
    }

    #[test]
    fn long_entry_wins_over_short_entry() {
        let machine = PositionMachine::default();
        let both = Signal {
            long_open: true,
            short_open: true,
            ..signal()
        };
        match machine.decide(dec!(1000), &both) {
            Some(Transition::Open { side, .. }) => assert_eq!(side, PositionSide::Long),
            other => panic!("expected a long entry, got {:?}", other),
        }
    }

    #[test]
    fn flat_ignores_exit_intents() {
        let machine = PositionMachine::default();
        let exits = Signal {
            long_exit: true,
            short_exit: true,
            ..signal()
        };
        assert_eq!(machine.decide(dec!(1000), &exits), None);
    }

    #[test]
    fn stop_loss_takes_precedence_over_exit_signal() {
        let machine = opened(PositionSide::Long);
        let exit = Signal {
            long_exit: true,
            ..signal()
        };
        assert_eq!(
            machine.decide(dec!(965), &exit),
            Some(Transition::Close {
                reason: ExitReason::StopLoss
            })
        );
    }

    #[test]
    fn take_profit_takes_precedence_over_exit_signal() {
        let machine = opened(PositionSide::Short);
        let exit = Signal {
            short_exit: true,
            ..signal()
        };
        assert_eq!(
            machine.decide(dec!(940), &exit),
            Some(Transition::Close {
                reason: ExitReason::TakeProfit
            })
        );
    }

    #[test]
    fn exit_signal_only_fires_inside_the_brackets() {
        let mut machine = opened(PositionSide::Long);
        assert_eq!(machine.decide(dec!(1010), &signal()), None);

        let exit = Signal {
            long_exit: true,
            ..signal()
        };
        let t = machine.decide(dec!(1010), &exit).unwrap();
        machine.commit(&t);
        assert!(machine.side().is_flat());
        assert_eq!(machine.stats().signal_exits, 1);
        assert_eq!(t.target_volume(4), 0);
    }

    #[test]
    fn open_position_never_reenters() {
        let machine = opened(PositionSide::Long);
        let again = Signal {
            long_open: true,
            ..signal()
        };
        assert_eq!(machine.decide(dec!(1001), &again), None);
    }

    #[test]
    fn target_volume_is_signed_by_side() {
        let long = Transition::Open {
            side: PositionSide::Long,
            entry_price: dec!(1),
            stop_loss_price: dec!(0),
            take_profit_price: dec!(2),
        };
        let short = Transition::Open {
            side: PositionSide::Short,
            entry_price: dec!(1),
            stop_loss_price: dec!(2),
            take_profit_price: dec!(0),
        };
        assert_eq!(long.target_volume(3), 3);
        assert_eq!(short.target_volume(3), -3);
    }

    #[test]
    fn reset_keeps_counters() {
        let mut machine = opened(PositionSide::Short);
        machine.reset();
        assert!(machine.side().is_flat());
        assert_eq!(machine.stats().total_trades, 1);
        assert_eq!(machine.position().resolved_contract_id, None);
    }
}
