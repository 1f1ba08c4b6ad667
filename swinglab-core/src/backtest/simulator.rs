//! Single-position trade simulator.
//!
//! Flat → InTrade on a bar carrying a buy or sell signal, when the previous
//! bar's recorded state allows an entry. InTrade bars re-stamp the position
//! terms and then check the target and stop against the close. The exit bar
//! never opens a new position, and the entry bar is never exit-checked.
//!
//! The running balance keeps full precision; every value written into a
//! `TradeMark` is rounded for storage.

use crate::domain::{Bar, Direction, EntryExit, GroupKey, Position, PriceLevels, SignalMark, TradeMark};
use crate::error::EngineError;
use crate::numeric::{money, price, quantity};
use crate::params::{EngineParams, ExitParams};

#[derive(Debug, Clone)]
pub struct TradeSimulator {
    leverage: f64,
    long_exits: ExitParams,
    short_exits: ExitParams,
    balance: f64,
    position: Option<Position>,
    prev_entry_exit: Option<EntryExit>,
    prev_in_trade: bool,
}

impl TradeSimulator {
    pub fn new(params: &EngineParams) -> Self {
        Self {
            leverage: params.leverage,
            long_exits: params.long_exits,
            short_exits: params.short_exits,
            balance: money(params.starting_balance),
            position: None,
            prev_entry_exit: None,
            prev_in_trade: false,
        }
    }

    /// Current realized balance (full precision).
    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// The entry guard, evaluated on the previous bar's recorded state.
    fn can_enter(&self) -> bool {
        match self.prev_entry_exit {
            None => !self.prev_in_trade,
            Some(EntryExit::Exit) => self.prev_in_trade,
            Some(EntryExit::Entry) => false,
        }
    }

    /// Process one bar of `group`.
    pub fn step(
        &mut self,
        group: &GroupKey,
        index: usize,
        bar: &Bar,
        signal: SignalMark,
    ) -> Result<TradeMark, EngineError> {
        let mark = match self.position.take() {
            Some(pos) => self.hold_or_exit(pos, bar.close),
            None if signal.any() && self.can_enter() => self.enter(group, index, bar, signal)?,
            None => TradeMark::default(),
        };
        self.prev_entry_exit = mark.entry_exit;
        self.prev_in_trade = mark.in_trade;
        Ok(mark)
    }

    fn enter(
        &mut self,
        group: &GroupKey,
        index: usize,
        bar: &Bar,
        signal: SignalMark,
    ) -> Result<TradeMark, EngineError> {
        let close = bar.close;
        if !(close.is_finite() && close > 0.0) {
            return Err(EngineError::NumericDegeneracy {
                group: group.clone(),
                bar_index: index,
                close,
            });
        }

        let (direction, exits) = if signal.buy_signal {
            (Direction::Long, self.long_exits)
        } else {
            (Direction::Short, self.short_exits)
        };
        let qty = self.balance * self.leverage / close;
        let pos = Position {
            direction,
            entry_bar: index,
            entry_time: bar.timestamp,
            entry_price: close,
            quantity: qty,
            entry_cost: close * qty,
            levels: PriceLevels::for_entry(
                direction,
                close,
                exits.profit_target_pct,
                exits.stop_loss_pct,
            ),
            starting_balance: self.balance,
        };

        let mut mark = self.position_mark(&pos);
        mark.entry_exit = Some(EntryExit::Entry);
        self.position = Some(pos);
        Ok(mark)
    }

    fn hold_or_exit(&mut self, pos: Position, close: f64) -> TradeMark {
        let mut mark = self.position_mark(&pos);
        if !pos.should_exit(close) {
            self.position = Some(pos);
            return mark;
        }

        let exit_cost = close * pos.quantity;
        let profit_loss = pos.realized_pnl(exit_cost);
        self.balance += profit_loss;

        mark.entry_exit = Some(EntryExit::Exit);
        mark.exit_price = Some(price(close));
        mark.exit_cost = Some(money(exit_cost));
        mark.profit_loss = Some(money(profit_loss));
        mark.ending_balance = Some(money(self.balance));
        mark
    }

    /// In-trade columns shared by entry, hold and exit bars.
    fn position_mark(&self, pos: &Position) -> TradeMark {
        let levels = PriceLevels {
            target: price(pos.levels.target),
            stop: price(pos.levels.stop),
        };
        TradeMark {
            in_trade: true,
            long_short: Some(pos.direction),
            starting_balance: Some(money(pos.starting_balance)),
            leverage: Some(self.leverage),
            quantity: Some(quantity(pos.quantity)),
            entry_price: Some(price(pos.entry_price)),
            entry_cost: Some(money(pos.entry_cost)),
            long_levels: (pos.direction == Direction::Long).then_some(levels),
            short_levels: (pos.direction == Direction::Short).then_some(levels),
            ..TradeMark::default()
        }
    }
}
