//! Trade ledger: the entry/exit events of a run and the round trips built
//! from them.

use crate::domain::{EntryExit, TradeEvent, TradeRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mark-to-market equity after one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    events: Vec<TradeEvent>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<TradeEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[TradeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TradeEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Exit events only.
    pub fn exits(&self) -> impl Iterator<Item = &TradeEvent> {
        self.events.iter().filter(|e| e.is_exit())
    }

    /// Pair each entry with the next exit of the same group. An entry with no
    /// exit (position still open at the end of data) yields no record.
    pub fn round_trips(&self) -> Vec<TradeRecord> {
        let mut open: Vec<&TradeEvent> = Vec::new();
        let mut trades = Vec::new();

        for event in &self.events {
            match event.entry_exit {
                EntryExit::Entry => {
                    open.retain(|e| e.group != event.group);
                    open.push(event);
                }
                EntryExit::Exit => {
                    let Some(pos) = open.iter().position(|e| e.group == event.group) else {
                        continue;
                    };
                    let entry = open.swap_remove(pos);
                    trades.push(TradeRecord {
                        symbol: entry.group.symbol.clone(),
                        timeframe: entry.group.timeframe.clone(),
                        direction: entry.direction,
                        entry_bar: entry.bar_index,
                        entry_time: entry.timestamp,
                        entry_price: entry.entry_price,
                        entry_cost: entry.entry_cost,
                        exit_bar: event.bar_index,
                        exit_time: event.timestamp,
                        exit_price: event.exit_price.unwrap_or(f64::NAN),
                        exit_cost: event.exit_cost.unwrap_or(f64::NAN),
                        quantity: entry.quantity,
                        profit_loss: event.profit_loss.unwrap_or(0.0),
                        starting_balance: entry.starting_balance,
                        ending_balance: event.ending_balance.unwrap_or(entry.starting_balance),
                        bars_held: event.bar_index.saturating_sub(entry.bar_index),
                    });
                }
            }
        }
        trades
    }
}
