//! Per-bar trade marks, ledger events and completed round trips.

use super::ids::GroupKey;
use super::position::{Direction, PriceLevels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event code recorded on the bar where a position opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryExit {
    Entry,
    Exit,
}

impl EntryExit {
    /// Numeric column value: 1.0 for an entry, 2.0 for an exit.
    pub fn as_f64(&self) -> f64 {
        match self {
            EntryExit::Entry => 1.0,
            EntryExit::Exit => 2.0,
        }
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if value == 1.0 {
            Some(EntryExit::Entry)
        } else if value == 2.0 {
            Some(EntryExit::Exit)
        } else {
            None
        }
    }
}

impl fmt::Display for EntryExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f64())
    }
}

/// The simulator's record for one bar, rounded for storage.
///
/// Flat bars carry only `in_trade = false`. While a position
/// is open every bar re-stamps the position terms, so a reader of any single
/// in-trade row sees the full position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeMark {
    pub in_trade: bool,
    pub entry_exit: Option<EntryExit>,
    pub long_short: Option<Direction>,
    pub starting_balance: Option<f64>,
    pub leverage: Option<f64>,
    pub quantity: Option<f64>,
    pub entry_price: Option<f64>,
    pub entry_cost: Option<f64>,
    pub long_levels: Option<PriceLevels>,
    pub short_levels: Option<PriceLevels>,
    pub exit_price: Option<f64>,
    pub exit_cost: Option<f64>,
    pub profit_loss: Option<f64>,
    pub ending_balance: Option<f64>,
}

impl TradeMark {
    pub fn is_entry(&self) -> bool {
        self.entry_exit == Some(EntryExit::Entry)
    }

    pub fn is_exit(&self) -> bool {
        self.entry_exit == Some(EntryExit::Exit)
    }
}

/// A ledger row: one bar on which a position opened or closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub group: GroupKey,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub entry_exit: EntryExit,
    pub direction: Direction,
    pub starting_balance: f64,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_cost: f64,
    pub exit_price: Option<f64>,
    pub exit_cost: Option<f64>,
    pub profit_loss: Option<f64>,
    pub ending_balance: Option<f64>,
}

impl TradeEvent {
    /// Build a ledger row from a bar's trade mark. Returns `None` for bars
    /// without an entry/exit event.
    pub fn from_mark(
        group: &GroupKey,
        bar_index: usize,
        timestamp: DateTime<Utc>,
        mark: &TradeMark,
    ) -> Option<Self> {
        let entry_exit = mark.entry_exit?;
        Some(Self {
            group: group.clone(),
            bar_index,
            timestamp,
            entry_exit,
            direction: mark.long_short?,
            starting_balance: mark.starting_balance?,
            quantity: mark.quantity?,
            entry_price: mark.entry_price?,
            entry_cost: mark.entry_cost?,
            exit_price: mark.exit_price,
            exit_cost: mark.exit_cost,
            profit_loss: mark.profit_loss,
            ending_balance: mark.ending_balance,
        })
    }

    pub fn is_exit(&self) -> bool {
        self.entry_exit == EntryExit::Exit
    }
}

/// A completed round trip: entry event paired with its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub symbol: String,
    pub timeframe: String,
    pub direction: Direction,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_cost: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_cost: f64,

    // ── Size ──
    pub quantity: f64,

    // ── PnL ──
    pub profit_loss: f64,
    pub starting_balance: f64,
    pub ending_balance: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl TradeRecord {
    /// Return on the trade as a fraction of the entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_cost == 0.0 {
            return 0.0;
        }
        self.profit_loss / self.entry_cost
    }

    pub fn is_winner(&self) -> bool {
        self.profit_loss > 0.0
    }
}
