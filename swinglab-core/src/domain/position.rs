use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "Long",
            Direction::Short => "Short",
        }
    }

    /// +1.0 for long, -1.0 for short. Applied to the cost difference so a
    /// short gains when the price falls.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Long" => Ok(Direction::Long),
            "Short" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Profit-target and stop-loss prices, fixed at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub target: f64,
    pub stop: f64,
}

impl PriceLevels {
    /// Levels for an entry at `close`. Percentages are in percent units; the
    /// stop distance always uses the absolute value of `stop_pct`.
    pub fn for_entry(direction: Direction, close: f64, target_pct: f64, stop_pct: f64) -> Self {
        match direction {
            Direction::Long => Self {
                target: close * (1.0 + target_pct / 100.0),
                stop: close * (1.0 - stop_pct.abs() / 100.0),
            },
            Direction::Short => Self {
                target: close * (1.0 - target_pct / 100.0),
                stop: close * (1.0 + stop_pct.abs() / 100.0),
            },
        }
    }

    /// True when `close` reaches the target or the stop for `direction`.
    pub fn is_hit(&self, direction: Direction, close: f64) -> bool {
        match direction {
            Direction::Long => close >= self.target || close <= self.stop,
            Direction::Short => close <= self.target || close >= self.stop,
        }
    }
}

/// The simulator's open position. Exists only between an entry and its exit.
///
/// `quantity` and `entry_cost` are positive for both directions; the
/// direction enters only through the sign of the profit/loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_cost: f64,
    pub levels: PriceLevels,
    /// Balance at the moment of entry (full precision).
    pub starting_balance: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    /// Profit/loss of closing at a total cost of `exit_cost`.
    pub fn realized_pnl(&self, exit_cost: f64) -> f64 {
        self.direction.sign() * (exit_cost - self.entry_cost)
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.realized_pnl(self.market_value(current_price))
    }

    pub fn should_exit(&self, close: f64) -> bool {
        self.levels.is_hit(self.direction, close)
    }
}
