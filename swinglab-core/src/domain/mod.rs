//! Domain types for SwingLab

pub mod bar;
pub mod ids;
pub mod marks;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use ids::{ConfigId, GroupKey, RunKey};
pub use marks::{SignalMark, SwingMark, SwingType, Trend, TrendMark};
pub use position::{Direction, Position, PriceLevels};
pub use trade::{EntryExit, TradeEvent, TradeMark, TradeRecord};

use serde::{Deserialize, Serialize};

/// A bar together with every stage's annotation for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedBar {
    pub bar: Bar,
    pub swing: SwingMark,
    pub trend: TrendMark,
    pub signal: SignalMark,
    pub trade: TradeMark,
}
