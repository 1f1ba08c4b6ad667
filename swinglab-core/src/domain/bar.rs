//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::GroupKey;

/// OHLCV bar for a single symbol on a single timeframe.
///
/// Bars are immutable once produced by the data source. The engine never
/// mutates them; derived fields live alongside in `AnnotatedBar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// The (symbol, timeframe) group this bar belongs to.
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(&self.symbol, &self.timeframe)
    }

    /// True if this bar belongs to `key`.
    pub fn is_in_group(&self, key: &GroupKey) -> bool {
        self.symbol == key.symbol && self.timeframe == key.timeframe
    }
}
