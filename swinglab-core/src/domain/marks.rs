//! Per-bar analysis annotations: swings, trend and signals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a swing relative to the prior swing of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwingType {
    /// Higher high.
    HH,
    /// Lower high.
    LH,
    /// Higher low.
    HL,
    /// Lower low.
    LL,
}

impl SwingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwingType::HH => "HH",
            SwingType::LH => "LH",
            SwingType::HL => "HL",
            SwingType::LL => "LL",
        }
    }

    /// HH and HL: structure of an up-move.
    pub fn is_bullish(&self) -> bool {
        matches!(self, SwingType::HH | SwingType::HL)
    }

    /// LH and LL: structure of a down-move.
    pub fn is_bearish(&self) -> bool {
        matches!(self, SwingType::LH | SwingType::LL)
    }
}

impl fmt::Display for SwingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HH" => Ok(SwingType::HH),
            "LH" => Ok(SwingType::LH),
            "HL" => Ok(SwingType::HL),
            "LL" => Ok(SwingType::LL),
            other => Err(format!("unknown swing type '{other}'")),
        }
    }
}

/// Swing flags for one bar.
///
/// A bar can be both a swing high and a swing low; the two detections run
/// independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingMark {
    pub is_swing_high: bool,
    pub is_swing_low: bool,
    pub swing_type: Option<SwingType>,
}

impl SwingMark {
    pub fn is_swing(&self) -> bool {
        self.is_swing_high || self.is_swing_low
    }
}

/// Trend label derived from the regression slope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Upward,
    Downward,
    #[default]
    Sideways,
}

impl Trend {
    /// Upward for a positive slope, Downward for a negative one, Sideways
    /// for zero or a missing slope.
    pub fn from_slope(slope: Option<f64>) -> Self {
        match slope {
            Some(s) if s > 0.0 => Trend::Upward,
            Some(s) if s < 0.0 => Trend::Downward,
            _ => Trend::Sideways,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Upward => "Upward",
            Trend::Downward => "Downward",
            Trend::Sideways => "Sideways",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Upward" => Ok(Trend::Upward),
            "Downward" => Ok(Trend::Downward),
            "Sideways" => Ok(Trend::Sideways),
            other => Err(format!("unknown trend '{other}'")),
        }
    }
}

/// Regression slope and trend for one bar. `slope` is `None` until a full
/// window of the configured span exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendMark {
    pub slope: Option<f64>,
    pub trend: Trend,
}

impl TrendMark {
    pub fn from_slope(slope: Option<f64>) -> Self {
        Self {
            slope,
            trend: Trend::from_slope(slope),
        }
    }
}

/// Entry signals for one bar. Buy and sell never both fire on the same bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMark {
    pub buy_signal: bool,
    pub sell_signal: bool,
}

impl SignalMark {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn buy() -> Self {
        Self {
            buy_signal: true,
            sell_signal: false,
        }
    }

    pub fn sell() -> Self {
        Self {
            buy_signal: false,
            sell_signal: true,
        }
    }

    pub fn any(&self) -> bool {
        self.buy_signal || self.sell_signal
    }
}
