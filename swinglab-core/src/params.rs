//! Engine parameters: swing detection, classification, trend, signal and
//! trade-simulation settings for one analysis run.

use crate::domain::ConfigId;
use crate::error::EngineError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strictly the swing-type alternation must hold for a pattern to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    Ordered,
    Mixed,
    Disabled,
}

impl EntryMode {
    /// Numeric code: 1 → Ordered, 2 → Mixed, anything else → Disabled.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => EntryMode::Ordered,
            2 => EntryMode::Mixed,
            _ => EntryMode::Disabled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::Ordered => "Ordered",
            EntryMode::Mixed => "Mixed",
            EntryMode::Disabled => "Disabled",
        }
    }
}

impl FromStr for EntryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordered" => Ok(EntryMode::Ordered),
            "mixed" => Ok(EntryMode::Mixed),
            "disabled" | "none" | "off" => Ok(EntryMode::Disabled),
            other => other
                .parse::<i64>()
                .map(EntryMode::from_code)
                .map_err(|_| format!("unknown entry mode: {s}")),
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which trade directions may be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetDirection {
    Long,
    Short,
    Both,
}

impl TargetDirection {
    /// Numeric code: 1 → Long, 2 → Short, 3 → Both.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TargetDirection::Long),
            2 => Some(TargetDirection::Short),
            3 => Some(TargetDirection::Both),
            _ => None,
        }
    }

    pub fn allows_long(&self) -> bool {
        matches!(self, TargetDirection::Long | TargetDirection::Both)
    }

    pub fn allows_short(&self) -> bool {
        matches!(self, TargetDirection::Short | TargetDirection::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDirection::Long => "Long",
            TargetDirection::Short => "Short",
            TargetDirection::Both => "Both",
        }
    }
}

impl FromStr for TargetDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(TargetDirection::Long),
            "short" => Ok(TargetDirection::Short),
            "both" => Ok(TargetDirection::Both),
            other => other
                .parse::<i64>()
                .ok()
                .and_then(TargetDirection::from_code)
                .ok_or_else(|| format!("unknown target direction: {s}")),
        }
    }
}

impl fmt::Display for TargetDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profit-target and stop-loss distances for one direction, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitParams {
    pub profit_target_pct: f64,
    pub stop_loss_pct: f64,
}

impl Default for ExitParams {
    fn default() -> Self {
        Self {
            profit_target_pct: 2.0,
            stop_loss_pct: 2.0,
        }
    }
}

/// Complete parameter set for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    // ── Swings ──
    pub swing_lookback: usize,
    pub enable_min_swing_filter: bool,
    pub min_swing_pct: f64,

    // ── Trend ──
    /// Regression window in whole hours.
    pub trend_range_hours: u32,

    // ── Signals ──
    pub entry_mode: EntryMode,
    pub entry_count: usize,
    pub target_direction: TargetDirection,

    // ── Trades ──
    pub long_exits: ExitParams,
    pub short_exits: ExitParams,
    pub starting_balance: f64,
    pub leverage: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            swing_lookback: 7,
            enable_min_swing_filter: false,
            min_swing_pct: 0.08,
            trend_range_hours: 24,
            entry_mode: EntryMode::Ordered,
            entry_count: 1,
            target_direction: TargetDirection::Long,
            long_exits: ExitParams::default(),
            short_exits: ExitParams::default(),
            starting_balance: 10_000.0,
            leverage: 1.0,
        }
    }
}

impl EngineParams {
    /// Reject parameter sets the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.swing_lookback == 0 {
            return Err(EngineError::invalid("SwingLookback must be >= 1"));
        }
        if self.trend_range_hours == 0 {
            return Err(EngineError::invalid("TrendlineRange must be >= 1 hour"));
        }
        if self.entry_count == 0 {
            return Err(EngineError::invalid("EntryCount must be >= 1"));
        }
        if !(self.starting_balance.is_finite() && self.starting_balance > 0.0) {
            return Err(EngineError::invalid(format!(
                "StartingBalance must be positive, got {}",
                self.starting_balance
            )));
        }
        if !(self.leverage.is_finite() && self.leverage > 0.0) {
            return Err(EngineError::invalid(format!(
                "Leverage must be positive, got {}",
                self.leverage
            )));
        }
        let percentages = [
            ("MinSwingPct", self.min_swing_pct),
            ("L_ProfitTargetPercent", self.long_exits.profit_target_pct),
            ("L_StopLossPercent", self.long_exits.stop_loss_pct),
            ("S_ProfitTargetPercent", self.short_exits.profit_target_pct),
            ("S_StopLossPercent", self.short_exits.stop_loss_pct),
        ];
        for (name, value) in percentages {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Number of consecutive labeled swings a pattern spans.
    pub fn pattern_length(&self) -> usize {
        2 * self.entry_count + 1
    }

    /// Minimum swing magnitude when the filter is enabled.
    pub fn swing_filter(&self) -> Option<f64> {
        self.enable_min_swing_filter.then_some(self.min_swing_pct)
    }

    /// Trend regression window as a duration.
    pub fn trend_range(&self) -> Duration {
        Duration::hours(i64::from(self.trend_range_hours))
    }

    /// Deterministic ID of this parameter set.
    pub fn config_id(&self) -> ConfigId {
        // Struct fields serialize in declaration order, so the JSON is canonical.
        let json = serde_json::to_string(self).unwrap_or_default();
        ConfigId::from_hash(&blake3::hash(json.as_bytes()).to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = EngineParams::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.pattern_length(), 3);
        assert_eq!(p.swing_filter(), None);
        assert_eq!(p.trend_range(), Duration::hours(24));
    }

    #[test]
    fn rejects_zero_lookback() {
        let p = EngineParams {
            swing_lookback: 0,
            ..EngineParams::default()
        };
        assert!(matches!(
            p.validate(),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_non_positive_balance_and_range() {
        let p = EngineParams {
            starting_balance: 0.0,
            ..EngineParams::default()
        };
        assert!(p.validate().is_err());

        let p = EngineParams {
            trend_range_hours: 0,
            ..EngineParams::default()
        };
        assert!(p.validate().is_err());

        let p = EngineParams {
            entry_count: 0,
            ..EngineParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn widest_trend_range_is_representable() {
        let p = EngineParams {
            trend_range_hours: u32::MAX,
            ..EngineParams::default()
        };
        assert!(p.validate().is_ok());
        assert_eq!(p.trend_range(), Duration::hours(i64::from(u32::MAX)));
    }

    #[test]
    fn rejects_nan_percentage() {
        let p = EngineParams {
            short_exits: ExitParams {
                profit_target_pct: f64::NAN,
                stop_loss_pct: 2.0,
            },
            ..EngineParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn entry_mode_parsing() {
        assert_eq!("Ordered".parse::<EntryMode>(), Ok(EntryMode::Ordered));
        assert_eq!("mixed".parse::<EntryMode>(), Ok(EntryMode::Mixed));
        assert_eq!("disabled".parse::<EntryMode>(), Ok(EntryMode::Disabled));
        assert_eq!("2".parse::<EntryMode>(), Ok(EntryMode::Mixed));
        assert_eq!("0".parse::<EntryMode>(), Ok(EntryMode::Disabled));
        assert!("sideways".parse::<EntryMode>().is_err());
    }

    #[test]
    fn target_direction_parsing() {
        assert_eq!("Both".parse::<TargetDirection>(), Ok(TargetDirection::Both));
        assert_eq!("2".parse::<TargetDirection>(), Ok(TargetDirection::Short));
        assert!("4".parse::<TargetDirection>().is_err());
        assert!(TargetDirection::Both.allows_long());
        assert!(TargetDirection::Both.allows_short());
        assert!(!TargetDirection::Long.allows_short());
    }

    #[test]
    fn config_id_is_deterministic_and_param_sensitive() {
        let a = EngineParams::default();
        let b = EngineParams::default();
        assert_eq!(a.config_id(), b.config_id());

        let c = EngineParams {
            swing_lookback: 9,
            ..EngineParams::default()
        };
        assert_ne!(a.config_id(), c.config_id());
    }
}
