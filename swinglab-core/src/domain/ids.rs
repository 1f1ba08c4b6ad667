use serde::{Deserialize, Serialize};
use std::fmt;

/// A (symbol, timeframe) bar series. The trade simulator never carries state
/// across groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub symbol: String,
    pub timeframe: String,
}

impl GroupKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.timeframe)
    }
}

/// Run identifiers: which bar fetch and which parameterized analysis produced
/// an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub fetch_run_id: u32,
    pub analysis_run_id: u32,
}

impl RunKey {
    pub fn new(fetch_run_id: u32, analysis_run_id: u32) -> Self {
        Self {
            fetch_run_id,
            analysis_run_id,
        }
    }

    /// Directory-safe label, e.g. `3_17`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.fetch_run_id, self.analysis_run_id)
    }
}

impl Default for RunKey {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetch={} analysis={}",
            self.fetch_run_id, self.analysis_run_id
        )
    }
}

/// Deterministic parameter-set ID (BLAKE3 over the canonical JSON of the params).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigId(pub String);

impl ConfigId {
    pub fn from_hash(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_keys_order_by_symbol_then_timeframe() {
        let mut keys = vec![
            GroupKey::new("XBTUSD", "5m"),
            GroupKey::new("ETHUSD", "1h"),
            GroupKey::new("XBTUSD", "1h"),
        ];
        keys.sort();
        assert_eq!(keys[0], GroupKey::new("ETHUSD", "1h"));
        assert_eq!(keys[1], GroupKey::new("XBTUSD", "1h"));
        assert_eq!(keys[2], GroupKey::new("XBTUSD", "5m"));
    }

    #[test]
    fn run_key_label() {
        assert_eq!(RunKey::new(3, 17).label(), "3_17");
        assert_eq!(RunKey::default(), RunKey::new(1, 1));
    }
}
