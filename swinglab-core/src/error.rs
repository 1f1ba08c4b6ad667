//! Engine errors.
//!
//! Insufficient history is not an error: stages emit null/default marks until
//! enough bars exist. Everything here aborts processing of a single group.

use crate::domain::GroupKey;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("numeric degeneracy in {group} at bar {bar_index}: entry close {close}")]
    NumericDegeneracy {
        group: GroupKey,
        bar_index: usize,
        close: f64,
    },

    #[error("bar out of order in {group}: {timestamp} is not after {last}")]
    OutOfOrder {
        group: GroupKey,
        last: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("duplicate timestamp {timestamp} in {group}")]
    DuplicateTimestamp {
        group: GroupKey,
        timestamp: DateTime<Utc>,
    },

    #[error("bar for {found} pushed into engine for {expected}")]
    GroupMismatch { expected: GroupKey, found: GroupKey },
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn errors_clone_into_stored_failures() {
        let err = EngineError::DuplicateTimestamp {
            group: GroupKey::new("XBTUSD", "1h"),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let kept = vec![err.clone()];
        assert_eq!(kept[0], err);
        assert_eq!(kept[0].to_string(), err.to_string());
    }
}
