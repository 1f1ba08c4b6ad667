//! Batch helpers: group and sort a complete bar set, run one group through a
//! fresh engine.

use super::group::GroupEngine;
use crate::backtest::TradeLedger;
use crate::domain::{AnnotatedBar, Bar, GroupKey, TradeEvent};
use crate::error::EngineError;
use crate::params::EngineParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Output of one (symbol, timeframe) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRun {
    pub group: GroupKey,
    pub bars: Vec<AnnotatedBar>,
    pub ledger: TradeLedger,
}

impl GroupRun {
    fn empty(group: GroupKey) -> Self {
        Self {
            group,
            bars: Vec::new(),
            ledger: TradeLedger::new(),
        }
    }
}

/// A group that stopped on an error.
///
/// `partial` holds every row and ledger event produced before the failing
/// bar. An incremental session commits exactly that prefix before dropping
/// the group, so both modes store the same rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFailure {
    pub group: GroupKey,
    pub error: EngineError,
    pub partial: GroupRun,
}

/// Output of a run over every group in the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    pub groups: Vec<GroupRun>,
    pub failed_groups: Vec<GroupFailure>,
}

impl RunOutput {
    /// True when the input contained no bars at all.
    pub fn nothing_to_process(&self) -> bool {
        self.groups.is_empty() && self.failed_groups.is_empty()
    }

    /// Every stored row and ledger event, failed groups' prefixes included.
    pub fn into_stored(self) -> (Vec<AnnotatedBar>, Vec<TradeEvent>) {
        let mut rows = Vec::new();
        let mut events = Vec::new();
        let runs = self
            .groups
            .into_iter()
            .chain(self.failed_groups.into_iter().map(|f| f.partial));
        for run in runs {
            rows.extend(run.bars);
            events.extend(run.ledger.into_events());
        }
        (rows, events)
    }
}

/// Split bars into (symbol, timeframe) groups, each sorted by timestamp.
pub fn group_bars(bars: Vec<Bar>) -> BTreeMap<GroupKey, Vec<Bar>> {
    let mut groups: BTreeMap<GroupKey, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        groups.entry(bar.group_key()).or_default().push(bar);
    }
    for series in groups.values_mut() {
        series.sort_by_key(|b| b.timestamp);
    }
    groups
}

/// Run one group's complete, sorted history through a fresh engine.
pub fn run_group(
    group: GroupKey,
    bars: Vec<Bar>,
    params: &EngineParams,
) -> Result<GroupRun, GroupFailure> {
    let mut engine = match GroupEngine::new(group.clone(), params) {
        Ok(engine) => engine,
        Err(error) => {
            return Err(GroupFailure {
                partial: GroupRun::empty(group.clone()),
                group,
                error,
            })
        }
    };

    let mut annotated = Vec::with_capacity(bars.len());
    let mut failure = None;
    for bar in bars {
        match engine.push(bar) {
            Ok(row) => annotated.push(row),
            Err(error) => {
                failure = Some(error);
                break;
            }
        }
    }

    let run = GroupRun {
        group: group.clone(),
        bars: annotated,
        ledger: TradeLedger::from_events(engine.drain_events()),
    };
    match failure {
        Some(error) => Err(GroupFailure {
            group,
            error,
            partial: run,
        }),
        None => {
            debug!(
                group = %group,
                bars = run.bars.len(),
                events = run.ledger.len(),
                "group complete"
            );
            Ok(run)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::make_close_bars;
    use crate::params::EntryMode;

    fn group() -> GroupKey {
        GroupKey::new("TEST", "1h")
    }

    #[test]
    fn invalid_params_fail_before_processing() {
        let p = EngineParams {
            starting_balance: -1.0,
            ..EngineParams::default()
        };
        let failure = run_group(group(), make_close_bars(&[1.0]), &p).unwrap_err();
        assert!(matches!(failure.error, EngineError::InvalidConfiguration(_)));
        assert!(failure.partial.bars.is_empty());
    }

    #[test]
    fn groups_are_sorted_and_split() {
        let mut bars = make_close_bars(&[1.0, 2.0, 3.0]);
        bars.reverse();
        let mut other = make_close_bars(&[5.0, 6.0]);
        for b in &mut other {
            b.symbol = "AAA".into();
        }
        bars.extend(other);

        let groups = group_bars(bars);
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec![GroupKey::new("AAA", "1h"), GroupKey::new("TEST", "1h")]);
        let test = &groups[&group()];
        assert!(test.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn duplicate_timestamp_keeps_rows_before_it() {
        let mut bars = make_close_bars(&[1.0, 2.0, 3.0]);
        bars.insert(2, bars[1].clone());

        let failure = run_group(group(), bars, &EngineParams::default()).unwrap_err();
        assert!(matches!(failure.error, EngineError::DuplicateTimestamp { .. }));
        assert_eq!(failure.partial.bars.len(), 2);
    }

    #[test]
    fn degenerate_entry_keeps_prefix_and_its_ledger() {
        let p = EngineParams {
            swing_lookback: 1,
            entry_mode: EntryMode::Mixed,
            trend_range_hours: 2,
            ..EngineParams::default()
        };
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let clean = run_group(group(), make_close_bars(&closes), &p).unwrap();
        let first_entry = clean
            .ledger
            .events()
            .iter()
            .find(|e| e.entry_exit == crate::domain::EntryExit::Entry)
            .map(|e| e.bar_index)
            .unwrap();

        let mut bars = make_close_bars(&closes);
        bars[first_entry].close = 0.0;
        let failure = run_group(group(), bars, &p).unwrap_err();
        assert!(matches!(
            failure.error,
            EngineError::NumericDegeneracy { bar_index, .. } if bar_index == first_entry
        ));
        assert_eq!(failure.partial.bars, clean.bars[..first_entry].to_vec());
        assert!(failure.partial.ledger.is_empty());
    }

    #[test]
    fn stored_output_includes_failed_prefixes() {
        let ok = run_group(group(), make_close_bars(&[1.0, 2.0]), &EngineParams::default())
            .unwrap();
        let mut dup = make_close_bars(&[1.0, 2.0, 3.0]);
        for b in &mut dup {
            b.symbol = "BAD".into();
        }
        dup.push(dup[2].clone());
        let failure = run_group(GroupKey::new("BAD", "1h"), dup, &EngineParams::default())
            .unwrap_err();

        let out = RunOutput {
            groups: vec![ok],
            failed_groups: vec![failure],
        };
        assert!(!out.nothing_to_process());
        let (rows, _) = out.into_stored();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows.iter().filter(|r| r.bar.symbol == "BAD").count(), 3);
    }
}
