//! Incremental runs: feed bars through resumable group engines, committing
//! each poll cycle to the run store before polling again.
//!
//! Bars at or before a group's last committed timestamp are treated as
//! already processed and skipped, so a source may re-deliver overlapping
//! windows. Cancellation is a shared flag checked between cycles.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use swinglab_core::domain::{GroupKey, TradeEvent};
use swinglab_core::engine::group_bars;
use swinglab_core::{AnnotatedBar, Bar, EngineError, EngineParams, GroupEngine, RunKey};

use crate::data_loader::LoadError;
use crate::runner::{assemble, events_by_group, rows_by_group, Provenance, RunError};
use crate::store::{FailedGroup, RunArtifacts, RunStore};

/// A source of new bars, polled once per cycle.
pub trait BarSource {
    /// The next batch of bars, `None` once the source is exhausted.
    fn poll(&mut self) -> Result<Option<Vec<Bar>>, LoadError>;
}

/// Replays a fixed bar set in timestamp order, `chunk` bars per poll.
#[derive(Debug)]
pub struct ChunkedReplay {
    bars: std::vec::IntoIter<Bar>,
    chunk: usize,
}

impl ChunkedReplay {
    pub fn new(mut bars: Vec<Bar>, chunk: usize) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            bars: bars.into_iter(),
            chunk: chunk.max(1),
        }
    }
}

impl BarSource for ChunkedReplay {
    fn poll(&mut self) -> Result<Option<Vec<Bar>>, LoadError> {
        let batch: Vec<Bar> = self.bars.by_ref().take(self.chunk).collect();
        Ok((!batch.is_empty()).then_some(batch))
    }
}

/// What one committed cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub processed: usize,
    pub skipped: usize,
    pub events: usize,
    pub failed: Vec<GroupKey>,
}

pub struct LiveSession<'a> {
    run: RunKey,
    params: EngineParams,
    store: &'a dyn RunStore,
    engines: BTreeMap<GroupKey, GroupEngine>,
    failed: BTreeMap<GroupKey, String>,
    stop: Arc<AtomicBool>,
    cycles: usize,
}

impl<'a> LiveSession<'a> {
    /// Open a session for `run`, resuming every group already in the store.
    pub fn open(
        run: RunKey,
        params: &EngineParams,
        store: &'a dyn RunStore,
    ) -> Result<Self, RunError> {
        params.validate()?;
        let stored = store.load_annotated(run)?;
        let stored_rows = stored.len();

        let mut engines = BTreeMap::new();
        let mut failed = BTreeMap::new();
        for (group, rows) in rows_by_group(stored) {
            match GroupEngine::resume(group.clone(), params, &rows) {
                Ok(engine) => {
                    engines.insert(group, engine);
                }
                Err(error) => {
                    warn!(group = %group, error = %error, "stored group cannot be resumed");
                    failed.insert(group, error.to_string());
                }
            }
        }
        info!(run = %run, groups = engines.len(), rows = stored_rows, "live session open");

        Ok(Self {
            run,
            params: params.clone(),
            store,
            engines,
            failed,
            stop: Arc::new(AtomicBool::new(false)),
            cycles: 0,
        })
    }

    /// Set the returned flag to stop the session after the current cycle.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn failed_groups(&self) -> &BTreeMap<GroupKey, String> {
        &self.failed
    }

    /// Process one batch of bars and commit the new rows.
    ///
    /// A group that errors is dropped for the rest of the session. The rows
    /// it produced before the failing bar are still committed, matching what
    /// a batch run keeps for a failed group.
    pub fn process_cycle(&mut self, bars: Vec<Bar>) -> Result<CycleReport, RunError> {
        let mut report = CycleReport::default();
        let mut rows: Vec<AnnotatedBar> = Vec::new();
        let mut events: Vec<TradeEvent> = Vec::new();

        for (group, series) in group_bars(bars) {
            if self.failed.contains_key(&group) {
                report.skipped += series.len();
                continue;
            }
            let engine = match self.engines.entry(group.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => v.insert(GroupEngine::new(group.clone(), &self.params)?),
            };

            let fed = feed(engine, series);
            report.processed += fed.rows.len();
            report.skipped += fed.skipped;
            rows.extend(fed.rows);
            events.extend(engine.drain_events());

            if let Some(error) = fed.error {
                warn!(group = %group, error = %error, "group failed, dropping it from the session");
                self.engines.remove(&group);
                self.failed.insert(group.clone(), error.to_string());
                report.failed.push(group);
            }
        }

        report.events = events.len();
        self.store.append_cycle(self.run, &rows, &events)?;
        self.cycles += 1;
        debug!(
            run = %self.run,
            cycle = self.cycles,
            processed = report.processed,
            skipped = report.skipped,
            events = report.events,
            "cycle committed"
        );
        Ok(report)
    }

    /// Poll `source` until it is exhausted or a stop is requested.
    pub fn run(&mut self, source: &mut dyn BarSource) -> Result<usize, RunError> {
        let start = self.cycles;
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!(run = %self.run, "stop requested");
                break;
            }
            let Some(bars) = source.poll()? else {
                break;
            };
            self.process_cycle(bars)?;
        }
        Ok(self.cycles - start)
    }

    /// Write the summary and manifest for everything stored under this run.
    pub fn finish(self, provenance: &Provenance) -> Result<RunArtifacts, RunError> {
        let annotated = self.store.load_annotated(self.run)?;
        let ledger = self.store.load_ledger(self.run)?;
        let failed = self
            .failed
            .into_iter()
            .map(|(group, error)| FailedGroup { group, error })
            .collect();

        let artifacts = assemble(self.run, &self.params, provenance, annotated, ledger, failed);
        self.store.save_reports(&artifacts)?;
        info!(
            run = %self.run,
            cycles = self.cycles,
            exits = artifacts.summary.exit_count,
            "live session finished"
        );
        Ok(artifacts)
    }
}

struct Fed {
    rows: Vec<AnnotatedBar>,
    skipped: usize,
    error: Option<EngineError>,
}

/// Push `series` into `engine`, stopping at the first bar it rejects.
fn feed(engine: &mut GroupEngine, series: Vec<Bar>) -> Fed {
    let committed = engine.last_timestamp();
    let mut fed = Fed {
        rows: Vec::with_capacity(series.len()),
        skipped: 0,
        error: None,
    };
    for bar in series {
        if committed.is_some_and(|last| bar.timestamp <= last) {
            fed.skipped += 1;
            continue;
        }
        match engine.push(bar) {
            Ok(row) => fed.rows.push(row),
            Err(error) => {
                fed.error = Some(error);
                break;
            }
        }
    }
    fed
}

/// Check that an incremental run produced exactly what a batch run over the
/// same bars produced.
pub fn verify(replayed: &RunArtifacts, batch: &RunArtifacts) -> Result<(), RunError> {
    let divergence = |group: &GroupKey, detail: String| RunError::Divergence {
        group: group.clone(),
        detail,
    };

    let failed = |a: &RunArtifacts| -> Vec<GroupKey> {
        a.manifest
            .failed_groups
            .iter()
            .map(|f| f.group.clone())
            .collect()
    };
    if failed(replayed) != failed(batch) {
        let group = failed(batch)
            .into_iter()
            .chain(failed(replayed))
            .next()
            .unwrap_or_else(|| GroupKey::new("", ""));
        return Err(divergence(&group, "failed groups differ".into()));
    }

    let replay_rows = rows_by_group(replayed.annotated.clone());
    let batch_rows = rows_by_group(batch.annotated.clone());
    for (group, expected) in &batch_rows {
        let Some(actual) = replay_rows.get(group) else {
            return Err(divergence(group, "group missing from replay".into()));
        };
        if actual.len() != expected.len() {
            return Err(divergence(
                group,
                format!("{} rows, expected {}", actual.len(), expected.len()),
            ));
        }
        if let Some((a, _)) = actual.iter().zip(expected).find(|(a, e)| a != e) {
            return Err(divergence(
                group,
                format!("row at {} differs", a.bar.timestamp),
            ));
        }
    }
    if let Some(extra) = replay_rows.keys().find(|g| !batch_rows.contains_key(*g)) {
        return Err(divergence(extra, "group missing from batch run".into()));
    }

    let replay_events = events_by_group(replayed.ledger.clone());
    for (group, expected) in events_by_group(batch.ledger.clone()) {
        if replay_events.get(&group) != Some(&expected) {
            return Err(divergence(&group, "ledger differs".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{execute, run_batch};
    use chrono::{Duration, TimeZone, Utc};
    use crate::store::FileStore;
    use crate::config::{DataSource, RunConfig, SyntheticSpec};
    use crate::data_loader;

    fn config(dir: &std::path::Path) -> RunConfig {
        RunConfig {
            run: RunKey::new(2, 5),
            log_level: None,
            output_dir: dir.to_path_buf(),
            data: DataSource::Synthetic(SyntheticSpec {
                symbols: vec!["AAA".into(), "BBB".into()],
                timeframe: "1h".into(),
                bars: 300,
                seed: 11,
            }),
            params: EngineParams {
                swing_lookback: 4,
                entry_mode: swinglab_core::EntryMode::Mixed,
                target_direction: swinglab_core::TargetDirection::Both,
                trend_range_hours: 6,
                ..EngineParams::default()
            },
        }
    }

    fn replay(cfg: &RunConfig, store: &FileStore, chunk: usize) -> RunArtifacts {
        let loaded = data_loader::load(&cfg.data).unwrap();
        let provenance = Provenance {
            dataset_hash: loaded.dataset_hash.clone(),
            synthetic: loaded.synthetic,
        };
        let mut session = LiveSession::open(cfg.run, &cfg.params, store).unwrap();
        session
            .run(&mut ChunkedReplay::new(loaded.bars, chunk))
            .unwrap();
        session.finish(&provenance).unwrap()
    }

    #[test]
    fn chunked_replay_matches_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let batch = run_batch(&cfg, false).unwrap();

        for chunk in [1, 7, 1000] {
            let store = FileStore::new(dir.path().join(format!("chunk{chunk}")));
            let replayed = replay(&cfg, &store, chunk);
            verify(&replayed, &batch).unwrap();
            assert_eq!(replayed.summary, batch.summary);
            assert_eq!(replayed.manifest, batch.manifest);
            assert_eq!(replayed.portfolio, batch.portfolio);
        }
    }

    #[test]
    fn resumed_session_continues_where_it_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let batch = run_batch(&cfg, false).unwrap();
        let store = FileStore::new(dir.path());
        let bars = data_loader::load(&cfg.data).unwrap().bars;

        // First session sees only the first half of every series.
        let half: Vec<Bar> = bars
            .iter()
            .filter(|b| b.timestamp < bars[150].timestamp)
            .cloned()
            .collect();
        {
            let mut first = LiveSession::open(cfg.run, &cfg.params, &store).unwrap();
            first.run(&mut ChunkedReplay::new(half, 25)).unwrap();
        }

        // Second session re-delivers everything; committed bars are skipped.
        let replayed = replay(&cfg, &store, 40);
        verify(&replayed, &batch).unwrap();
    }

    #[test]
    fn stop_flag_halts_before_next_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let store = FileStore::new(dir.path());
        let bars = data_loader::load(&cfg.data).unwrap().bars;

        let mut session = LiveSession::open(cfg.run, &cfg.params, &store).unwrap();
        session.stop_handle().store(true, Ordering::SeqCst);
        assert_eq!(session.run(&mut ChunkedReplay::new(bars, 10)).unwrap(), 0);
        assert!(store.load_annotated(cfg.run).unwrap().is_empty());
    }

    fn rising(symbol: &str, n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Bar {
                    timestamp: start + Duration::hours(i as i64),
                    symbol: symbol.into(),
                    timeframe: "1h".into(),
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn group_failing_mid_stream_stores_what_batch_stores() {
        let params = EngineParams {
            swing_lookback: 1,
            entry_mode: swinglab_core::EntryMode::Mixed,
            trend_range_hours: 2,
            ..EngineParams::default()
        };
        let run = RunKey::new(4, 1);
        let clean = execute(rising("AAA", 12), &params, false).unwrap();
        let entry = clean.groups[0].ledger.events()[0].bar_index;

        let mut bars = rising("AAA", 12);
        bars[entry].close = 0.0;
        bars.extend(rising("BBB", 12));

        let out = execute(bars.clone(), &params, false).unwrap();
        let failed = out
            .failed_groups
            .iter()
            .map(|f| FailedGroup {
                group: f.group.clone(),
                error: f.error.to_string(),
            })
            .collect();
        let (rows, ledger) = out.into_stored();
        let batch = assemble(run, &params, &Provenance::default(), rows, ledger, failed);

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut session = LiveSession::open(run, &params, &store).unwrap();
        session.run(&mut ChunkedReplay::new(bars, 2)).unwrap();
        let replayed = session.finish(&Provenance::default()).unwrap();

        verify(&replayed, &batch).unwrap();
        assert_eq!(replayed.manifest, batch.manifest);
        let aaa = replayed
            .annotated
            .iter()
            .filter(|r| r.bar.symbol == "AAA")
            .count();
        assert_eq!(aaa, entry);
    }

    #[test]
    fn failing_group_is_dropped_and_others_commit() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let store = FileStore::new(dir.path());
        let mut bars = data_loader::load(&cfg.data).unwrap().bars;
        bars.truncate(20); // AAA only
        let dup = bars[3].clone();
        let mut other = bars.clone();
        for b in &mut other {
            b.symbol = "BBB".into();
        }

        let mut session = LiveSession::open(cfg.run, &cfg.params, &store).unwrap();
        let mut cycle = bars.clone();
        cycle.push(dup);
        cycle.extend(other);
        let report = session.process_cycle(cycle).unwrap();

        assert_eq!(report.failed, vec![GroupKey::new("AAA", "1h")]);
        // AAA keeps the four bars before the duplicate.
        assert_eq!(report.processed, 24);
        let stored = store.load_annotated(cfg.run).unwrap();
        assert_eq!(stored.iter().filter(|r| r.bar.symbol == "AAA").count(), 4);
        assert_eq!(stored.iter().filter(|r| r.bar.symbol == "BBB").count(), 20);

        // Later bars for the failed group are ignored.
        let report = session.process_cycle(bars).unwrap();
        assert_eq!(report.skipped, 20);
    }
}
