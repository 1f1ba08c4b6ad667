//! Batch runs: load bars, fan groups out across threads, assemble artifacts.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use swinglab_core::domain::{GroupKey, TradeEvent};
use swinglab_core::engine::{group_bars, run_group, GroupFailure, GroupRun, RunOutput};
use swinglab_core::{AnnotatedBar, Bar, EngineError, EngineParams, RunKey};

use crate::config::{ConfigError, RunConfig};
use crate::data_loader::{self, LoadError};
use crate::metrics::{equity_from_rows, PerformanceMetrics};
use crate::store::{
    FailedGroup, GroupReport, RunArtifacts, RunManifest, RunStore, StoreError, SCHEMA_VERSION,
};
use crate::portfolio::daily_balances;
use crate::summary::summarize;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("incremental result differs from batch for {group}: {detail}")]
    Divergence { group: GroupKey, detail: String },
}

/// Where a run's bars came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub dataset_hash: String,
    pub synthetic: bool,
}

/// Run every group through a fresh engine.
///
/// Groups are independent, so with `parallel` they run on the rayon pool.
/// Results keep group order either way. Invalid parameters fail before any
/// bar is touched; a failing group is collected, with the rows it produced
/// before the error, and the rest still run.
pub fn execute(
    bars: Vec<Bar>,
    params: &EngineParams,
    parallel: bool,
) -> Result<RunOutput, EngineError> {
    params.validate()?;
    if bars.is_empty() {
        info!("no bars, nothing to process");
        return Ok(RunOutput::default());
    }

    let groups: Vec<(GroupKey, Vec<Bar>)> = group_bars(bars).into_iter().collect();
    let run = |(group, series): (GroupKey, Vec<Bar>)| run_group(group, series, params);
    let results: Vec<Result<GroupRun, GroupFailure>> = if parallel {
        groups.into_par_iter().map(run).collect()
    } else {
        groups.into_iter().map(run).collect()
    };

    let mut output = RunOutput::default();
    for result in results {
        match result {
            Ok(run) => output.groups.push(run),
            Err(failure) => {
                warn!(
                    group = %failure.group,
                    error = %failure.error,
                    kept = failure.partial.bars.len(),
                    "group failed"
                );
                output.failed_groups.push(failure);
            }
        }
    }
    Ok(output)
}

/// Split stored rows back into their groups, keeping row order.
pub fn rows_by_group(rows: Vec<AnnotatedBar>) -> BTreeMap<GroupKey, Vec<AnnotatedBar>> {
    let mut groups: BTreeMap<GroupKey, Vec<AnnotatedBar>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.bar.group_key()).or_default().push(row);
    }
    groups
}

/// Split ledger rows into their groups, keeping row order.
pub fn events_by_group(events: Vec<TradeEvent>) -> BTreeMap<GroupKey, Vec<TradeEvent>> {
    let mut groups: BTreeMap<GroupKey, Vec<TradeEvent>> = BTreeMap::new();
    for event in events {
        groups.entry(event.group.clone()).or_default().push(event);
    }
    groups
}

/// Build the stored form of a run from its rows and ledger.
///
/// Rows and events are put in group order; per-group metrics come from the
/// stored trade marks, so a replayed run reports the same numbers as a batch
/// run over the same bars.
pub fn assemble(
    run: RunKey,
    params: &EngineParams,
    provenance: &Provenance,
    annotated: Vec<AnnotatedBar>,
    ledger: Vec<TradeEvent>,
    failed_groups: Vec<FailedGroup>,
) -> RunArtifacts {
    let rows = rows_by_group(annotated);
    let mut events = events_by_group(ledger);

    let mut groups = Vec::with_capacity(rows.len());
    let mut annotated = Vec::new();
    let mut ledger = Vec::new();
    for (group, group_rows) in rows {
        let group_events = events.remove(&group).unwrap_or_default();
        let trades = swinglab_core::backtest::TradeLedger::from_events(group_events.clone())
            .round_trips();
        let equity = equity_from_rows(&group_rows, params.starting_balance);
        groups.push(GroupReport {
            group,
            bars: group_rows.len(),
            round_trips: trades.len(),
            final_balance: trades.last().map(|t| t.ending_balance),
            metrics: PerformanceMetrics::compute(&equity, &trades),
        });
        annotated.extend(group_rows);
        ledger.extend(group_events);
    }

    let summary = summarize(run, params, &ledger);
    let portfolio = daily_balances(run, &ledger);
    RunArtifacts {
        manifest: RunManifest {
            schema_version: SCHEMA_VERSION,
            run,
            config_id: params.config_id(),
            params: params.clone(),
            dataset_hash: provenance.dataset_hash.clone(),
            synthetic: provenance.synthetic,
            groups,
            failed_groups,
        },
        annotated,
        ledger,
        summary,
        portfolio,
    }
}

/// Load, execute and assemble a run described by `config`.
pub fn run_batch(config: &RunConfig, parallel: bool) -> Result<RunArtifacts, RunError> {
    let loaded = data_loader::load(&config.data)?;
    let provenance = Provenance {
        dataset_hash: loaded.dataset_hash,
        synthetic: loaded.synthetic,
    };
    info!(
        run = %config.run,
        bars = loaded.bars.len(),
        config_id = %config.params.config_id(),
        "starting batch run"
    );

    let output = execute(loaded.bars, &config.params, parallel)?;
    if output.nothing_to_process() {
        info!(run = %config.run, "nothing to process");
    }

    let failed: Vec<FailedGroup> = output
        .failed_groups
        .iter()
        .map(|f| FailedGroup {
            group: f.group.clone(),
            error: f.error.to_string(),
        })
        .collect();
    let (annotated, ledger) = output.into_stored();

    let artifacts = assemble(
        config.run,
        &config.params,
        &provenance,
        annotated,
        ledger,
        failed,
    );
    info!(
        run = %config.run,
        groups = artifacts.manifest.groups.len(),
        failed = artifacts.manifest.failed_groups.len(),
        exits = artifacts.summary.exit_count,
        analysis_pl = artifacts.summary.analysis_pl(),
        "batch run complete"
    );
    Ok(artifacts)
}

/// Run `config` and persist the result.
pub fn run_and_store(
    config: &RunConfig,
    store: &dyn RunStore,
) -> Result<(RunArtifacts, PathBuf), RunError> {
    let artifacts = run_batch(config, true)?;
    let dir = store.save_run(&artifacts)?;
    Ok((artifacts, dir))
}
