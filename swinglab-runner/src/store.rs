//! Run store: where annotated bars, ledgers and summaries are persisted.
//!
//! `FileStore` lays each run out as
//! `<root>/<fetch>_<analysis>/{annotated.csv, ledger.csv, portfolio.csv, summary.json, manifest.json}`.
//! Live cycles append to the two CSV files; a full run overwrites them.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use swinglab_core::domain::{ConfigId, GroupKey, TradeEvent};
use swinglab_core::{AnnotatedBar, EngineParams, RunKey};
use thiserror::Error;
use tracing::debug;

use crate::export;
use crate::metrics::PerformanceMetrics;
use crate::portfolio::DailyBalance;
use crate::summary::RunSummary;

/// Bumped whenever a stored artifact layout changes.
pub const SCHEMA_VERSION: u32 = 2;

pub const ANNOTATED_FILE: &str = "annotated.csv";
pub const LEDGER_FILE: &str = "ledger.csv";
pub const PORTFOLIO_FILE: &str = "portfolio.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no stored run at {0}")]
    NotFound(PathBuf),

    #[error("unsupported schema version {found} (max supported: {SCHEMA_VERSION})")]
    Schema { found: u32 },

    #[error(transparent)]
    Format(#[from] anyhow::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ─── Manifest ───────────────────────────────────────────────────────

/// Outcome of one group in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: GroupKey,
    pub bars: usize,
    pub round_trips: usize,
    pub final_balance: Option<f64>,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedGroup {
    pub group: GroupKey,
    pub error: String,
}

/// Provenance and per-group outcomes of a stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run: RunKey,
    pub config_id: ConfigId,
    pub params: EngineParams,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub groups: Vec<GroupReport>,
    pub failed_groups: Vec<FailedGroup>,
}

/// Everything a completed run persists.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub manifest: RunManifest,
    pub annotated: Vec<AnnotatedBar>,
    pub ledger: Vec<TradeEvent>,
    pub summary: RunSummary,
    pub portfolio: Vec<DailyBalance>,
}

// ─── Store trait ────────────────────────────────────────────────────

pub trait RunStore {
    /// Persist a complete run, replacing anything stored under its key.
    fn save_run(&self, artifacts: &RunArtifacts) -> Result<PathBuf, StoreError>;

    /// Append one incremental cycle's new rows.
    fn append_cycle(
        &self,
        run: RunKey,
        annotated: &[AnnotatedBar],
        events: &[TradeEvent],
    ) -> Result<(), StoreError>;

    /// Write the summary, daily balances and manifest of a run whose rows
    /// are already stored.
    fn save_reports(&self, artifacts: &RunArtifacts) -> Result<PathBuf, StoreError>;

    /// Stored annotated rows of a run, empty if none exist yet.
    fn load_annotated(&self, run: RunKey) -> Result<Vec<AnnotatedBar>, StoreError>;

    fn load_ledger(&self, run: RunKey) -> Result<Vec<TradeEvent>, StoreError>;
}

// ─── File store ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run: RunKey) -> PathBuf {
        self.root.join(run.label())
    }

    fn ensure_dir(&self, run: RunKey) -> Result<PathBuf, StoreError> {
        let dir = self.run_dir(run);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Read the manifest of a run directory.
    pub fn load_manifest(dir: &Path) -> Result<RunManifest, StoreError> {
        let path = dir.join(MANIFEST_FILE);
        let manifest: RunManifest = serde_json::from_str(&read_existing(&path)?)?;
        if manifest.schema_version > SCHEMA_VERSION {
            return Err(StoreError::Schema {
                found: manifest.schema_version,
            });
        }
        Ok(manifest)
    }

    /// Read the summary of a run directory.
    pub fn load_summary(dir: &Path) -> Result<RunSummary, StoreError> {
        let path = dir.join(SUMMARY_FILE);
        Ok(export::summary_from_json(&read_existing(&path)?)?)
    }

    /// Read the daily balances of a run directory.
    pub fn load_portfolio(dir: &Path) -> Result<Vec<DailyBalance>, StoreError> {
        let path = dir.join(PORTFOLIO_FILE);
        Ok(export::portfolio_from_csv(&read_existing(&path)?)?)
    }

    /// Read the ledger of a run directory.
    pub fn load_ledger_at(dir: &Path) -> Result<Vec<TradeEvent>, StoreError> {
        let path = dir.join(LEDGER_FILE);
        Ok(export::ledger_from_csv(&read_existing(&path)?)?)
    }
}

impl RunStore for FileStore {
    fn save_run(&self, artifacts: &RunArtifacts) -> Result<PathBuf, StoreError> {
        let run = artifacts.manifest.run;
        let dir = self.ensure_dir(run)?;

        write(
            &dir.join(ANNOTATED_FILE),
            &export::annotated_to_csv(run, &artifacts.annotated)?,
        )?;
        write(
            &dir.join(LEDGER_FILE),
            &export::ledger_to_csv(run, &artifacts.ledger)?,
        )?;
        self.save_reports(artifacts)?;

        debug!(dir = %dir.display(), rows = artifacts.annotated.len(), "run saved");
        Ok(dir)
    }

    fn append_cycle(
        &self,
        run: RunKey,
        annotated: &[AnnotatedBar],
        events: &[TradeEvent],
    ) -> Result<(), StoreError> {
        let dir = self.ensure_dir(run)?;
        if !annotated.is_empty() {
            let path = dir.join(ANNOTATED_FILE);
            let (file, fresh) = open_append(&path)?;
            export::write_annotated(file, run, annotated, fresh)?;
        }
        if !events.is_empty() {
            let path = dir.join(LEDGER_FILE);
            let (file, fresh) = open_append(&path)?;
            export::write_ledger(file, run, events, fresh)?;
        }
        Ok(())
    }

    fn save_reports(&self, artifacts: &RunArtifacts) -> Result<PathBuf, StoreError> {
        let dir = self.ensure_dir(artifacts.manifest.run)?;
        write(
            &dir.join(SUMMARY_FILE),
            &export::summary_to_json(&artifacts.summary)?,
        )?;
        write(
            &dir.join(PORTFOLIO_FILE),
            &export::portfolio_to_csv(&artifacts.portfolio)?,
        )?;
        write(
            &dir.join(MANIFEST_FILE),
            &serde_json::to_string_pretty(&artifacts.manifest)?,
        )?;
        Ok(dir)
    }

    fn load_annotated(&self, run: RunKey) -> Result<Vec<AnnotatedBar>, StoreError> {
        let path = self.run_dir(run).join(ANNOTATED_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(export::annotated_from_csv(&read_existing(&path)?)?)
    }

    fn load_ledger(&self, run: RunKey) -> Result<Vec<TradeEvent>, StoreError> {
        let path = self.run_dir(run).join(LEDGER_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::load_ledger_at(&self.run_dir(run))
    }
}

fn write(path: &Path, contents: &str) -> Result<(), StoreError> {
    std::fs::write(path, contents).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_existing(path: &Path) -> Result<String, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Open `path` for appending. The flag is true when the file was empty, so
/// the caller knows to write a header.
fn open_append(path: &Path) -> Result<(std::fs::File, bool), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    let fresh = file.metadata().map_err(io_err)?.len() == 0;
    Ok((file, fresh))
}
