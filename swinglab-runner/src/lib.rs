//! SwingLab Runner: run configuration, bar loading, storage and reporting.
//!
//! This crate builds on `swinglab-core` to provide:
//! - TOML run files and the flat parameter record
//! - Bar loading from CSV or a deterministic synthetic generator
//! - Parallel batch runs over every (symbol, timeframe) group
//! - Incremental sessions that commit each poll cycle
//! - The four-row profit/loss summary, daily portfolio balances and
//!   per-group performance metrics
//! - A file-backed run store

pub mod config;
pub mod data_loader;
pub mod export;
pub mod live;
pub mod metrics;
pub mod portfolio;
pub mod runner;
pub mod store;
pub mod summary;

pub use config::{ConfigError, DataSource, ParamRecord, RunConfig, SyntheticSpec};
pub use data_loader::{LoadError, LoadedBars};
pub use live::{verify, BarSource, ChunkedReplay, CycleReport, LiveSession};
pub use metrics::PerformanceMetrics;
pub use portfolio::{daily_balances, DailyBalance};
pub use runner::{execute, run_and_store, run_batch, Provenance, RunError};
pub use store::{FileStore, RunArtifacts, RunManifest, RunStore, StoreError};
pub use summary::{summarize, PlType, RunSummary, SummaryRow};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn artifacts_are_send_sync() {
        assert_send::<RunArtifacts>();
        assert_sync::<RunArtifacts>();
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<ParamRecord>();
        assert_sync::<ParamRecord>();
    }

    #[test]
    fn file_store_is_send_sync() {
        assert_send::<FileStore>();
        assert_sync::<FileStore>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<StoreError>();
        assert_sync::<StoreError>();
    }
}
