//! SwingLab Core: swing analysis and backtest engine.
//!
//! This crate contains the heart of the pipeline:
//! - Domain types (bars, swing/trend/signal marks, positions, trade events)
//! - Scanners for swing detection, swing classification, trend slope and
//!   pattern signals
//! - Single-position trade simulator and trade ledger
//! - Group engine shared by batch and incremental execution

pub mod analysis;
pub mod backtest;
pub mod domain;
pub mod engine;
pub mod error;
pub mod numeric;
pub mod params;

pub use domain::{AnnotatedBar, Bar, GroupKey, RunKey};
pub use engine::{run_group, GroupEngine, RunOutput};
pub use error::EngineError;
pub use params::{EngineParams, EntryMode, ExitParams, TargetDirection};
