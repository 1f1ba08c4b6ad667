//! Group engine and batch driver.
//!
//! `GroupEngine` runs the scanners for one group bar by bar; `run_group`
//! drives one group's complete history through a fresh engine.

pub mod batch;
pub mod group;

pub use batch::{group_bars, run_group, GroupFailure, GroupRun, RunOutput};
pub use group::GroupEngine;
