//! Run configuration: the TOML run file and the flat parameter record.
//!
//! The parameter record uses the flat key names of the analysis tables
//! (`SwingLookback`, `Entry`, `L_ProfitTargetPercent`, ...). A value given as
//! a list is a parameter-grid row; its first element is used.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use swinglab_core::numeric::money;
use swinglab_core::{EngineError, EngineParams, EntryMode, ExitParams, RunKey, TargetDirection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parameter {key}: {message}")]
    Param { key: String, message: String },

    #[error("run file needs [data] with either `bars` or `synthetic`")]
    NoDataSource,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ConfigError {
    fn param(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Param {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

// ─── Flat parameter record ──────────────────────────────────────────

/// Flat key/value parameter record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamRecord(BTreeMap<String, Value>);

impl ParamRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml_table(table: toml::Table) -> Result<Self, ConfigError> {
        let value = serde_json::to_value(table)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// The value for `key`, unwrapping a list to its first element.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.0.get(key)? {
            Value::Array(items) => items.first(),
            Value::Null => None,
            other => Some(other),
        }
    }

    fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ConfigError::param(key, "not a finite number")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::param(key, format!("not a number: {s}"))),
            Some(other) => Err(ConfigError::param(key, format!("expected a number, got {other}"))),
        }
    }

    fn i64_or(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        let value = self.f64_or(key, default as f64)?;
        if value.fract() != 0.0 {
            return Err(ConfigError::param(key, format!("expected an integer, got {value}")));
        }
        Ok(value as i64)
    }

    /// A count that must be at least 1.
    fn count_or(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        let value = self.i64_or(key, default as i64)?;
        if value < 1 {
            return Err(EngineError::invalid(format!("{key} must be >= 1, got {value}")).into());
        }
        Ok(value as usize)
    }

    /// A whole number of hours, at least 1.
    fn hours_or(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        let value = self.i64_or(key, i64::from(default))?;
        if value < 1 {
            return Err(EngineError::invalid(format!("{key} must be >= 1, got {value}")).into());
        }
        u32::try_from(value)
            .map_err(|_| ConfigError::param(key, format!("{value} hours is too large")))
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigError::param(key, format!("not a boolean: {s}"))),
            },
            Some(other) => Err(ConfigError::param(key, format!("expected a boolean, got {other}"))),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Run identifiers from `FetchRunID` / `AnalysisRunID`, falling back to
    /// `default` for missing keys.
    pub fn run_key(&self, default: RunKey) -> Result<RunKey, ConfigError> {
        let id = |key: &str, fallback: u32| -> Result<u32, ConfigError> {
            let v = self.i64_or(key, fallback as i64)?;
            u32::try_from(v).map_err(|_| ConfigError::param(key, format!("invalid run id {v}")))
        };
        Ok(RunKey::new(
            id("FetchRunID", default.fetch_run_id)?,
            id("AnalysisRunID", default.analysis_run_id)?,
        ))
    }

    /// Build validated engine parameters, applying defaults for absent keys.
    pub fn engine_params(&self) -> Result<EngineParams, ConfigError> {
        let defaults = EngineParams::default();

        let entry_mode = match self.text("Entry") {
            None => defaults.entry_mode,
            Some(s) => s
                .parse::<EntryMode>()
                .map_err(|e| ConfigError::param("Entry", e))?,
        };
        let target_direction = match self.text("TargetDirection") {
            None => defaults.target_direction,
            Some(s) => s
                .parse::<TargetDirection>()
                .map_err(|e| ConfigError::param("TargetDirection", e))?,
        };

        let long_exits = ExitParams {
            profit_target_pct: self.f64_or(
                "L_ProfitTargetPercent",
                defaults.long_exits.profit_target_pct,
            )?,
            stop_loss_pct: self.f64_or("L_StopLossPercent", defaults.long_exits.stop_loss_pct)?,
        };
        let short_exits = ExitParams {
            profit_target_pct: self
                .f64_or("S_ProfitTargetPercent", long_exits.profit_target_pct)?,
            stop_loss_pct: self.f64_or("S_StopLossPercent", long_exits.stop_loss_pct)?,
        };

        let params = EngineParams {
            swing_lookback: self.count_or("SwingLookback", defaults.swing_lookback)?,
            enable_min_swing_filter: self
                .bool_or("EnableMinSwingFilter", defaults.enable_min_swing_filter)?,
            min_swing_pct: self.f64_or("MinSwingPct", defaults.min_swing_pct)?,
            trend_range_hours: self.hours_or("TrendlineRange", defaults.trend_range_hours)?,
            entry_mode,
            entry_count: self.count_or("EntryCount", defaults.entry_count)?,
            target_direction,
            long_exits,
            short_exits,
            starting_balance: money(self.f64_or("StartingBalance", defaults.starting_balance)?),
            leverage: self.f64_or("Leverage", defaults.leverage)?,
        };
        params.validate()?;
        Ok(params)
    }
}

// ─── Run file ───────────────────────────────────────────────────────

/// Deterministic synthetic bars for development runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub symbols: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_bar_count")]
    pub bars: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_timeframe() -> String {
    "1h".to_string()
}

fn default_bar_count() -> usize {
    2_000
}

fn default_seed() -> u64 {
    42
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_run_id() -> u32 {
    1
}

/// Where a run's bars come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Csv(PathBuf),
    Synthetic(SyntheticSpec),
}

#[derive(Debug, Deserialize)]
struct RunFile {
    #[serde(default)]
    run: RunSection,
    #[serde(default)]
    data: DataSection,
    #[serde(default)]
    params: toml::Table,
}

#[derive(Debug, Deserialize)]
struct RunSection {
    #[serde(default = "default_run_id")]
    fetch_run_id: u32,
    #[serde(default = "default_run_id")]
    analysis_run_id: u32,
    log_level: Option<String>,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            fetch_run_id: default_run_id(),
            analysis_run_id: default_run_id(),
            log_level: None,
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DataSection {
    bars: Option<PathBuf>,
    synthetic: Option<SyntheticSpec>,
}

/// A fully resolved, validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub run: RunKey,
    pub log_level: Option<String>,
    pub output_dir: PathBuf,
    pub data: DataSource,
    pub params: EngineParams,
}

impl RunConfig {
    /// Load a TOML run file. Relative paths resolve against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base)
    }

    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let file: RunFile = toml::from_str(text)?;
        let record = ParamRecord::from_toml_table(file.params)?;

        let data = match (file.data.bars, file.data.synthetic) {
            (Some(bars), _) => DataSource::Csv(resolve(base_dir, bars)),
            (None, Some(spec)) => DataSource::Synthetic(spec),
            (None, None) => return Err(ConfigError::NoDataSource),
        };
        let run = record.run_key(RunKey::new(file.run.fetch_run_id, file.run.analysis_run_id))?;

        Ok(Self {
            run,
            log_level: file.run.log_level,
            output_dir: resolve(base_dir, file.run.output_dir),
            data,
            params: record.engine_params()?,
        })
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
