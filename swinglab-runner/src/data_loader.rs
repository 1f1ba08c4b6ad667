//! Bar loading for the runner.
//!
//! Bars come either from a CSV file with the columns
//! `DateTime,Timeframe,Symbol,Open,High,Low,Close,Volume` or from the
//! deterministic synthetic generator. Synthetic data is a developer-only mode
//! and is tagged in the run manifest.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use swinglab_core::Bar;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{DataSource, SyntheticSpec};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open bar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed bar row {row}: {source}")]
    Csv {
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: u64, value: String },

    #[error("unknown timeframe '{0}' (expected e.g. 5m, 1h, 1d)")]
    Timeframe(String),
}

/// Bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    /// BLAKE3 over every loaded bar, in load order.
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(rename = "DateTime")]
    date_time: String,
    #[serde(rename = "Timeframe")]
    timeframe: String,
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume", default)]
    volume: f64,
}

/// Load bars from the configured source.
pub fn load(source: &DataSource) -> Result<LoadedBars, LoadError> {
    let (bars, synthetic) = match source {
        DataSource::Csv(path) => (load_csv(path)?, false),
        DataSource::Synthetic(spec) => (generate_synthetic(spec)?, true),
    };

    let insane = bars.iter().filter(|b| !b.is_void() && !b.is_sane()).count();
    if insane > 0 {
        warn!(insane, "bars failing OHLC sanity checks");
    }
    let dataset_hash = dataset_hash(&bars);
    debug!(bars = bars.len(), synthetic, hash = %dataset_hash, "bars loaded");

    Ok(LoadedBars {
        bars,
        dataset_hash,
        synthetic,
    })
}

pub fn load_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_bars(file)
}

/// Parse bars from CSV text with a header row.
pub fn read_bars<R: std::io::Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();

    for (i, result) in rdr.deserialize::<BarRow>().enumerate() {
        // Header is line 1.
        let row = i as u64 + 2;
        let rec = result.map_err(|source| LoadError::Csv { row, source })?;
        let timestamp = parse_timestamp(&rec.date_time).ok_or_else(|| LoadError::Timestamp {
            row,
            value: rec.date_time.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            symbol: rec.symbol,
            timeframe: rec.timeframe,
            open: rec.open,
            high: rec.high,
            low: rec.low,
            close: rec.close,
            volume: rec.volume,
        });
    }

    Ok(bars)
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Bar spacing for a timeframe label such as `5m`, `1h` or `1d`.
pub fn timeframe_duration(timeframe: &str) -> Option<Duration> {
    let tf = timeframe.trim();
    let split = tf.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = tf.split_at(split);
    let n: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    match unit {
        "m" | "min" => Some(Duration::minutes(n)),
        "h" => Some(Duration::hours(n)),
        "d" => Some(Duration::days(n)),
        "w" => Some(Duration::weeks(n)),
        _ => None,
    }
}

/// Deterministic random-walk bars for every symbol in `spec`.
///
/// Each symbol seeds its own `StdRng` from BLAKE3 over the symbol and the
/// spec seed, so adding a symbol never changes another symbol's series.
pub fn generate_synthetic(spec: &SyntheticSpec) -> Result<Vec<Bar>, LoadError> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let step = timeframe_duration(&spec.timeframe)
        .ok_or_else(|| LoadError::Timeframe(spec.timeframe.clone()))?;
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();

    let mut bars = Vec::with_capacity(spec.bars * spec.symbols.len());
    for symbol in &spec.symbols {
        let mut hasher = blake3::Hasher::new();
        hasher.update(symbol.as_bytes());
        hasher.update(&spec.seed.to_le_bytes());
        let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

        let mut price = 100.0_f64;
        for i in 0..spec.bars {
            let ret: f64 = rng.gen_range(-0.01..0.01);
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
            let volume = rng.gen_range(1_000.0..50_000.0);

            bars.push(Bar {
                timestamp: start + step * i as i32,
                symbol: symbol.clone(),
                timeframe: spec.timeframe.clone(),
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
        }
    }
    Ok(bars)
}

/// BLAKE3 over every bar in order.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.symbol.as_bytes());
        hasher.update(bar.timeframe.as_bytes());
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
