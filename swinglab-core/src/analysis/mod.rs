//! Analysis stages: swing detection, swing classification, trend slope and
//! pattern signals.
//!
//! Every stage is a scanner: an explicit fold state plus a `step` that sees
//! only the bars at or before the current one. The group engine drives them in
//! order; the `detect_*` / `compute_*` helpers run a single stage over a whole
//! series.

pub mod classify;
pub mod signal;
pub mod swing;
pub mod trend;

pub use classify::SwingClassifier;
pub use signal::{LabeledSwing, SignalScanner};
pub use swing::{detect_swings, SwingFlags, SwingScanner};
pub use trend::{compute_trend, trend_slope};

/// Hourly bars from `(high, low, close)` triples for testing.
#[cfg(test)]
pub fn make_bars(data: &[(f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(high, low, close))| Bar {
            timestamp: base + chrono::Duration::hours(i as i64),
            symbol: "TEST".to_string(),
            timeframe: "1h".to_string(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Hourly bars from close prices (high = close + 1, low = close - 1).
#[cfg(test)]
pub fn make_close_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    let data: Vec<(f64, f64, f64)> = closes.iter().map(|&c| (c + 1.0, c - 1.0, c)).collect();
    make_bars(&data)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}
