//! Rolling linear-regression trend.
//!
//! For bar t the window is every bar with timestamp in `[t - range, t]`. The
//! slope is null when the window has fewer than two bars or spans less than
//! the full range; otherwise it is the OLS slope of close against hours
//! elapsed since the window's first bar, rounded to 8 decimals.

use crate::domain::{Bar, TrendMark};
use crate::numeric::{round_to, SLOPE_DECIMALS};
use chrono::Duration;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Slope for the last bar of `tail`. `tail` must be time-ordered and reach
/// back at least `range` from its last bar for the result to be non-null.
pub fn trend_slope(tail: &[Bar], range: Duration) -> Option<f64> {
    let current = tail.last()?;
    // A window reaching past the earliest representable instant can never
    // be full.
    let cutoff = current.timestamp.checked_sub_signed(range)?;
    let start = tail.partition_point(|b| b.timestamp < cutoff);
    let window = &tail[start..];

    if window.len() < 2 {
        return None;
    }
    let first = window[0].timestamp;
    if current.timestamp - first < range {
        return None;
    }

    let xs: Vec<f64> = window
        .iter()
        .map(|b| (b.timestamp - first).num_seconds() as f64 / SECONDS_PER_HOUR)
        .collect();
    let n = window.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = window.iter().map(|b| b.close).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, bar) in xs.iter().zip(window) {
        let dx = x - mean_x;
        sxy += dx * (bar.close - mean_y);
        sxx += dx * dx;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = round_to(sxy / sxx, SLOPE_DECIMALS);
    slope.is_finite().then_some(slope)
}

/// Trend marks for a complete series.
pub fn compute_trend(bars: &[Bar], range: Duration) -> Vec<TrendMark> {
    (0..bars.len())
        .map(|i| TrendMark::from_slope(trend_slope(&bars[..=i], range)))
        .collect()
}
