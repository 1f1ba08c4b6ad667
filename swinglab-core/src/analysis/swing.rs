//! Swing detection over a trailing lookback window.
//!
//! Bar i (i >= lookback) is a swing high when `high[i]` is at least the
//! maximum high of the `lookback` bars before it, and a swing low when `low[i]`
//! is at most their minimum low. A candidate is accepted only if the previous
//! accepted swing of the same kind is at least `lookback / 2` bars back.
//!
//! The window never includes bars after i.

use crate::domain::Bar;

/// Raw swing flags for one bar, before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwingFlags {
    pub is_swing_high: bool,
    pub is_swing_low: bool,
}

#[derive(Debug, Clone)]
pub struct SwingScanner {
    lookback: usize,
    last_high: Option<usize>,
    last_low: Option<usize>,
}

impl SwingScanner {
    pub fn new(lookback: usize) -> Self {
        assert!(lookback >= 1, "swing lookback must be >= 1");
        Self {
            lookback,
            last_high: None,
            last_low: None,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Bars of history `step` needs, current bar included.
    pub fn required_tail(&self) -> usize {
        self.lookback + 1
    }

    fn debounce(&self) -> usize {
        self.lookback / 2
    }

    /// Evaluate bar `index` of the group. `tail` ends at that bar and holds at
    /// least `lookback + 1` bars once `index >= lookback`.
    pub fn step(&mut self, index: usize, tail: &[Bar]) -> SwingFlags {
        let mut flags = SwingFlags::default();
        if index < self.lookback || tail.len() < self.required_tail() {
            return flags;
        }

        let n = tail.len();
        let current = &tail[n - 1];
        let window = &tail[n - 1 - self.lookback..n - 1];

        // f64::max/min skip NaN; an all-NaN window stays NaN and never qualifies.
        let window_high = window.iter().fold(f64::NAN, |acc, b| acc.max(b.high));
        let window_low = window.iter().fold(f64::NAN, |acc, b| acc.min(b.low));

        if current.high >= window_high && self.accepts(self.last_high, index) {
            flags.is_swing_high = true;
            self.last_high = Some(index);
        }
        if current.low <= window_low && self.accepts(self.last_low, index) {
            flags.is_swing_low = true;
            self.last_low = Some(index);
        }
        flags
    }

    fn accepts(&self, last: Option<usize>, index: usize) -> bool {
        match last {
            None => true,
            Some(last) => index - last >= self.debounce(),
        }
    }
}

/// Run swing detection over a complete series.
pub fn detect_swings(bars: &[Bar], lookback: usize) -> Vec<SwingFlags> {
    let mut scanner = SwingScanner::new(lookback);
    let tail = scanner.required_tail();
    (0..bars.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(tail);
            scanner.step(i, &bars[start..=i])
        })
        .collect()
}
