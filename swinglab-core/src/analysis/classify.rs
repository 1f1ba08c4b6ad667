//! Swing classification: HH/LH for swing highs, HL/LL for swing lows.
//!
//! Each swing is compared with the previous swing of the same kind. The
//! reference advances on every swing, labeled or not, so a swing filtered out
//! by the minimum-magnitude check still becomes the next swing's reference.

use crate::analysis::swing::SwingFlags;
use crate::domain::{Bar, SwingType};

#[derive(Debug, Clone, Default)]
pub struct SwingClassifier {
    min_swing_pct: Option<f64>,
    prev_high: Option<f64>,
    prev_low: Option<f64>,
}

impl SwingClassifier {
    /// `min_swing_pct` is `Some` only when the magnitude filter is enabled.
    pub fn new(min_swing_pct: Option<f64>) -> Self {
        Self {
            min_swing_pct,
            prev_high: None,
            prev_low: None,
        }
    }

    /// Label the current bar. When a bar is both a swing high and a swing low
    /// the low label wins.
    pub fn step(&mut self, bar: &Bar, flags: SwingFlags) -> Option<SwingType> {
        let mut label = None;

        if flags.is_swing_high {
            let current = bar.high;
            label = self.prev_high.and_then(|prev| {
                let pct = (current - prev) / prev * 100.0;
                if self.filtered(pct) {
                    None
                } else if current > prev {
                    Some(SwingType::HH)
                } else {
                    Some(SwingType::LH)
                }
            });
            self.prev_high = Some(current);
        }

        if flags.is_swing_low {
            let current = bar.low;
            label = self.prev_low.and_then(|prev| {
                let pct = (prev - current) / prev * 100.0;
                if self.filtered(pct) {
                    None
                } else if current < prev {
                    Some(SwingType::LL)
                } else {
                    Some(SwingType::HL)
                }
            });
            self.prev_low = Some(current);
        }

        label
    }

    fn filtered(&self, pct: f64) -> bool {
        match self.min_swing_pct {
            Some(min) => pct.abs() < min,
            None => false,
        }
    }
}
