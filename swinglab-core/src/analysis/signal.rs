//! Pattern signals over the sequence of labeled swings.
//!
//! A pattern is `2 * entry_count + 1` consecutive labeled swings (unlabeled
//! swings are not part of the sequence). Each time a labeled swing is appended
//! the scanner checks the pattern ending at it:
//!
//! - bullish: every type in {HL, HH}. Ordered mode additionally requires HL on
//!   a swing low at even positions and HH on a swing high at odd positions, and
//!   the last element to be HL.
//! - bearish: every type in {LH, LL}. Ordered mode requires LH on a swing high
//!   at even positions and LL on a swing low at odd positions, and the last
//!   element to be LH.
//!
//! Signals land on the pattern's last bar, which is always the bar being
//! processed.

use crate::domain::{SignalMark, SwingType};
use crate::params::{EntryMode, TargetDirection};
use std::collections::VecDeque;

/// One labeled swing as seen by the signal scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledSwing {
    pub index: usize,
    pub swing_type: SwingType,
    pub is_swing_high: bool,
}

#[derive(Debug, Clone)]
pub struct SignalScanner {
    mode: EntryMode,
    direction: TargetDirection,
    pattern_length: usize,
    window: VecDeque<LabeledSwing>,
    last_buy_end: Option<usize>,
    last_sell_end: Option<usize>,
}

impl SignalScanner {
    pub fn new(mode: EntryMode, entry_count: usize, direction: TargetDirection) -> Self {
        let pattern_length = 2 * entry_count + 1;
        Self {
            mode,
            direction,
            pattern_length,
            window: VecDeque::with_capacity(pattern_length),
            last_buy_end: None,
            last_sell_end: None,
        }
    }

    pub fn pattern_length(&self) -> usize {
        self.pattern_length
    }

    /// Append a labeled swing and evaluate the pattern that ends at it.
    pub fn push(&mut self, swing: LabeledSwing) -> SignalMark {
        if self.window.len() == self.pattern_length {
            self.window.pop_front();
        }
        self.window.push_back(swing);

        if self.window.len() < self.pattern_length || self.mode == EntryMode::Disabled {
            return SignalMark::none();
        }

        let end = swing.index;
        if self.direction.allows_long() && self.last_buy_end != Some(end) && self.is_bullish() {
            self.last_buy_end = Some(end);
            return SignalMark::buy();
        }
        if self.direction.allows_short() && self.last_sell_end != Some(end) && self.is_bearish() {
            self.last_sell_end = Some(end);
            return SignalMark::sell();
        }
        SignalMark::none()
    }

    fn is_bullish(&self) -> bool {
        if !self.window.iter().all(|s| s.swing_type.is_bullish()) {
            return false;
        }
        match self.mode {
            EntryMode::Mixed => true,
            EntryMode::Ordered => {
                self.is_ordered(SwingType::HL, SwingType::HH, false)
                    && self.window.back().map(|s| s.swing_type) == Some(SwingType::HL)
            }
            EntryMode::Disabled => false,
        }
    }

    fn is_bearish(&self) -> bool {
        if !self.window.iter().all(|s| s.swing_type.is_bearish()) {
            return false;
        }
        match self.mode {
            EntryMode::Mixed => true,
            EntryMode::Ordered => {
                self.is_ordered(SwingType::LH, SwingType::LL, true)
                    && self.window.back().map(|s| s.swing_type) == Some(SwingType::LH)
            }
            EntryMode::Disabled => false,
        }
    }

    /// Even positions must be `even` with `is_swing_high == even_is_high`,
    /// odd positions `odd` with the opposite flag.
    fn is_ordered(&self, even: SwingType, odd: SwingType, even_is_high: bool) -> bool {
        self.window.iter().enumerate().all(|(k, s)| {
            if k % 2 == 0 {
                s.swing_type == even && s.is_swing_high == even_is_high
            } else {
                s.swing_type == odd && s.is_swing_high != even_is_high
            }
        })
    }
}
