//! Per-group engine: drives every scanner over one (symbol, timeframe) series.
//!
//! Batch and incremental execution are the same code path. The engine keeps
//! only the trailing bars the scanners can still look at: the last
//! `lookback` bars, plus anything inside the trend window of the newest bar.

use crate::analysis::{trend_slope, LabeledSwing, SignalScanner, SwingClassifier, SwingScanner};
use crate::backtest::TradeSimulator;
use crate::domain::{
    AnnotatedBar, Bar, GroupKey, SignalMark, SwingMark, SwingType, TradeEvent, TrendMark,
};
use crate::error::EngineError;
use crate::params::EngineParams;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GroupEngine {
    group: GroupKey,
    trend_range: Duration,
    swings: SwingScanner,
    classifier: SwingClassifier,
    signals: SignalScanner,
    simulator: TradeSimulator,
    tail: VecDeque<Bar>,
    next_index: usize,
    last_timestamp: Option<DateTime<Utc>>,
    pending_events: Vec<TradeEvent>,
}

impl GroupEngine {
    pub fn new(group: GroupKey, params: &EngineParams) -> Result<Self, EngineError> {
        params.validate()?;
        Ok(Self {
            group,
            trend_range: params.trend_range(),
            swings: SwingScanner::new(params.swing_lookback),
            classifier: SwingClassifier::new(params.swing_filter()),
            signals: SignalScanner::new(
                params.entry_mode,
                params.entry_count,
                params.target_direction,
            ),
            simulator: TradeSimulator::new(params),
            tail: VecDeque::new(),
            next_index: 0,
            last_timestamp: None,
            pending_events: Vec::new(),
        })
    }

    /// Rebuild an engine from previously stored annotations.
    ///
    /// The stored bars are replayed through the scanners with their stored
    /// swing types pinned, so labels already written are never changed. Events
    /// from the replayed history are discarded; only bars pushed afterwards
    /// produce new ledger rows.
    pub fn resume(
        group: GroupKey,
        params: &EngineParams,
        history: &[AnnotatedBar],
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(group, params)?;
        for stored in history {
            let replayed = engine.push_pinned(stored.bar.clone(), stored.swing.swing_type)?;
            if replayed.trade != stored.trade || replayed.signal != stored.signal {
                warn!(
                    group = %engine.group,
                    timestamp = %stored.bar.timestamp,
                    "replayed annotation differs from stored row"
                );
            }
        }
        engine.pending_events.clear();
        debug!(group = %engine.group, bars = history.len(), "resumed group engine");
        Ok(engine)
    }

    pub fn group(&self) -> &GroupKey {
        &self.group
    }

    /// Number of bars processed so far (the index the next bar will get).
    pub fn bars_processed(&self) -> usize {
        self.next_index
    }

    /// Bars currently held in the trailing window.
    pub fn retained(&self) -> usize {
        self.tail.len()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Ledger rows produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<TradeEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn push(&mut self, bar: Bar) -> Result<AnnotatedBar, EngineError> {
        self.push_pinned(bar, None)
    }

    pub fn extend(
        &mut self,
        bars: impl IntoIterator<Item = Bar>,
    ) -> Result<Vec<AnnotatedBar>, EngineError> {
        bars.into_iter().map(|bar| self.push(bar)).collect()
    }

    /// Process the next bar. A `pinned` swing type (one already stored for
    /// this bar) is kept in place of whatever the classifier computes.
    pub fn push_pinned(
        &mut self,
        bar: Bar,
        pinned: Option<SwingType>,
    ) -> Result<AnnotatedBar, EngineError> {
        self.check_order(&bar)?;
        if !bar.is_sane() {
            warn!(group = %self.group, timestamp = %bar.timestamp, "bar fails OHLC sanity check");
        }

        let index = self.next_index;
        self.last_timestamp = Some(bar.timestamp);
        self.tail.push_back(bar);
        let tail: &[Bar] = self.tail.make_contiguous();
        let current = &tail[tail.len() - 1];

        // ── Swings ──
        let flags = self.swings.step(index, tail);
        let computed = self.classifier.step(current, flags);
        let swing_type = match pinned {
            Some(stored) => {
                if computed != Some(stored) {
                    warn!(
                        group = %self.group,
                        timestamp = %current.timestamp,
                        stored = %stored,
                        computed = ?computed,
                        "keeping stored swing type"
                    );
                }
                Some(stored)
            }
            None => computed,
        };
        let swing = SwingMark {
            is_swing_high: flags.is_swing_high,
            is_swing_low: flags.is_swing_low,
            swing_type,
        };

        // ── Trend ──
        let trend = TrendMark::from_slope(trend_slope(tail, self.trend_range));

        // ── Signals ──
        let signal = match swing_type {
            Some(swing_type) => self.signals.push(LabeledSwing {
                index,
                swing_type,
                is_swing_high: flags.is_swing_high,
            }),
            None => SignalMark::none(),
        };

        // ── Trades ──
        let trade = self.simulator.step(&self.group, index, current, signal)?;
        if let Some(event) = TradeEvent::from_mark(&self.group, index, current.timestamp, &trade) {
            self.pending_events.push(event);
        }

        let annotated = AnnotatedBar {
            bar: current.clone(),
            swing,
            trend,
            signal,
            trade,
        };
        self.next_index += 1;
        self.trim_tail();
        Ok(annotated)
    }

    fn check_order(&self, bar: &Bar) -> Result<(), EngineError> {
        if !bar.is_in_group(&self.group) {
            return Err(EngineError::GroupMismatch {
                expected: self.group.clone(),
                found: bar.group_key(),
            });
        }
        match self.last_timestamp {
            Some(last) if bar.timestamp == last => Err(EngineError::DuplicateTimestamp {
                group: self.group.clone(),
                timestamp: bar.timestamp,
            }),
            Some(last) if bar.timestamp < last => Err(EngineError::OutOfOrder {
                group: self.group.clone(),
                last,
                timestamp: bar.timestamp,
            }),
            _ => Ok(()),
        }
    }

    /// Drop bars no future step can see.
    fn trim_tail(&mut self) {
        let Some(newest) = self.tail.back().map(|b| b.timestamp) else {
            return;
        };
        // Nothing ages out of a window wider than the calendar.
        let Some(cutoff) = newest.checked_sub_signed(self.trend_range) else {
            return;
        };
        let keep = self.swings.lookback();
        while self.tail.len() > keep && self.tail.front().is_some_and(|b| b.timestamp < cutoff) {
            self.tail.pop_front();
        }
    }
}
