//! End-to-end scenarios with hand-computed expectations.

use chrono::{Duration, TimeZone, Utc};
use swinglab_core::analysis::{LabeledSwing, SignalScanner};
use swinglab_core::backtest::TradeSimulator;
use swinglab_core::domain::{Bar, Direction, PriceLevels, SignalMark, SwingType, Trend};
use swinglab_core::engine::run_group;
use swinglab_core::{EngineParams, EntryMode, GroupKey, TargetDirection};

fn group() -> GroupKey {
    GroupKey::new("XBTUSD", "1h")
}

fn bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64),
        symbol: "XBTUSD".into(),
        timeframe: "1h".into(),
        open: close,
        high,
        low,
        close,
        volume: 10.0,
    }
}

fn mixed_long(lookback: usize) -> EngineParams {
    EngineParams {
        swing_lookback: lookback,
        entry_mode: EntryMode::Mixed,
        entry_count: 1,
        target_direction: TargetDirection::Long,
        ..EngineParams::default()
    }
}

#[test]
fn unlabeled_hh_lh_sequence_does_not_signal() {
    // Swing highs at 2, 5, 8 (100, 105, 102); lows rise so no swing lows.
    let highs = [90.0, 91.0, 100.0, 95.0, 96.0, 105.0, 98.0, 99.0, 102.0];
    let bars: Vec<Bar> = highs
        .iter()
        .enumerate()
        .map(|(i, &h)| {
            let low = 50.0 + i as f64;
            bar(i, h, low, (h + low) / 2.0)
        })
        .collect();

    let run = run_group(group(), bars, &mixed_long(2)).unwrap();
    let swing_bars: Vec<usize> = run
        .bars
        .iter()
        .enumerate()
        .filter(|(_, b)| b.swing.is_swing())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(swing_bars, vec![2, 5, 8]);
    assert_eq!(run.bars[2].swing.swing_type, None);
    assert_eq!(run.bars[5].swing.swing_type, Some(SwingType::HH));
    assert_eq!(run.bars[8].swing.swing_type, Some(SwingType::LH));
    assert!(run.bars.iter().all(|b| !b.signal.any()));
    assert!(run.ledger.is_empty());
}

#[test]
fn five_bullish_swings_fire_one_buy_at_pattern_end() {
    let mut scanner = SignalScanner::new(EntryMode::Mixed, 2, TargetDirection::Long);
    let pattern = [
        (3, SwingType::HL, false),
        (6, SwingType::HH, true),
        (9, SwingType::HL, false),
        (12, SwingType::HH, true),
        (15, SwingType::HL, false),
    ];
    let marks: Vec<(usize, SignalMark)> = pattern
        .iter()
        .map(|&(index, swing_type, is_swing_high)| {
            let mark = scanner.push(LabeledSwing {
                index,
                swing_type,
                is_swing_high,
            });
            (index, mark)
        })
        .collect();

    let buys: Vec<usize> = marks
        .iter()
        .filter(|(_, m)| m.buy_signal)
        .map(|(i, _)| *i)
        .collect();
    assert_eq!(buys, vec![15]);
    assert!(marks.iter().all(|(_, m)| !m.sell_signal));
}

#[test]
fn documented_trade_round_trip() {
    let params = EngineParams::default();
    let mut sim = TradeSimulator::new(&params);

    let entry = sim
        .step(&group(), 0, &bar(0, 101.0, 99.0, 100.0), SignalMark::buy())
        .unwrap();
    assert_eq!(entry.long_short, Some(Direction::Long));
    assert_eq!(entry.quantity, Some(100.0));
    assert_eq!(entry.entry_cost, Some(10_000.0));
    assert_eq!(
        entry.long_levels,
        Some(PriceLevels {
            target: 102.0,
            stop: 98.0
        })
    );

    let exit = sim
        .step(&group(), 1, &bar(1, 104.0, 100.0, 103.0), SignalMark::none())
        .unwrap();
    assert_eq!(exit.exit_cost, Some(10_300.0));
    assert_eq!(exit.profit_loss, Some(300.0));
    assert_eq!(exit.ending_balance, Some(10_300.0));
}

#[test]
fn rising_market_enters_and_exits_long() {
    // Each bar makes a new high: HH swings from bar 2 on, buy at bar 4.
    let bars: Vec<Bar> = (0..12)
        .map(|i| {
            let close = 100.0 + i as f64;
            bar(i, close + 0.5, close - 0.5 + i as f64 * 0.01, close)
        })
        .collect();
    let run = run_group(group(), bars, &mixed_long(1)).unwrap();

    assert!(run.bars[4].signal.buy_signal);
    assert!(run.bars[4].trade.is_entry());
    assert_eq!(run.bars[4].trade.entry_price, Some(104.0));

    let trips = run.ledger.round_trips();
    assert_eq!(trips.len(), 2);
    // Target 104 * 1.02 = 106.08, first reached by the close of bar 7.
    assert_eq!(trips[0].exit_bar, 7);
    // The buy on the exit bar is ignored; the next one re-enters.
    assert!(!run.bars[7].trade.is_entry());
    assert_eq!(trips[1].entry_bar, 8);
    assert_eq!(trips[1].exit_bar, 11);
    for trip in &trips {
        assert!(trip.is_winner());
        assert!((trip.ending_balance - trip.starting_balance - trip.profit_loss).abs() <= 0.01);
    }
}

#[test]
fn short_history_has_no_swings_and_null_slopes() {
    let bars: Vec<Bar> = (0..5)
        .map(|i| bar(i, 101.0 + i as f64, 99.0 - i as f64, 100.0))
        .collect();
    let params = EngineParams {
        swing_lookback: 7,
        trend_range_hours: 24,
        ..EngineParams::default()
    };
    let run = run_group(group(), bars, &params).unwrap();
    for b in &run.bars {
        assert!(!b.swing.is_swing());
        assert!(!b.signal.any());
        assert_eq!(b.trend.slope, None);
        assert_eq!(b.trend.trend, Trend::Sideways);
        assert!(!b.trade.in_trade);
    }
}
