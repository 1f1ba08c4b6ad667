//! Run aggregator: the four-row (direction × P&L type) summary of a run's
//! exit events.
//!
//! An exit is a Profit when its P&L is strictly positive, otherwise a Loss.
//! All four rows are always emitted, empty or not.

use serde::{Deserialize, Serialize};
use std::fmt;
use swinglab_core::domain::{Direction, RunKey, TradeEvent};
use swinglab_core::numeric::money;
use swinglab_core::{EngineParams, EntryMode, TargetDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlType {
    Profit,
    Loss,
}

impl PlType {
    pub fn of(profit_loss: f64) -> Self {
        if profit_loss > 0.0 {
            PlType::Profit
        } else {
            PlType::Loss
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlType::Profit => "Profit",
            PlType::Loss => "Loss",
        }
    }
}

/// One (direction, P&L type) row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub run: RunKey,
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub entry_mode: EntryMode,
    pub entry_count: usize,
    pub target_direction: TargetDirection,
    /// Exit settings of this row's direction.
    pub profit_target_pct: f64,
    pub stop_loss_pct: f64,

    pub position: Direction,
    pub pl_type: PlType,

    pub profit_executions: usize,
    pub loss_executions: usize,
    pub average_profit: Option<f64>,
    pub average_loss: Option<f64>,
    pub max_profit: Option<f64>,
    pub min_profit: Option<f64>,
    pub max_loss: Option<f64>,
    pub min_loss: Option<f64>,

    /// Share of this direction's exits that were profitable / losing, in percent.
    pub profit_percentage: f64,
    pub loss_percentage: f64,

    pub profit: f64,
    pub loss: f64,
    /// Profit + loss of this row.
    pub position_pl: f64,
    /// Sum of `position_pl` over all four rows.
    pub analysis_pl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: RunKey,
    pub exit_count: usize,
    pub rows: Vec<SummaryRow>,
}

impl RunSummary {
    pub fn analysis_pl(&self) -> f64 {
        self.rows.first().map_or(0.0, |r| r.analysis_pl)
    }

    pub fn row(&self, position: Direction, pl_type: PlType) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.position == position && r.pl_type == pl_type)
    }
}

const COMBINATIONS: [(Direction, PlType); 4] = [
    (Direction::Long, PlType::Profit),
    (Direction::Long, PlType::Loss),
    (Direction::Short, PlType::Profit),
    (Direction::Short, PlType::Loss),
];

/// Aggregate a run's ledger. Entry events are ignored.
pub fn summarize(run: RunKey, params: &EngineParams, events: &[TradeEvent]) -> RunSummary {
    let exits: Vec<(Direction, f64)> = events
        .iter()
        .filter(|e| e.is_exit())
        .filter_map(|e| e.profit_loss.map(|pl| (e.direction, pl)))
        .collect();
    let first = events.iter().find(|e| e.is_exit());

    let mut rows: Vec<SummaryRow> = COMBINATIONS
        .iter()
        .map(|&(position, pl_type)| {
            let position_total = exits.iter().filter(|(d, _)| *d == position).count();
            let values: Vec<f64> = exits
                .iter()
                .filter(|(d, pl)| *d == position && PlType::of(*pl) == pl_type)
                .map(|(_, pl)| *pl)
                .collect();
            let count = values.len();
            let stats = Stats::of(&values);

            let pct = |n: usize| {
                if position_total > 0 {
                    money(n as f64 / position_total as f64 * 100.0)
                } else {
                    0.0
                }
            };
            let exits_cfg = match position {
                Direction::Long => params.long_exits,
                Direction::Short => params.short_exits,
            };

            let (profit_executions, loss_executions) = match pl_type {
                PlType::Profit => (count, 0),
                PlType::Loss => (0, count),
            };
            let (profit, loss) = match pl_type {
                PlType::Profit => (stats.sum, 0.0),
                PlType::Loss => (0.0, stats.sum),
            };
            let (profit_stats, loss_stats) = match pl_type {
                PlType::Profit => (stats, Stats::default()),
                PlType::Loss => (Stats::default(), stats),
            };

            SummaryRow {
                run,
                symbol: first.map(|e| e.group.symbol.clone()),
                timeframe: first.map(|e| e.group.timeframe.clone()),
                entry_mode: params.entry_mode,
                entry_count: params.entry_count,
                target_direction: params.target_direction,
                profit_target_pct: exits_cfg.profit_target_pct,
                stop_loss_pct: exits_cfg.stop_loss_pct,
                position,
                pl_type,
                profit_executions,
                loss_executions,
                average_profit: profit_stats.mean,
                average_loss: loss_stats.mean,
                max_profit: profit_stats.max,
                min_profit: profit_stats.min,
                max_loss: loss_stats.max,
                min_loss: loss_stats.min,
                profit_percentage: match pl_type {
                    PlType::Profit => pct(count),
                    PlType::Loss => pct(position_total - count),
                },
                loss_percentage: match pl_type {
                    PlType::Profit => pct(position_total - count),
                    PlType::Loss => pct(count),
                },
                profit,
                loss,
                position_pl: money(profit + loss),
                analysis_pl: 0.0,
            }
        })
        .collect();

    let analysis_pl = money(rows.iter().map(|r| r.position_pl).sum());
    for row in &mut rows {
        row.analysis_pl = analysis_pl;
    }

    RunSummary {
        run,
        exit_count: exits.len(),
        rows,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    sum: f64,
    mean: Option<f64>,
    max: Option<f64>,
    min: Option<f64>,
}

impl Stats {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        Self {
            sum: money(sum),
            mean: Some(money(sum / values.len() as f64)),
            max: Some(money(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))),
            min: Some(money(values.iter().copied().fold(f64::INFINITY, f64::min))),
        }
    }
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({} exits)", self.run, self.exit_count)?;
        writeln!(
            f,
            "{:<6} {:<7} {:>5} {:>10} {:>10} {:>10} {:>8} {:>8} {:>12}",
            "Pos", "Type", "Count", "Avg", "Max", "Min", "Win%", "Loss%", "PL"
        )?;
        for r in &self.rows {
            let (count, avg, max, min) = match r.pl_type {
                PlType::Profit => (r.profit_executions, r.average_profit, r.max_profit, r.min_profit),
                PlType::Loss => (r.loss_executions, r.average_loss, r.max_loss, r.min_loss),
            };
            writeln!(
                f,
                "{:<6} {:<7} {:>5} {:>10} {:>10} {:>10} {:>8.2} {:>8.2} {:>12.2}",
                r.position.as_str(),
                r.pl_type.as_str(),
                count,
                opt(avg),
                opt(max),
                opt(min),
                r.profit_percentage,
                r.loss_percentage,
                r.position_pl
            )?;
        }
        write!(f, "Analysis P&L: {:.2}", self.analysis_pl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use swinglab_core::domain::{EntryExit, GroupKey};

    fn exit(direction: Direction, pl: f64) -> TradeEvent {
        TradeEvent {
            group: GroupKey::new("XBTUSD", "1h"),
            bar_index: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            entry_exit: EntryExit::Exit,
            direction,
            starting_balance: 10_000.0,
            quantity: 1.0,
            entry_price: 100.0,
            entry_cost: 100.0,
            exit_price: Some(100.0 + pl),
            exit_cost: Some(100.0 + pl),
            profit_loss: Some(pl),
            ending_balance: Some(10_000.0 + pl),
        }
    }

    #[test]
    fn empty_ledger_still_has_four_rows() {
        let s = summarize(RunKey::default(), &EngineParams::default(), &[]);
        assert_eq!(s.rows.len(), 4);
        assert_eq!(s.exit_count, 0);
        for r in &s.rows {
            assert_eq!(r.profit_executions + r.loss_executions, 0);
            assert_eq!(r.average_profit, None);
            assert_eq!(r.profit_percentage, 0.0);
            assert_eq!(r.analysis_pl, 0.0);
            assert_eq!(r.symbol, None);
        }
    }

    #[test]
    fn aggregates_by_direction_and_sign() {
        let events = vec![
            exit(Direction::Long, 300.0),
            exit(Direction::Long, 100.0),
            exit(Direction::Long, -50.0),
            exit(Direction::Short, 0.0),
        ];
        let s = summarize(RunKey::new(2, 5), &EngineParams::default(), &events);

        let lp = s.row(Direction::Long, PlType::Profit).unwrap();
        assert_eq!(lp.profit_executions, 2);
        assert_eq!(lp.average_profit, Some(200.0));
        assert_eq!(lp.max_profit, Some(300.0));
        assert_eq!(lp.min_profit, Some(100.0));
        assert_eq!(lp.profit_percentage, 66.67);
        assert_eq!(lp.loss_percentage, 33.33);
        assert_eq!(lp.position_pl, 400.0);

        let ll = s.row(Direction::Long, PlType::Loss).unwrap();
        assert_eq!(ll.loss_executions, 1);
        assert_eq!(ll.loss, -50.0);
        assert_eq!(ll.loss_percentage, 33.33);

        // Zero P&L counts as a loss.
        let sl = s.row(Direction::Short, PlType::Loss).unwrap();
        assert_eq!(sl.loss_executions, 1);
        assert_eq!(sl.loss_percentage, 100.0);

        let sp = s.row(Direction::Short, PlType::Profit).unwrap();
        assert_eq!(sp.profit_executions, 0);
        assert_eq!(sp.profit_percentage, 0.0);

        assert_eq!(s.analysis_pl(), 350.0);
        assert!(s.rows.iter().all(|r| r.analysis_pl == 350.0));
        assert_eq!(lp.symbol.as_deref(), Some("XBTUSD"));
    }

    #[test]
    fn entries_are_ignored() {
        let mut entry = exit(Direction::Long, 10.0);
        entry.entry_exit = EntryExit::Entry;
        let s = summarize(RunKey::default(), &EngineParams::default(), &[entry]);
        assert_eq!(s.exit_count, 0);
    }

    #[test]
    fn table_lists_all_rows() {
        let s = summarize(RunKey::default(), &EngineParams::default(), &[]);
        let text = s.to_string();
        assert_eq!(text.lines().count(), 1 + 1 + 4 + 1);
        assert!(text.contains("Short"));
    }
}
