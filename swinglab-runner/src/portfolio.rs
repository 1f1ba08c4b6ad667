//! Daily portfolio balance: one row per group and calendar day (UTC), from
//! the day of the group's first ledger event to the day of its last.
//!
//! A day's ending balance is the ending balance of its last exit. Days
//! without an exit carry the previous day's balance forward, and the first
//! day starts from the first event's starting balance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swinglab_core::domain::{GroupKey, RunKey, TradeEvent};
use swinglab_core::numeric::money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DailyBalance {
    #[serde(rename = "FetchRunID")]
    pub fetch_run_id: u32,
    #[serde(rename = "AnalysisRunID")]
    pub analysis_run_id: u32,
    pub symbol: String,
    pub timeframe: String,
    pub execution_date: NaiveDate,
    /// Exits on this day.
    pub trade_number: usize,
    pub starting_balance: f64,
    pub ending_balance: f64,
    /// Day-over-day change in percent; 0 when the day starts from zero.
    pub percentage_change: f64,
}

/// Roll a run's ledger up into daily balances, in group then date order.
pub fn daily_balances(run: RunKey, events: &[TradeEvent]) -> Vec<DailyBalance> {
    let mut groups: BTreeMap<&GroupKey, Vec<&TradeEvent>> = BTreeMap::new();
    for event in events {
        groups.entry(&event.group).or_default().push(event);
    }

    let mut rows = Vec::new();
    for (group, mut group_events) in groups {
        group_events.sort_by_key(|e| e.timestamp);
        rows.extend(group_days(run, group, &group_events));
    }
    rows
}

fn group_days(run: RunKey, group: &GroupKey, events: &[&TradeEvent]) -> Vec<DailyBalance> {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Vec::new();
    };

    // Exit count and last ending balance per day.
    let mut exits: BTreeMap<NaiveDate, (usize, Option<f64>)> = BTreeMap::new();
    for exit in events.iter().filter(|e| e.is_exit()) {
        let day = exits.entry(exit.timestamp.date_naive()).or_default();
        day.0 += 1;
        if exit.ending_balance.is_some() {
            day.1 = exit.ending_balance;
        }
    }

    let last_day = last.timestamp.date_naive();
    let mut balance = money(first.starting_balance);
    first
        .timestamp
        .date_naive()
        .iter_days()
        .take_while(|date| *date <= last_day)
        .map(|date| {
            let starting = balance;
            let (trade_number, ending) = exits.get(&date).copied().unwrap_or_default();
            if let Some(ending) = ending {
                balance = money(ending);
            }
            DailyBalance {
                fetch_run_id: run.fetch_run_id,
                analysis_run_id: run.analysis_run_id,
                symbol: group.symbol.clone(),
                timeframe: group.timeframe.clone(),
                execution_date: date,
                trade_number,
                starting_balance: starting,
                ending_balance: balance,
                percentage_change: percentage_change(starting, balance),
            }
        })
        .collect()
}

fn percentage_change(starting: f64, ending: f64) -> f64 {
    if starting == 0.0 {
        return 0.0;
    }
    money((ending - starting) / starting * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Utc};
    use swinglab_core::domain::{Direction, EntryExit};

    fn event(symbol: &str, day: u32, hour: u32, starting: f64, ending: Option<f64>) -> TradeEvent {
        TradeEvent {
            group: GroupKey::new(symbol, "1h"),
            bar_index: (day * 24 + hour) as usize,
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            entry_exit: if ending.is_some() {
                EntryExit::Exit
            } else {
                EntryExit::Entry
            },
            direction: Direction::Long,
            starting_balance: starting,
            quantity: 100.0,
            entry_price: 100.0,
            entry_cost: 10_000.0,
            exit_price: ending.map(|_| 100.0),
            exit_cost: ending.map(|_| 10_000.0),
            profit_loss: ending.map(|e| e - starting),
            ending_balance: ending,
        }
    }

    #[test]
    fn days_without_exits_carry_the_balance_forward() {
        let events = vec![
            event("XBTUSD", 1, 3, 10_000.0, None),
            event("XBTUSD", 1, 9, 10_000.0, Some(10_200.0)),
            event("XBTUSD", 1, 12, 10_200.0, None),
            event("XBTUSD", 1, 20, 10_200.0, Some(10_100.0)),
            event("XBTUSD", 3, 5, 10_100.0, None),
            event("XBTUSD", 4, 7, 10_100.0, Some(10_605.0)),
        ];
        let rows = daily_balances(RunKey::new(3, 17), &events);

        let dates: Vec<u32> = rows.iter().map(|r| r.execution_date.day()).collect();
        assert_eq!(dates, vec![1, 2, 3, 4]);
        let trades: Vec<usize> = rows.iter().map(|r| r.trade_number).collect();
        assert_eq!(trades, vec![2, 0, 0, 1]);

        assert_eq!(rows[0].starting_balance, 10_000.0);
        assert_eq!(rows[0].ending_balance, 10_100.0);
        assert_eq!(rows[0].percentage_change, 1.0);
        for r in &rows[1..3] {
            assert_eq!(r.starting_balance, 10_100.0);
            assert_eq!(r.ending_balance, 10_100.0);
            assert_eq!(r.percentage_change, 0.0);
        }
        assert_eq!(rows[3].ending_balance, 10_605.0);
        assert_eq!(rows[3].percentage_change, 5.0);
        assert!(rows.iter().all(|r| r.fetch_run_id == 3 && r.analysis_run_id == 17));
    }

    #[test]
    fn groups_without_exits_stay_flat() {
        let events = vec![
            event("ETHUSD", 2, 1, 5_000.0, None),
            event("ETHUSD", 3, 1, 5_000.0, None),
        ];
        let rows = daily_balances(RunKey::default(), &events);
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.trade_number == 0 && r.ending_balance == 5_000.0));
    }

    #[test]
    fn groups_are_rolled_up_independently() {
        let events = vec![
            event("XBTUSD", 1, 1, 10_000.0, None),
            event("ETHUSD", 1, 2, 10_000.0, None),
            event("XBTUSD", 1, 3, 10_000.0, Some(10_500.0)),
            event("ETHUSD", 2, 4, 10_000.0, Some(9_000.0)),
        ];
        let rows = daily_balances(RunKey::default(), &events);
        let eth: Vec<&DailyBalance> = rows.iter().filter(|r| r.symbol == "ETHUSD").collect();
        let xbt: Vec<&DailyBalance> = rows.iter().filter(|r| r.symbol == "XBTUSD").collect();

        assert_eq!(rows[0].symbol, "ETHUSD");
        assert_eq!(eth.len(), 2);
        assert_eq!(eth[0].ending_balance, 10_000.0);
        assert_eq!(eth[1].ending_balance, 9_000.0);
        assert_eq!(eth[1].percentage_change, -10.0);
        assert_eq!(xbt.len(), 1);
        assert_eq!(xbt[0].ending_balance, 10_500.0);
        assert_eq!(xbt[0].timeframe, "1h");
    }

    #[test]
    fn empty_ledger_has_no_days() {
        assert!(daily_balances(RunKey::default(), &[]).is_empty());
    }
}
