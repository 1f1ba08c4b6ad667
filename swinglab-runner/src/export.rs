//! Flat CSV and JSON formats for run artifacts.
//!
//! Annotated bars and ledger rows are written with the column names of the
//! analysis tables (`DateTime`, `IsSwingHigh`, `EntryExit`, ...) and tagged
//! with the run identifiers. Empty cells are nulls.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use swinglab_core::domain::{
    Direction, EntryExit, GroupKey, PriceLevels, SignalMark, SwingMark, SwingType, TradeEvent,
    TradeMark, Trend, TrendMark,
};
use swinglab_core::{AnnotatedBar, Bar, RunKey};

use crate::portfolio::DailyBalance;
use crate::summary::RunSummary;

// ─── Annotated bars ─────────────────────────────────────────────────

/// One stored annotated bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnnotatedRow {
    // ── Bar ──
    pub date_time: DateTime<Utc>,
    pub timeframe: String,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    // ── Analysis ──
    pub is_swing_high: bool,
    pub is_swing_low: bool,
    pub swing_type: Option<SwingType>,
    pub trend_slope: Option<f64>,
    pub trend: Trend,
    pub buy_signal: bool,
    pub sell_signal: bool,

    // ── Trade ──
    pub in_trade: bool,
    pub entry_exit: Option<f64>,
    pub long_short: Option<Direction>,
    pub starting_balance: Option<f64>,
    pub leverage: Option<f64>,
    pub quantity: Option<f64>,
    pub entry_price: Option<f64>,
    pub entry_cost: Option<f64>,
    pub long_profit_target_price: Option<f64>,
    pub long_stop_loss_price: Option<f64>,
    pub short_profit_target_price: Option<f64>,
    pub short_stop_loss_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_cost: Option<f64>,
    pub profit_loss: Option<f64>,
    pub ending_balance: Option<f64>,

    // ── Run ──
    #[serde(rename = "FetchRunID")]
    pub fetch_run_id: u32,
    #[serde(rename = "AnalysisRunID")]
    pub analysis_run_id: u32,
}

impl AnnotatedRow {
    pub fn new(run: RunKey, row: &AnnotatedBar) -> Self {
        let bar = &row.bar;
        let t = &row.trade;
        Self {
            date_time: bar.timestamp,
            timeframe: bar.timeframe.clone(),
            symbol: bar.symbol.clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            is_swing_high: row.swing.is_swing_high,
            is_swing_low: row.swing.is_swing_low,
            swing_type: row.swing.swing_type,
            trend_slope: row.trend.slope,
            trend: row.trend.trend,
            buy_signal: row.signal.buy_signal,
            sell_signal: row.signal.sell_signal,
            in_trade: t.in_trade,
            entry_exit: t.entry_exit.map(|e| e.as_f64()),
            long_short: t.long_short,
            starting_balance: t.starting_balance,
            leverage: t.leverage,
            quantity: t.quantity,
            entry_price: t.entry_price,
            entry_cost: t.entry_cost,
            long_profit_target_price: t.long_levels.map(|l| l.target),
            long_stop_loss_price: t.long_levels.map(|l| l.stop),
            short_profit_target_price: t.short_levels.map(|l| l.target),
            short_stop_loss_price: t.short_levels.map(|l| l.stop),
            exit_price: t.exit_price,
            exit_cost: t.exit_cost,
            profit_loss: t.profit_loss,
            ending_balance: t.ending_balance,
            fetch_run_id: run.fetch_run_id,
            analysis_run_id: run.analysis_run_id,
        }
    }

    pub fn run(&self) -> RunKey {
        RunKey::new(self.fetch_run_id, self.analysis_run_id)
    }

    pub fn into_annotated(self) -> Result<AnnotatedBar> {
        let entry_exit = match self.entry_exit {
            None => None,
            Some(code) => match EntryExit::from_f64(code) {
                Some(e) => Some(e),
                None => bail!("invalid EntryExit value {code} at {}", self.date_time),
            },
        };
        let levels = |target: Option<f64>, stop: Option<f64>| match (target, stop) {
            (Some(target), Some(stop)) => Some(PriceLevels { target, stop }),
            _ => None,
        };

        Ok(AnnotatedBar {
            swing: SwingMark {
                is_swing_high: self.is_swing_high,
                is_swing_low: self.is_swing_low,
                swing_type: self.swing_type,
            },
            trend: TrendMark {
                slope: self.trend_slope,
                trend: self.trend,
            },
            signal: SignalMark {
                buy_signal: self.buy_signal,
                sell_signal: self.sell_signal,
            },
            trade: TradeMark {
                in_trade: self.in_trade,
                entry_exit,
                long_short: self.long_short,
                starting_balance: self.starting_balance,
                leverage: self.leverage,
                quantity: self.quantity,
                entry_price: self.entry_price,
                entry_cost: self.entry_cost,
                long_levels: levels(self.long_profit_target_price, self.long_stop_loss_price),
                short_levels: levels(self.short_profit_target_price, self.short_stop_loss_price),
                exit_price: self.exit_price,
                exit_cost: self.exit_cost,
                profit_loss: self.profit_loss,
                ending_balance: self.ending_balance,
            },
            bar: Bar {
                timestamp: self.date_time,
                symbol: self.symbol,
                timeframe: self.timeframe,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
                volume: self.volume,
            },
        })
    }
}

pub fn annotated_to_csv(run: RunKey, bars: &[AnnotatedBar]) -> Result<String> {
    let mut buf = Vec::new();
    write_annotated(&mut buf, run, bars, true)?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

/// Write annotated rows to `out`, with or without the header line.
pub fn write_annotated<W: Write>(
    out: W,
    run: RunKey,
    bars: &[AnnotatedBar],
    header: bool,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(header).from_writer(out);
    for row in bars {
        wtr.serialize(AnnotatedRow::new(run, row))
            .context("failed to write annotated row")?;
    }
    wtr.flush().context("failed to flush CSV writer")
}

pub fn annotated_from_csv(text: &str) -> Result<Vec<AnnotatedBar>> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    rdr.deserialize::<AnnotatedRow>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("malformed annotated row {}", i + 2))?
                .into_annotated()
        })
        .collect()
}

// ─── Ledger ─────────────────────────────────────────────────────────

/// One stored ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LedgerRow {
    pub date_time: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: String,
    pub bar_index: usize,
    pub entry_exit: f64,
    pub long_short: Direction,
    pub starting_balance: f64,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_cost: f64,
    pub exit_price: Option<f64>,
    pub exit_cost: Option<f64>,
    pub profit_loss: Option<f64>,
    pub ending_balance: Option<f64>,
    #[serde(rename = "FetchRunID")]
    pub fetch_run_id: u32,
    #[serde(rename = "AnalysisRunID")]
    pub analysis_run_id: u32,
}

impl LedgerRow {
    pub fn new(run: RunKey, e: &TradeEvent) -> Self {
        Self {
            date_time: e.timestamp,
            symbol: e.group.symbol.clone(),
            timeframe: e.group.timeframe.clone(),
            bar_index: e.bar_index,
            entry_exit: e.entry_exit.as_f64(),
            long_short: e.direction,
            starting_balance: e.starting_balance,
            quantity: e.quantity,
            entry_price: e.entry_price,
            entry_cost: e.entry_cost,
            exit_price: e.exit_price,
            exit_cost: e.exit_cost,
            profit_loss: e.profit_loss,
            ending_balance: e.ending_balance,
            fetch_run_id: run.fetch_run_id,
            analysis_run_id: run.analysis_run_id,
        }
    }

    pub fn into_event(self) -> Result<TradeEvent> {
        let Some(entry_exit) = EntryExit::from_f64(self.entry_exit) else {
            bail!("invalid EntryExit value {} at {}", self.entry_exit, self.date_time);
        };
        Ok(TradeEvent {
            group: GroupKey::new(self.symbol, self.timeframe),
            bar_index: self.bar_index,
            timestamp: self.date_time,
            entry_exit,
            direction: self.long_short,
            starting_balance: self.starting_balance,
            quantity: self.quantity,
            entry_price: self.entry_price,
            entry_cost: self.entry_cost,
            exit_price: self.exit_price,
            exit_cost: self.exit_cost,
            profit_loss: self.profit_loss,
            ending_balance: self.ending_balance,
        })
    }
}

pub fn ledger_to_csv(run: RunKey, events: &[TradeEvent]) -> Result<String> {
    let mut buf = Vec::new();
    write_ledger(&mut buf, run, events, true)?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

pub fn write_ledger<W: Write>(
    out: W,
    run: RunKey,
    events: &[TradeEvent],
    header: bool,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(header).from_writer(out);
    for event in events {
        wtr.serialize(LedgerRow::new(run, event))
            .context("failed to write ledger row")?;
    }
    wtr.flush().context("failed to flush CSV writer")
}

pub fn ledger_from_csv(text: &str) -> Result<Vec<TradeEvent>> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    rdr.deserialize::<LedgerRow>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("malformed ledger row {}", i + 2))?
                .into_event()
        })
        .collect()
}

// ─── Daily portfolio balance ────────────────────────────────────────

pub fn portfolio_to_csv(rows: &[DailyBalance]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row).context("failed to write daily balance")?;
    }
    finish(wtr)
}

pub fn portfolio_from_csv(text: &str) -> Result<Vec<DailyBalance>> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    rdr.deserialize::<DailyBalance>()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("malformed daily balance row {}", i + 2)))
        .collect()
}

// ─── Summary ────────────────────────────────────────────────────────

pub fn summary_to_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize run summary")
}

pub fn summary_from_json(json: &str) -> Result<RunSummary> {
    serde_json::from_str(json).context("failed to deserialize run summary")
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn bar(hour: u32, close: f64) -> Bar {
        Bar {
            timestamp: ts(hour),
            symbol: "XBTUSD".into(),
            timeframe: "1h".into(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 5.0,
        }
    }

    fn flat(hour: u32) -> AnnotatedBar {
        AnnotatedBar {
            bar: bar(hour, 100.0),
            swing: SwingMark::default(),
            trend: TrendMark::from_slope(None),
            signal: SignalMark::none(),
            trade: TradeMark::default(),
        }
    }

    fn entry(hour: u32) -> AnnotatedBar {
        AnnotatedBar {
            bar: bar(hour, 100.0),
            swing: SwingMark {
                is_swing_high: false,
                is_swing_low: true,
                swing_type: Some(SwingType::HL),
            },
            trend: TrendMark::from_slope(Some(0.125)),
            signal: SignalMark::buy(),
            trade: TradeMark {
                in_trade: true,
                entry_exit: Some(EntryExit::Entry),
                long_short: Some(Direction::Long),
                starting_balance: Some(10_000.0),
                leverage: Some(1.0),
                quantity: Some(100.0),
                entry_price: Some(100.0),
                entry_cost: Some(10_000.0),
                long_levels: Some(PriceLevels {
                    target: 102.0,
                    stop: 98.0,
                }),
                ..TradeMark::default()
            },
        }
    }

    #[test]
    fn annotated_csv_restores_rows() {
        let rows = vec![flat(0), entry(1)];
        let csv = annotated_to_csv(RunKey::new(3, 17), &rows).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("DateTime,Timeframe,Symbol,Open"));
        assert!(header.ends_with("FetchRunID,AnalysisRunID"));
        assert_eq!(annotated_from_csv(&csv).unwrap(), rows);
    }

    #[test]
    fn nulls_are_empty_cells() {
        let csv = annotated_to_csv(RunKey::default(), &[flat(0)]).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert!(line.contains(",false,false,,,Sideways,"));
    }

    #[test]
    fn leverage_is_null_on_flat_rows() {
        let csv = annotated_to_csv(RunKey::default(), &[flat(0), entry(1)]).unwrap();
        let mut lines = csv.lines();
        let column = lines
            .next()
            .unwrap()
            .split(',')
            .position(|h| h == "Leverage")
            .unwrap();
        let cells: Vec<&str> = lines.map(|l| l.split(',').nth(column).unwrap()).collect();
        assert_eq!(cells, vec!["", "1.0"]);
    }

    #[test]
    fn bad_entry_exit_code_is_rejected() {
        let rows = vec![entry(1)];
        let csv = annotated_to_csv(RunKey::default(), &rows).unwrap();
        let broken = csv.replacen(",1.0,Long,", ",3.0,Long,", 1);
        assert!(annotated_from_csv(&broken).is_err());
    }

    #[test]
    fn appended_rows_read_back_as_one_file() {
        let mut buf = Vec::new();
        write_annotated(&mut buf, RunKey::default(), &[flat(0)], true).unwrap();
        write_annotated(&mut buf, RunKey::default(), &[entry(1)], false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(annotated_from_csv(&text).unwrap(), vec![flat(0), entry(1)]);
    }

    #[test]
    fn ledger_csv_restores_events() {
        let group = GroupKey::new("XBTUSD", "1h");
        let row = entry(1);
        let event = TradeEvent::from_mark(&group, 1, row.bar.timestamp, &row.trade).unwrap();
        let csv = ledger_to_csv(RunKey::default(), std::slice::from_ref(&event)).unwrap();
        assert_eq!(ledger_from_csv(&csv).unwrap(), vec![event]);
    }

    #[test]
    fn portfolio_csv_restores_rows() {
        let rows = vec![DailyBalance {
            fetch_run_id: 3,
            analysis_run_id: 17,
            symbol: "XBTUSD".into(),
            timeframe: "1h".into(),
            execution_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            trade_number: 2,
            starting_balance: 10_000.0,
            ending_balance: 10_100.0,
            percentage_change: 1.0,
        }];
        let csv = portfolio_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("FetchRunID,AnalysisRunID,Symbol,Timeframe,ExecutionDate,TradeNumber,StartingBalance,EndingBalance,PercentageChange")
        );
        assert!(lines.next().unwrap().starts_with("3,17,XBTUSD,1h,2024-03-01,2,"));
        assert_eq!(portfolio_from_csv(&csv).unwrap(), rows);
    }
}
