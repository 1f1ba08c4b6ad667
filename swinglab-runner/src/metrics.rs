//! Performance metrics: pure functions over an equity curve and round trips.
//!
//! Every metric is a pure function: equity values and/or trade list in,
//! scalar out. Metrics are computed per group, since each group simulates
//! its own balance.

use serde::{Deserialize, Serialize};
use swinglab_core::backtest::EquityPoint;
use swinglab_core::domain::TradeRecord;
use swinglab_core::AnnotatedBar;

/// Aggregate performance metrics for one group of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and round trips.
    pub fn compute(equity_curve: &[EquityPoint], trades: &[TradeRecord]) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        Self {
            total_return: total_return(&equity),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_bars_held: avg_bars_held(trades),
        }
    }
}

/// Mark-to-market equity per bar, rebuilt from stored trade marks.
///
/// Flat bars carry the balance after the last exit; in-trade bars add the
/// open position's unrealized P&L at the close.
pub fn equity_from_rows(rows: &[AnnotatedBar], starting_balance: f64) -> Vec<EquityPoint> {
    let mut balance = starting_balance;
    rows.iter()
        .map(|row| {
            let t = &row.trade;
            let equity = match (t.ending_balance, t.long_short, t.quantity, t.entry_cost) {
                (Some(ending), ..) => {
                    balance = ending;
                    ending
                }
                (None, Some(direction), Some(qty), Some(cost)) if t.in_trade => {
                    balance + direction.sign() * (qty * row.bar.close - cost)
                }
                _ => balance,
            };
            EquityPoint {
                timestamp: row.bar.timestamp,
                equity,
            }
        })
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if equity.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity never falls below a prior peak.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of round trips with positive P&L.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profits / gross losses, capped at 100.0 when there are no losses.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .map(|t| t.profit_loss)
        .filter(|p| *p > 0.0)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .map(|t| t.profit_loss)
        .filter(|p| *p < 0.0)
        .map(f64::abs)
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn avg_bars_held(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held).sum::<usize>() as f64 / trades.len() as f64
}

/// Longest run of winners (`winners = true`) or non-winners.
pub fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
