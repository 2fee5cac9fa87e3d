//! Backtest report: pure functions over the trade log and equity curve.
//!
//! Every metric is recomputed from scratch; nothing here holds state.

use serde::{Deserialize, Serialize};

use crate::domain::{EquitySample, Fill};

/// Aggregate result of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub trades: Vec<Fill>,
    pub equity_curve: Vec<EquitySample>,
    pub total_return: f64,
    pub num_trades: usize,
    pub winrate: f64,
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub final_realized_pnl: f64,
    pub final_unrealized_pnl: f64,
}

impl BacktestReport {
    pub fn compute(trades: Vec<Fill>, equity_curve: Vec<EquitySample>) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|s| s.equity).collect();
        let last = equity_curve.last();
        Self {
            total_return: total_return(&equity),
            num_trades: trades.len(),
            winrate: winrate(&trades),
            max_drawdown: max_drawdown(&equity),
            final_equity: last.map_or(0.0, |s| s.equity),
            final_realized_pnl: last.map_or(0.0, |s| s.realized_pnl),
            final_unrealized_pnl: last.map_or(0.0, |s| s.unrealized_pnl),
            trades,
            equity_curve,
        }
    }

    /// Replace the closing PnL figures with the ledger's.
    ///
    /// The last equity sample is taken on the final PRICE_UPDATE, before any
    /// fill on that bar; the ledger has seen every fill.
    pub fn settle(mut self, realized_pnl: f64, unrealized_pnl: f64) -> Self {
        self.final_realized_pnl = realized_pnl;
        self.final_unrealized_pnl = unrealized_pnl;
        self.final_equity = realized_pnl + unrealized_pnl;
        self
    }

    /// Equity values only, in curve order.
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|s| s.equity).collect()
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Last equity minus first equity. 0.0 for an empty curve.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

/// Largest peak-to-trough decline, in equity units (non-negative).
///
/// 0.0 for an empty or non-decreasing curve.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        max_dd = max_dd.max(peak - eq);
    }
    max_dd
}

/// Fraction of fills whose signed cash flow is positive (i.e. sells).
pub fn winrate(trades: &[Fill]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.signed_value() > 0.0).count();
    winners as f64 / trades.len() as f64
}
