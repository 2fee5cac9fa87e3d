//! Run fingerprinting: deterministic identification of backtest outcomes.
//!
//! - `dataset_hash`: the input bars, bit for bit.
//! - `trades_hash`: every fill field in order (floats by bit pattern).
//! - `equity_hash`: every equity sample in order (floats by bit pattern).
//! - `run_hash`: all three combined. Equal run hashes mean bit-identical runs.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, EquitySample, Fill};
use crate::report::BacktestReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub dataset_hash: String,
    pub trades_hash: String,
    pub equity_hash: String,
    pub run_hash: String,
    pub num_trades: usize,
    pub num_equity_samples: usize,
}

impl RunFingerprint {
    pub fn compute(bars: &[Bar], report: &BacktestReport) -> Self {
        let dataset = hash_bars(bars);
        let trades = hash_trades(&report.trades);
        let equity = hash_equity(&report.equity_curve);

        let mut hasher = blake3::Hasher::new();
        hasher.update(dataset.as_bytes());
        hasher.update(trades.as_bytes());
        hasher.update(equity.as_bytes());

        Self {
            dataset_hash: dataset.to_hex().to_string(),
            trades_hash: trades.to_hex().to_string(),
            equity_hash: equity.to_hex().to_string(),
            run_hash: hasher.finalize().to_hex().to_string(),
            num_trades: report.trades.len(),
            num_equity_samples: report.equity_curve.len(),
        }
    }

    /// First 16 hex characters of the run hash, for logs.
    pub fn short(&self) -> &str {
        &self.run_hash[..self.run_hash.len().min(16)]
    }
}

fn update_f64(hasher: &mut blake3::Hasher, value: f64) {
    hasher.update(&value.to_bits().to_le_bytes());
}

/// Length-prefixed so adjacent strings cannot alias.
fn update_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

pub fn hash_bars(bars: &[Bar]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        for v in [bar.timestamp, bar.open, bar.high, bar.low, bar.close, bar.volume] {
            update_f64(&mut hasher, v);
        }
    }
    hasher.finalize()
}

pub fn hash_trades(trades: &[Fill]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for fill in trades {
        update_str(&mut hasher, fill.order_id.as_str());
        update_str(&mut hasher, &fill.symbol);
        update_str(&mut hasher, fill.side.as_str());
        update_f64(&mut hasher, fill.quantity);
        update_f64(&mut hasher, fill.price);
        update_f64(&mut hasher, fill.timestamp);
    }
    hasher.finalize()
}

pub fn hash_equity(curve: &[EquitySample]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for s in curve {
        for v in [s.timestamp, s.price, s.equity, s.realized_pnl, s.unrealized_pnl] {
            update_f64(&mut hasher, v);
        }
    }
    hasher.finalize()
}
