//! Export: JSON result and CSV equity/trade artifacts.
//!
//! JSON results carry a `schema_version`; newer versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use replaylab_core::domain::{EquitySample, Fill};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: timestamp, price, equity, realized_pnl, unrealized_pnl.
pub fn export_equity_csv(curve: &[EquitySample]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "price",
        "equity",
        "realized_pnl",
        "unrealized_pnl",
    ])?;
    for s in curve {
        wtr.write_record([
            s.timestamp.to_string(),
            s.price.to_string(),
            s.equity.to_string(),
            s.realized_pnl.to_string(),
            s.unrealized_pnl.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: order_id, symbol, side, quantity, price, status, timestamp.
pub fn export_trades_csv(trades: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "order_id",
        "symbol",
        "side",
        "quantity",
        "price",
        "status",
        "timestamp",
    ])?;
    for f in trades {
        wtr.write_record([
            f.order_id.to_string(),
            f.symbol.clone(),
            f.side.as_str().to_string(),
            f.quantity.to_string(),
            f.price.to_string(),
            f.status.as_str().to_string(),
            f.timestamp.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

pub fn save_json(result: &BacktestResult, path: &Path) -> Result<()> {
    write_file(path, &export_json(result)?)
}

pub fn load_json(path: &Path) -> Result<BacktestResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

pub fn save_equity_csv(curve: &[EquitySample], path: &Path) -> Result<()> {
    write_file(path, &export_equity_csv(curve)?)
}

pub fn save_trades_csv(trades: &[Fill], path: &Path) -> Result<()> {
    write_file(path, &export_trades_csv(trades)?)
}
