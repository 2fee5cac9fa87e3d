//! Bar loading from CSV and Parquet files.
//!
//! Both formats use the columns `timestamp` (or `time`), `open`, `high`,
//! `low`, `close` and an optional `volume`. Column names are matched
//! case-insensitively. CSV timestamps may be ISO-8601 or epoch seconds;
//! Parquet timestamps are numeric epoch seconds or strings.
//!
//! Rows are returned in file order. Ordering policy belongs to the replayer.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use replaylab_core::domain::{parse_timestamp, Bar};
use replaylab_core::ConfigError;

const TIMESTAMP_ALIASES: [&str; 2] = ["timestamp", "time"];
const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("unsupported data file '{0}' (expected .csv or .parquet)")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<PolarsError> for LoadError {
    fn from(e: PolarsError) -> Self {
        LoadError::Parquet(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(DataFormat::Csv),
            Some("parquet") | Some("pq") => Ok(DataFormat::Parquet),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load bars from a `.csv` or `.parquet` file.
pub fn load_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let format = DataFormat::from_path(path)?;
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = match format {
        DataFormat::Csv => read_csv(file)?,
        DataFormat::Parquet => read_parquet(file)?,
    };
    info!(path = %path.display(), bars = bars.len(), ?format, "loaded bars");
    Ok(bars)
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    timestamp: usize,
    prices: [usize; 4],
    volume: Option<usize>,
}

impl Columns {
    fn resolve<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let names: Vec<String> = headers
            .into_iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        let timestamp = TIMESTAMP_ALIASES
            .iter()
            .find_map(|alias| find(alias))
            .ok_or_else(|| missing_column("timestamp"))?;
        let mut prices = [0; 4];
        for (slot, name) in prices.iter_mut().zip(PRICE_COLUMNS) {
            *slot = find(name).ok_or_else(|| missing_column(name))?;
        }
        Ok(Self {
            timestamp,
            prices,
            volume: find("volume"),
        })
    }
}

fn missing_column(name: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: "columns".into(),
        reason: format!("missing required column '{name}'"),
    }
}

/// Read bars from CSV text with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let cols = Columns::resolve(rdr.headers()?.iter())?;
    debug!(?cols, "csv columns");

    let mut bars = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record?;
        let cell = |pos: usize, field: &str| -> Result<&str, ConfigError> {
            record
                .get(pos)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingBarField {
                    index,
                    field: field.into(),
                })
        };
        let number = |pos: usize, field: &str| -> Result<f64, ConfigError> {
            let raw = cell(pos, field)?;
            raw.parse::<f64>().map_err(|_| ConfigError::InvalidBar {
                index,
                reason: format!("field '{field}' is not a number: {raw}"),
            })
        };

        let timestamp = cell(cols.timestamp, "timestamp")?;
        let [open, high, low, close] = [
            number(cols.prices[0], "open")?,
            number(cols.prices[1], "high")?,
            number(cols.prices[2], "low")?,
            number(cols.prices[3], "close")?,
        ];
        let volume = match cols.volume {
            Some(pos) if record.get(pos).is_some_and(|v| !v.is_empty()) => {
                number(pos, "volume")?
            }
            _ => 0.0,
        };
        let bar = Bar::from_row(timestamp, open, high, low, close, volume).map_err(|e| {
            ConfigError::InvalidBar {
                index,
                reason: e.to_string(),
            }
        })?;
        bars.push(bar);
    }
    Ok(bars)
}

/// Read bars from a Parquet file. Numeric columns of any width are cast to `f64`.
pub fn read_parquet(file: File) -> Result<Vec<Bar>, LoadError> {
    let df = ParquetReader::new(file).finish()?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let cols = Columns::resolve(names.iter().map(String::as_str))?;

    let timestamps = timestamp_column(df.select_at_idx(cols.timestamp), &names[cols.timestamp])?;
    let float_column = |pos: usize| -> Result<Vec<Option<f64>>, LoadError> {
        let column = df
            .select_at_idx(pos)
            .ok_or_else(|| LoadError::Parquet(format!("no column at index {pos}")))?;
        let cast = column.cast(&DataType::Float64)?;
        Ok(cast.f64()?.into_iter().collect())
    };
    let prices = [
        float_column(cols.prices[0])?,
        float_column(cols.prices[1])?,
        float_column(cols.prices[2])?,
        float_column(cols.prices[3])?,
    ];
    let volumes = cols.volume.map(float_column).transpose()?;

    let mut bars = Vec::with_capacity(df.height());
    for index in 0..df.height() {
        let required = |values: &[Option<f64>], field: &str| -> Result<f64, ConfigError> {
            values
                .get(index)
                .copied()
                .flatten()
                .ok_or_else(|| ConfigError::MissingBarField {
                    index,
                    field: field.into(),
                })
        };
        let timestamp = required(&timestamps, "timestamp")?;
        let volume = volumes
            .as_ref()
            .and_then(|v| v.get(index).copied().flatten())
            .unwrap_or(0.0);
        let [open, high, low, close] = [
            required(&prices[0], "open")?,
            required(&prices[1], "high")?,
            required(&prices[2], "low")?,
            required(&prices[3], "close")?,
        ];
        if ![timestamp, open, high, low, close, volume]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigError::InvalidBar {
                index,
                reason: "non-finite value".into(),
            }
            .into());
        }
        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }
    Ok(bars)
}

/// Epoch seconds from a numeric or string timestamp column.
fn timestamp_column(column: Option<&Column>, name: &str) -> Result<Vec<Option<f64>>, LoadError> {
    let column = column.ok_or_else(|| missing_column(name))?;
    if column.dtype() == &DataType::String {
        return column
            .str()?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.map(|s| {
                    parse_timestamp(s).map_err(|e| ConfigError::InvalidBar {
                        index,
                        reason: e.to_string(),
                    })
                })
                .transpose()
                .map_err(LoadError::from)
            })
            .collect();
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}
