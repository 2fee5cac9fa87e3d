//! Bar: the fundamental market data unit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from bar construction and timestamp parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BarError {
    #[error("malformed timestamp '{0}': expected ISO-8601 or epoch seconds")]
    MalformedTimestamp(String),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' is not a number: {value}")]
    NotANumber { field: String, value: String },

    #[error("field '{0}' must be finite")]
    NonFinite(String),
}

/// OHLCV bar.
///
/// `timestamp` is UTC epoch seconds. Bars carry no symbol: the replay that
/// emits them decides which instrument they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: f64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Build a bar from a raw input row. The timestamp may be ISO-8601 or
    /// an epoch-seconds string.
    pub fn from_row(
        timestamp: &str,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarError> {
        let bar = Self::new(parse_timestamp(timestamp)?, open, high, low, close, volume);
        bar.check_finite()?;
        Ok(bar)
    }

    /// Map form: `{timestamp, open, high, low, close, volume}`.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("timestamp".into(), Value::from(self.timestamp));
        map.insert("open".into(), Value::from(self.open));
        map.insert("high".into(), Value::from(self.high));
        map.insert("low".into(), Value::from(self.low));
        map.insert("close".into(), Value::from(self.close));
        map.insert("volume".into(), Value::from(self.volume));
        map
    }

    /// Rebuild a bar from its map form. `volume` defaults to 0 when absent;
    /// every other field is required. String timestamps are parsed.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, BarError> {
        let timestamp = match map.get("timestamp").or_else(|| map.get("time")) {
            Some(Value::String(s)) => parse_timestamp(s)?,
            Some(v) => number_field("timestamp", v)?,
            None => return Err(BarError::MissingField("timestamp".into())),
        };
        let field = |name: &str| -> Result<f64, BarError> {
            map.get(name)
                .ok_or_else(|| BarError::MissingField(name.into()))
                .and_then(|v| number_field(name, v))
        };
        let volume = match map.get("volume") {
            Some(v) => number_field("volume", v)?,
            None => 0.0,
        };
        let bar = Self::new(
            timestamp,
            field("open")?,
            field("high")?,
            field("low")?,
            field("close")?,
            volume,
        );
        bar.check_finite()?;
        Ok(bar)
    }

    /// Bar time as a UTC datetime (None if out of chrono's range).
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9).round() as u32;
        DateTime::<Utc>::from_timestamp(secs as i64, nanos.min(999_999_999))
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.check_finite().is_err() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }

    fn check_finite(&self) -> Result<(), BarError> {
        for (name, value) in [
            ("timestamp", self.timestamp),
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(BarError::NonFinite(name.into()));
            }
        }
        Ok(())
    }
}

fn number_field(name: &str, value: &Value) -> Result<f64, BarError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| BarError::NotANumber {
            field: name.into(),
            value: n.to_string(),
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| BarError::NotANumber {
            field: name.into(),
            value: s.clone(),
        }),
        other => Err(BarError::NotANumber {
            field: name.into(),
            value: other.to_string(),
        }),
    }
}

/// Parse an ISO-8601 / RFC 3339 or epoch-seconds timestamp into UTC epoch seconds.
///
/// Timestamps without an offset are taken as UTC; a bare date means midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<f64, BarError> {
    let s = raw.trim();
    let malformed = || BarError::MalformedTimestamp(raw.to_string());
    if s.is_empty() {
        return Err(malformed());
    }

    if let Ok(secs) = s.parse::<f64>() {
        return if secs.is_finite() {
            Ok(secs)
        } else {
            Err(malformed())
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(epoch_seconds(&dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(epoch_seconds(&dt.with_timezone(&Utc)));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(epoch_seconds(&naive.and_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(malformed)?;
        return Ok(epoch_seconds(&midnight.and_utc()));
    }

    Err(malformed())
}

fn epoch_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}
