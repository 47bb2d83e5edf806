//! Core data types: ticks, intervals and trading signals.

use crate::dates::{format_date, str_to_date, DateInput};
use crate::error::{Result, StockError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names of a cache file, in order.
pub const CSV_HEADER: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Volume", "Adj Close"];

/// Observation interval, stored as minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Interval {
    /// Live quote, polled once a minute.
    OneMinute,
    /// Daily history bar.
    OneDay,
}

impl Interval {
    /// Length of the interval in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Interval::OneMinute => 1,
            Interval::OneDay => 1440,
        }
    }
}

impl From<Interval> for u32 {
    fn from(interval: Interval) -> Self {
        interval.minutes()
    }
}

impl TryFrom<u32> for Interval {
    type Error = StockError;

    fn try_from(minutes: u32) -> Result<Self> {
        match minutes {
            1 => Ok(Interval::OneMinute),
            1440 => Ok(Interval::OneDay),
            other => Err(StockError::InvalidInput(format!(
                "Unsupported interval: {} minutes",
                other
            ))),
        }
    }
}

/// Provider a tick came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "goog")]
    Google,
    #[serde(rename = "yhoo")]
    Yahoo,
}

impl SourceType {
    /// Short provider tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Google => "goog",
            SourceType::Yahoo => "yhoo",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized price observation for a symbol.
///
/// `close` and `date` are always present. Daily history carries the OHLCV
/// columns and adjusted close; live quotes carry dividend, yield and the
/// provider's instrument id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub interval: Interval,
    pub symbol: String,
    pub open: Option<f64>,
    pub close: f64,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub date: NaiveDateTime,
    pub volume: Option<f64>,
    pub adj_close: Option<f64>,
    pub dividend: Option<f64>,
    #[serde(rename = "yield")]
    pub yield_pct: Option<f64>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
}

impl Tick {
    /// Create a tick with only the required fields; the date is parsed.
    pub fn new(
        interval: Interval,
        symbol: impl Into<String>,
        close: f64,
        date: impl Into<DateInput>,
    ) -> Result<Self> {
        Ok(Self {
            interval,
            symbol: symbol.into(),
            open: None,
            close,
            high: None,
            low: None,
            date: str_to_date(date)?,
            volume: None,
            adj_close: None,
            dividend: None,
            yield_pct: None,
            id: None,
            source_type: None,
        })
    }

    pub fn with_ohlc(mut self, open: f64, high: f64, low: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_adj_close(mut self, adj_close: f64) -> Self {
        self.adj_close = Some(adj_close);
        self
    }

    pub fn with_source(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    /// Header row of a cache file.
    pub fn csv_header() -> [&'static str; 7] {
        CSV_HEADER
    }

    /// The tick as a cache row: `Date,Open,High,Low,Close,Volume,Adj Close`.
    ///
    /// Absent values become empty cells.
    pub fn to_csv_record(&self) -> [String; 7] {
        [
            format_date(&self.date),
            fmt_opt(self.open),
            fmt_opt(self.high),
            fmt_opt(self.low),
            self.close.to_string(),
            fmt_opt(self.volume),
            fmt_opt(self.adj_close),
        ]
    }

    /// Check that present OHLC values are mutually consistent.
    pub fn is_consistent(&self) -> bool {
        let close_ok = self.close.is_finite() && self.close >= 0.0;
        let range_ok = match (self.high, self.low) {
            (Some(high), Some(low)) => {
                high >= low
                    && self.open.map_or(true, |o| o <= high && o >= low)
                    && self.close <= high
                    && self.close >= low
            }
            _ => true,
        };
        let volume_ok = self.volume.map_or(true, |v| v >= 0.0);
        close_ok && range_ok && volume_ok
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Decision returned by a strategy for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Signal {
    /// Buy the given number of shares.
    Buy(f64),
    /// Sell the given number of shares.
    Sell(f64),
    /// Do nothing.
    #[default]
    Hold,
}
