//! Date parsing and fetch-range resolution.
//!
//! Dates reach the crate as command-line text, provider fields, Unix
//! timestamps or native chrono values. Everything is normalized to a
//! [`NaiveDateTime`] in local wall-clock time and written back out as
//! `YYYY-MM-DD`.

use crate::error::{Result, StockError};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use tracing::{debug, warn};

/// Canonical date format used for cache names and CSV rows.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default look-back, in days, when no start date is given.
pub const ONE_YEAR: i64 = 365;

/// A date in any of the shapes the crate accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    /// Free-form text, parsed leniently.
    Text(String),
    /// Unix timestamp in seconds.
    Timestamp(i64),
    /// Calendar date (midnight).
    Date(NaiveDate),
    /// Wall-clock date-time.
    DateTime(NaiveDateTime),
}

impl DateInput {
    /// Empty text counts as "not given".
    fn is_blank(&self) -> bool {
        matches!(self, DateInput::Text(s) if s.trim().is_empty())
    }
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        DateInput::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        DateInput::Text(s)
    }
}

impl From<i64> for DateInput {
    fn from(ts: i64) -> Self {
        DateInput::Timestamp(ts)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl From<NaiveDateTime> for DateInput {
    fn from(dt: NaiveDateTime) -> Self {
        DateInput::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(dt: DateTime<Utc>) -> Self {
        DateInput::DateTime(dt.with_timezone(&Local).naive_local())
    }
}

impl From<DateTime<Local>> for DateInput {
    fn from(dt: DateTime<Local>) -> Self {
        DateInput::DateTime(dt.naive_local())
    }
}

impl fmt::Display for DateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateInput::Text(s) => write!(f, "{}", s),
            DateInput::Timestamp(ts) => write!(f, "{}", ts),
            DateInput::Date(d) => write!(f, "{}", d),
            DateInput::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

/// Parse any supported date shape into a local wall-clock date-time.
pub fn str_to_date(input: impl Into<DateInput>) -> Result<NaiveDateTime> {
    match input.into() {
        DateInput::DateTime(dt) => Ok(dt),
        DateInput::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
        DateInput::Timestamp(ts) => timestamp_to_local(ts),
        DateInput::Text(s) => parse_text(&s),
    }
}

/// Format a date with `format`, parsing it first when needed.
pub fn date_to_str(input: impl Into<DateInput>, format: &str) -> Result<String> {
    let dt = str_to_date(input)?;
    let mut out = String::new();
    write!(out, "{}", dt.format(format))
        .map_err(|_| StockError::InvalidInput(format!("Invalid date format: '{}'", format)))?;
    Ok(out)
}

/// Format a date-time with [`DATE_FORMAT`].
pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn timestamp_to_local(ts: i64) -> Result<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .ok_or_else(|| StockError::DateParseError(ts.to_string()))
}

fn parse_text(raw: &str) -> Result<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(StockError::DateParseError("empty string".to_string()));
    }

    // Offset-aware forms keep the wall clock they were written in
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.naive_local());
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y/%m/%d %H:%M:%S",
        "%d-%m-%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];

    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    let date_formats = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%d-%b-%Y",
        "%d %b %Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%d %B %Y",
    ];

    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        // 20240115 reads as a compact date before falling back to epoch seconds
        if s.len() == 8 {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
                return Ok(d.and_time(NaiveTime::MIN));
            }
        }
        if let Ok(ts) = s.parse::<i64>() {
            debug!("Reading '{}' as a Unix timestamp", s);
            return timestamp_to_local(ts);
        }
    }

    Err(StockError::DateParseError(raw.to_string()))
}

/// A resolved, canonical `YYYY-MM-DD` date pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRange {
    pub start: String,
    pub end: String,
}

impl FetchRange {
    /// Resolve an optional start/end against the current local time.
    ///
    /// The end defaults to now and the start to one year before the end.
    pub fn resolve(start: Option<DateInput>, end: Option<DateInput>) -> Result<Self> {
        Self::resolve_at(start, end, Local::now().naive_local())
    }

    /// Same as [`FetchRange::resolve`] with an explicit "now".
    pub fn resolve_at(
        start: Option<DateInput>,
        end: Option<DateInput>,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let end = match end.filter(|e| !e.is_blank()) {
            Some(e) => str_to_date(e)?,
            None => now,
        };

        let start = match start.filter(|s| !s.is_blank()) {
            Some(s) => str_to_date(s)?,
            None => end
                .checked_sub_signed(Duration::days(ONE_YEAR))
                .ok_or_else(|| {
                    StockError::DateParseError(format!(
                        "{} is too early to look back one year",
                        format_date(&end)
                    ))
                })?,
        };

        if start.date() > end.date() {
            warn!(
                "Start {} is after end {}; the range will be empty",
                format_date(&start),
                format_date(&end)
            );
        }

        Ok(Self {
            start: format_date(&start),
            end: format_date(&end),
        })
    }

    /// Start as a calendar date.
    pub fn start_date(&self) -> Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(&self.start, DATE_FORMAT)?)
    }

    /// End as a calendar date.
    pub fn end_date(&self) -> Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(&self.end, DATE_FORMAT)?)
    }
}

impl fmt::Display for FetchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}
