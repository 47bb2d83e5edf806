//! Quote providers and raw-record normalization.
//!
//! Providers hand back loosely typed JSON records whose field names depend on
//! the provider. The `tick_from_*` functions map those records onto [`Tick`].
//!
//! - [`YahooClient`]: daily history and latest quote from the chart endpoint
//! - [`GoogleClient`]: latest quote from the legacy info endpoint

mod google;
mod yahoo;

pub use google::{GoogleClient, DEFAULT_GOOGLE_URL};
pub use yahoo::{YahooClient, DEFAULT_YAHOO_URL};

use crate::dates::{DateInput, FetchRange};
use crate::error::{Result, StockError};
use crate::types::{Interval, SourceType, Tick};
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::warn;

/// A provider record: field name to loosely typed value.
pub type RawRecord = Map<String, Value>;

pub const GOOGLE_FINAL_PRICE_FIELD: &str = "LastTradePrice";
pub const GOOGLE_DATE_FIELD: &str = "LastTradeDateTime";
pub const GOOGLE_DIVIDEND_FIELD: &str = "Dividend";
pub const GOOGLE_YIELD_FIELD: &str = "Yield";
pub const GOOGLE_ID_FIELD: &str = "ID";

pub const YAHOO_FINAL_PRICE_FIELD: &str = "Close";
pub const YAHOO_OPEN_FIELD: &str = "Open";
pub const YAHOO_HIGH_FIELD: &str = "High";
pub const YAHOO_LOW_FIELD: &str = "Low";
pub const YAHOO_VOLUME_FIELD: &str = "Volume";
pub const YAHOO_DATE_FIELD: &str = "Date";
pub const YAHOO_ADJ_CLOSE_FIELD: &str = "Adj_Close";

/// Source of the most recent price of a symbol.
pub trait QuoteSource: Send + Sync {
    /// Provider that produces the quotes.
    fn source_type(&self) -> SourceType;

    /// Fetch the latest quote.
    fn latest(&self, symbol: &str) -> Result<Tick>;
}

/// Source of daily price history.
pub trait HistorySource: Send + Sync {
    /// Provider that produces the history.
    fn source_type(&self) -> SourceType;

    /// Fetch daily ticks between `range.start` and `range.end`, inclusive.
    ///
    /// Ordering is provider-defined.
    fn history(&self, symbol: &str, range: &FetchRange) -> Result<Vec<Tick>>;
}

/// Normalize a Yahoo-shaped daily record.
pub fn tick_from_yahoo(symbol: &str, record: &RawRecord) -> Result<Tick> {
    let source = SourceType::Yahoo;
    let close = required_number(record, YAHOO_FINAL_PRICE_FIELD, source)?;
    let date = required_date(record, YAHOO_DATE_FIELD, source)?;

    let mut tick = Tick::new(Interval::OneDay, symbol, close, date)?;
    tick.open = optional_number(record, YAHOO_OPEN_FIELD)?;
    tick.high = optional_number(record, YAHOO_HIGH_FIELD)?;
    tick.low = optional_number(record, YAHOO_LOW_FIELD)?;
    tick.volume = optional_number(record, YAHOO_VOLUME_FIELD)?;
    tick.adj_close = optional_number(record, YAHOO_ADJ_CLOSE_FIELD)?;
    tick.source_type = Some(source);

    if !tick.is_consistent() {
        warn!("Inconsistent OHLC values for {} on {}", symbol, tick.date);
    }
    Ok(tick)
}

/// Normalize a Google-shaped live quote record.
pub fn tick_from_google(symbol: &str, record: &RawRecord) -> Result<Tick> {
    let source = SourceType::Google;
    let close = required_number(record, GOOGLE_FINAL_PRICE_FIELD, source)?;
    let date = required_date(record, GOOGLE_DATE_FIELD, source)?;

    let mut tick = Tick::new(Interval::OneMinute, symbol, close, date)?;
    tick.dividend = optional_number(record, GOOGLE_DIVIDEND_FIELD)?;
    tick.yield_pct = optional_number(record, GOOGLE_YIELD_FIELD)?;
    tick.id = optional_text(record, GOOGLE_ID_FIELD);
    tick.source_type = Some(source);
    Ok(tick)
}

fn required_number(record: &RawRecord, field: &'static str, source: SourceType) -> Result<f64> {
    optional_number(record, field)?.ok_or(StockError::MissingField {
        field,
        source_type: source.as_str(),
    })
}

/// Numbers may arrive as JSON numbers or as text such as `"1,234.5"`.
fn optional_number(record: &RawRecord, field: &'static str) -> Result<Option<f64>> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| StockError::InvalidField {
                    field,
                    value: s.clone(),
                })
        }
        Some(other) => Err(StockError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

fn required_date(record: &RawRecord, field: &'static str, source: SourceType) -> Result<DateInput> {
    let missing = || StockError::MissingField {
        field,
        source_type: source.as_str(),
    };
    match record.get(field) {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::String(s)) if s.trim().is_empty() => Err(missing()),
        Some(Value::String(s)) => Ok(DateInput::Text(s.clone())),
        Some(Value::Number(n)) => n.as_i64().map(DateInput::Timestamp).ok_or_else(|| {
            StockError::InvalidField {
                field,
                value: n.to_string(),
            }
        }),
        Some(other) => Err(StockError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

fn optional_text(record: &RawRecord, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the blocking HTTP client shared by the providers.
pub(crate) fn http_client(timeout_secs: u64, user_agent: &str) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}
