//! Google Finance info endpoint client.

use super::{
    http_client, tick_from_google, QuoteSource, RawRecord, GOOGLE_DATE_FIELD,
    GOOGLE_DIVIDEND_FIELD, GOOGLE_FINAL_PRICE_FIELD, GOOGLE_ID_FIELD, GOOGLE_YIELD_FIELD,
};
use crate::error::{Result, StockError};
use crate::types::{SourceType, Tick};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_GOOGLE_URL: &str = "https://finance.google.com";

/// Short keys used on the wire and the record names they map to.
const KEY_NAMES: [(&str, &str); 7] = [
    ("id", GOOGLE_ID_FIELD),
    ("t", "StockSymbol"),
    ("e", "Index"),
    ("l", GOOGLE_FINAL_PRICE_FIELD),
    ("lt_dts", GOOGLE_DATE_FIELD),
    ("div", GOOGLE_DIVIDEND_FIELD),
    ("yld", GOOGLE_YIELD_FIELD),
];

/// Blocking client for live quotes.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    base_url: String,
    client: Client,
}

impl GoogleClient {
    pub fn with_base_url(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs, user_agent)?,
        })
    }
}

impl QuoteSource for GoogleClient {
    fn source_type(&self) -> SourceType {
        SourceType::Google
    }

    fn latest(&self, symbol: &str) -> Result<Tick> {
        let url = format!("{}/finance/info", self.base_url);
        debug!("GET {} q={}", url, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("client", "ig"), ("q", symbol)])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        let record = parse_info_response(symbol, status, &body)?;
        tick_from_google(symbol, &record)
    }
}

/// Reject failed responses, then extract the quote record.
fn parse_info_response(symbol: &str, status: StatusCode, body: &str) -> Result<RawRecord> {
    if !status.is_success() {
        return Err(StockError::ProviderError(format!(
            "quote request for {} failed: {}",
            symbol, status
        )));
    }
    parse_info_body(symbol, body)
}

/// Extract the first quote record from an info body.
///
/// The body is a JSON array, usually behind a `//` guard line. Short wire
/// keys are renamed to the long record names.
fn parse_info_body(symbol: &str, body: &str) -> Result<RawRecord> {
    let trimmed = body.trim_start();
    let json = trimmed.strip_prefix("//").unwrap_or(trimmed);

    let records: Vec<RawRecord> = serde_json::from_str(json)?;
    let mut record = records
        .into_iter()
        .next()
        .ok_or_else(|| StockError::NoData(symbol.to_string()))?;

    for (short, long) in KEY_NAMES {
        if record.contains_key(long) {
            continue;
        }
        if let Some(value) = record.remove(short) {
            record.insert(long.to_string(), value);
        }
    }

    if record.get(GOOGLE_FINAL_PRICE_FIELD).map_or(true, Value::is_null) {
        return Err(StockError::NoData(symbol.to_string()));
    }
    Ok(record)
}
