//! Yahoo Finance chart endpoint client.

use super::{
    http_client, tick_from_yahoo, HistorySource, QuoteSource, RawRecord,
    YAHOO_ADJ_CLOSE_FIELD, YAHOO_DATE_FIELD, YAHOO_FINAL_PRICE_FIELD, YAHOO_HIGH_FIELD,
    YAHOO_LOW_FIELD, YAHOO_OPEN_FIELD, YAHOO_VOLUME_FIELD,
};
use crate::dates::{FetchRange, DATE_FORMAT};
use crate::error::{Result, StockError};
use crate::types::{Interval, SourceType, Tick};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    #[serde(default)]
    adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Blocking client for the Yahoo chart API.
#[derive(Debug, Clone)]
pub struct YahooClient {
    base_url: String,
    client: Client,
}

impl YahooClient {
    /// Create a client with a custom base URL, timeout and user agent.
    pub fn with_base_url(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs, user_agent)?,
        })
    }

    fn chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!("GET {} {:?}", url, query);

        let response = self.client.get(&url).query(query).send()?;
        let status = response.status();
        let body = response.text()?;
        check_chart_status(symbol, status, body)
    }
}

impl QuoteSource for YahooClient {
    fn source_type(&self) -> SourceType {
        SourceType::Yahoo
    }

    fn latest(&self, symbol: &str) -> Result<Tick> {
        let body = self.chart(
            symbol,
            &[("range", "1d".to_string()), ("interval", "1m".to_string())],
        )?;
        parse_chart_quote(symbol, &body)
    }
}

impl HistorySource for YahooClient {
    fn source_type(&self) -> SourceType {
        SourceType::Yahoo
    }

    fn history(&self, symbol: &str, range: &FetchRange) -> Result<Vec<Tick>> {
        let (period1, period2) = chart_period(range)?;
        let body = self.chart(
            symbol,
            &[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ],
        )?;

        let ticks = parse_chart_history(symbol, &body, range)?;
        info!("Yahoo returned {} daily rows for {}", ticks.len(), symbol);
        Ok(ticks)
    }
}

/// Pass a successful body through; turn anything else into a provider error.
fn check_chart_status(symbol: &str, status: StatusCode, body: String) -> Result<String> {
    if status.is_success() {
        return Ok(body);
    }

    // Error bodies still carry the chart envelope with a description
    let detail = serde_json::from_str::<ChartResponse>(&body)
        .ok()
        .and_then(|r| r.chart.error)
        .map(|e| format!("{}: {}", e.code, e.description))
        .unwrap_or_else(|| status.to_string());
    Err(StockError::ProviderError(format!(
        "chart request for {} failed: {}",
        symbol, detail
    )))
}

/// Unix seconds for `period1` and `period2` covering the whole range.
fn chart_period(range: &FetchRange) -> Result<(i64, i64)> {
    let start = range.start_date()?;
    // period2 is exclusive; push it past the end date
    let end = range
        .end_date()?
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| StockError::DateParseError(format!("{} has no following day", range.end)))?;

    Ok((
        start.and_time(NaiveTime::MIN).and_utc().timestamp(),
        end.and_time(NaiveTime::MIN).and_utc().timestamp(),
    ))
}

fn first_result(symbol: &str, body: &str) -> Result<ChartResult> {
    let response: ChartResponse = serde_json::from_str(body)?;
    if let Some(err) = response.chart.error {
        return Err(StockError::ProviderError(format!(
            "{}: {}",
            err.code, err.description
        )));
    }
    response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| StockError::NoData(symbol.to_string()))
}

/// Turn a chart body into the latest quote.
fn parse_chart_quote(symbol: &str, body: &str) -> Result<Tick> {
    let result = first_result(symbol, body)?;
    let price = result.meta.regular_market_price.ok_or(StockError::MissingField {
        field: "regularMarketPrice",
        source_type: SourceType::Yahoo.as_str(),
    })?;
    let time = result
        .meta
        .regular_market_time
        .or_else(|| result.timestamp.last().copied())
        .ok_or(StockError::MissingField {
            field: "regularMarketTime",
            source_type: SourceType::Yahoo.as_str(),
        })?;

    Ok(Tick::new(Interval::OneMinute, symbol, price, time)?.with_source(SourceType::Yahoo))
}

/// Turn a columnar chart body into daily ticks within `range`.
///
/// Each row becomes a Yahoo-shaped record first so that all providers share
/// one normalization path.
fn parse_chart_history(symbol: &str, body: &str, range: &FetchRange) -> Result<Vec<Tick>> {
    let result = first_result(symbol, body)?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default()
        .adjclose;

    let (start, end) = (range.start_date()?, range.end_date()?);
    let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut ticks = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        if column(&quote.close, i).is_none() {
            debug!("Skipping row {} for {}: no close", i, symbol);
            continue;
        }

        // Session date in the exchange's own timezone
        let date = DateTime::<Utc>::from_timestamp(ts + result.meta.gmtoffset, 0)
            .ok_or_else(|| StockError::DateParseError(ts.to_string()))?
            .date_naive();
        if date < start || date > end {
            continue;
        }

        let mut record = RawRecord::new();
        record.insert(
            YAHOO_DATE_FIELD.to_string(),
            Value::String(date.format(DATE_FORMAT).to_string()),
        );
        for (field, values) in [
            (YAHOO_OPEN_FIELD, &quote.open),
            (YAHOO_HIGH_FIELD, &quote.high),
            (YAHOO_LOW_FIELD, &quote.low),
            (YAHOO_FINAL_PRICE_FIELD, &quote.close),
            (YAHOO_VOLUME_FIELD, &quote.volume),
            (YAHOO_ADJ_CLOSE_FIELD, &adjclose),
        ] {
            record.insert(field.to_string(), number_or_null(column(values, i)));
        }

        ticks.push(tick_from_yahoo(symbol, &record)?);
    }

    Ok(ticks)
}

fn number_or_null(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "regularMarketPrice": 185.85,
                    "regularMarketTime": 1704488400,
                    "gmtoffset": -18000
                },
                "timestamp": [1704205800, 1704292200, 1704378600, 1704465000],
                "indicators": {
                    "quote": [{
                        "open": [187.15, 184.22, null, 181.99],
                        "high": [188.44, 185.88, null, 182.76],
                        "low": [183.89, 183.43, null, 180.17],
                        "close": [185.64, 184.25, null, 181.18],
                        "volume": [82488700, 58414500, null, 62303300]
                    }],
                    "adjclose": [{
                        "adjclose": [184.94, 183.55, null, 180.49]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    fn range(start: &str, end: &str) -> FetchRange {
        FetchRange {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    #[test]
    fn test_parse_history_rows() {
        let ticks = parse_chart_history("AAPL", CHART_BODY, &range("2024-01-01", "2024-01-31")).unwrap();

        // The null row is dropped
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].to_csv_record()[0], "2024-01-02");
        assert_eq!(ticks[0].open, Some(187.15));
        assert_eq!(ticks[0].adj_close, Some(184.94));
        assert_eq!(ticks[0].volume, Some(82_488_700.0));
        assert_eq!(ticks[2].to_csv_record()[0], "2024-01-05");
        assert!(ticks.iter().all(|t| t.source_type == Some(SourceType::Yahoo)));
    }

    #[test]
    fn test_parse_history_clips_to_range() {
        let ticks = parse_chart_history("AAPL", CHART_BODY, &range("2024-01-03", "2024-01-03")).unwrap();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].close, 184.25);
    }

    #[test]
    fn test_parse_quote_from_meta() {
        let tick = parse_chart_quote("AAPL", CHART_BODY).unwrap();
        assert_eq!(tick.close, 185.85);
        assert_eq!(tick.interval, Interval::OneMinute);
    }

    #[test]
    fn test_error_envelope() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart_history("ZZZZ", body, &range("2024-01-01", "2024-01-31")).unwrap_err();
        match err {
            StockError::ProviderError(msg) => assert!(msg.contains("delisted")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_failed_status_carries_description() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = check_chart_status("ZZZZ", StatusCode::NOT_FOUND, body.to_string()).unwrap_err();
        match err {
            StockError::ProviderError(msg) => {
                assert!(msg.contains("ZZZZ"));
                assert!(msg.contains("Not Found: No data found, symbol may be delisted"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_failed_status_without_envelope() {
        let err = check_chart_status("AAPL", StatusCode::TOO_MANY_REQUESTS, "Too Many Requests".to_string())
            .unwrap_err();
        match err {
            StockError::ProviderError(msg) => assert!(msg.contains("429")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_success_status_passes_body() {
        let body = check_chart_status("AAPL", StatusCode::OK, CHART_BODY.to_string()).unwrap();
        assert_eq!(body, CHART_BODY);
    }

    #[test]
    fn test_chart_period_covers_end_day() {
        let (period1, period2) = chart_period(&range("2024-01-02", "2024-01-05")).unwrap();
        assert_eq!(period1, 1_704_153_600);
        assert_eq!(period2, 1_704_499_200);
    }

    #[test]
    fn test_chart_period_at_last_date() {
        let last = NaiveDate::MAX.format(DATE_FORMAT).to_string();
        assert!(matches!(
            chart_period(&range("2024-01-02", &last)),
            Err(StockError::DateParseError(_))
        ));
    }

    #[test]
    fn test_empty_result_is_no_data() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(matches!(
            parse_chart_quote("AAPL", body),
            Err(StockError::NoData(_))
        ));
    }
}
