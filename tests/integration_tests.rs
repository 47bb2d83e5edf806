//! Integration tests for the stock facade and the CSV cache.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::tempdir;
use tomastocks::config::AppConfig;
use tomastocks::data::{load_csv, CsvCache};
use tomastocks::dates::{DateInput, FetchRange};
use tomastocks::error::{Result, StockError};
use tomastocks::quotes::{HistorySource, QuoteSource};
use tomastocks::stock::Stock;
use tomastocks::strategies::MacdCrossover;
use tomastocks::strategy::{MacdReading, OrderEvent, OrderStatus, Strategy, StrategyContext, TradeEvent};
use tomastocks::types::{Interval, Side, Signal, SourceType, Tick};

/// History provider that counts calls and remembers requested ranges.
#[derive(Clone, Default)]
struct FakeHistory {
    ticks: Vec<Tick>,
    calls: Arc<AtomicUsize>,
    ranges: Arc<Mutex<Vec<FetchRange>>>,
}

impl FakeHistory {
    fn new(ticks: Vec<Tick>) -> Self {
        Self {
            ticks,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HistorySource for FakeHistory {
    fn source_type(&self) -> SourceType {
        SourceType::Yahoo
    }

    fn history(&self, symbol: &str, range: &FetchRange) -> Result<Vec<Tick>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().unwrap().push(range.clone());
        Ok(self
            .ticks
            .iter()
            .filter(|t| t.symbol == symbol)
            .cloned()
            .collect())
    }
}

struct FailingHistory;

impl HistorySource for FailingHistory {
    fn source_type(&self) -> SourceType {
        SourceType::Yahoo
    }

    fn history(&self, symbol: &str, _range: &FetchRange) -> Result<Vec<Tick>> {
        Err(StockError::ProviderError(format!("No data found, symbol may be delisted: {}", symbol)))
    }
}

struct FakeQuote {
    price: f64,
}

impl QuoteSource for FakeQuote {
    fn source_type(&self) -> SourceType {
        SourceType::Google
    }

    fn latest(&self, symbol: &str) -> Result<Tick> {
        let mut tick = Tick::new(Interval::OneMinute, symbol, self.price, "2017-03-10T16:00:00Z")?
            .with_source(SourceType::Google);
        tick.id = Some("304466804484872".to_string());
        Ok(tick)
    }
}

fn daily(symbol: &str, date: &str, close: f64) -> Tick {
    Tick::new(Interval::OneDay, symbol, close, date)
        .unwrap()
        .with_ohlc(close - 0.05, close + 0.1, close - 0.1)
        .with_volume(1_000_000.0)
        .with_adj_close(close)
        .with_source(SourceType::Yahoo)
}

/// Newest first, the way providers often return it.
fn uwti_history() -> Vec<Tick> {
    vec![
        daily("UWTI", "2016-01-08", 2.10),
        daily("UWTI", "2016-01-07", 2.25),
        daily("UWTI", "2016-01-06", 2.40),
        daily("UWTI", "2016-01-05", 2.71),
        daily("UWTI", "2016-01-04", 2.80),
    ]
}

fn stock_with(history: impl HistorySource + 'static, cache: CsvCache) -> Stock {
    Stock::new("UWTI", Box::new(FakeQuote { price: 2.0 }), Box::new(history), cache).unwrap()
}

#[test]
fn test_range_to_csv_writes_then_reuses() {
    let dir = tempdir().unwrap();
    let history = FakeHistory::new(uwti_history());
    let stock = stock_with(history.clone(), CsvCache::new(dir.path(), "txt"));

    let path = stock
        .range_to_csv(Some("2016-01-04".into()), Some("2016-01-08".into()))
        .unwrap();

    assert_eq!(
        path,
        dir.path().join("UWTI").join("UWTI_2016-01-04_to_2016-01-08.txt")
    );
    assert_eq!(history.calls(), 1);

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "Date,Open,High,Low,Close,Volume,Adj Close");
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("2016-01-04,"));
    assert!(lines[5].starts_with("2016-01-08,"));

    // Cache hit: same path, no second fetch, file untouched
    let again = stock
        .range_to_csv(Some("2016-01-04".into()), Some("2016-01-08".into()))
        .unwrap();
    assert_eq!(again, path);
    assert_eq!(history.calls(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn test_range_to_csv_fetches_requested_range() {
    let dir = tempdir().unwrap();
    let history = FakeHistory::new(uwti_history());
    let stock = stock_with(history.clone(), CsvCache::new(dir.path(), "txt"));

    stock
        .range_to_csv(Some("01/04/2016".into()), Some("2016-01-08T15:30:00".into()))
        .unwrap();

    let ranges = history.ranges.lock().unwrap();
    assert_eq!(
        ranges.as_slice(),
        [FetchRange {
            start: "2016-01-04".to_string(),
            end: "2016-01-08".to_string(),
        }]
    );
}

#[test]
fn test_default_start_is_one_year_before_end() {
    let dir = tempdir().unwrap();
    let stock = stock_with(FakeHistory::new(uwti_history()), CsvCache::new(dir.path(), "txt"));

    let path = stock.range_to_csv(None, Some("2016-03-04".into())).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "UWTI_2015-03-05_to_2016-03-04.txt"
    );
}

#[test]
fn test_blank_start_counts_as_missing() {
    let dir = tempdir().unwrap();
    let stock = stock_with(FakeHistory::new(uwti_history()), CsvCache::new(dir.path(), "csv"));

    let path = stock
        .range_to_csv(Some("  ".into()), Some("2016-03-04".into()))
        .unwrap();
    assert!(path.ends_with("UWTI/UWTI_2015-03-05_to_2016-03-04.csv"));
}

#[test]
fn test_empty_history_creates_no_file() {
    let dir = tempdir().unwrap();
    let history = FakeHistory::new(Vec::new());
    let stock = stock_with(history.clone(), CsvCache::new(dir.path(), "txt"));
    let range = FetchRange {
        start: "2016-01-04".to_string(),
        end: "2016-01-08".to_string(),
    };

    let result = stock.range_to_csv_for(&range);
    assert!(matches!(result, Err(StockError::NoData(_))));

    let path = stock.cache().path_for("UWTI", &range).unwrap();
    assert!(!path.exists());

    // Nothing was cached, so the next call asks the provider again
    let _ = stock.range_to_csv_for(&range);
    assert_eq!(history.calls(), 2);
}

#[test]
fn test_provider_error_propagates() {
    let dir = tempdir().unwrap();
    let stock = stock_with(FailingHistory, CsvCache::new(dir.path(), "txt"));

    let result = stock.range_to_csv(Some("2016-01-04".into()), Some("2016-01-08".into()));
    assert!(matches!(result, Err(StockError::ProviderError(_))));

    let dir_entries: Vec<_> = fs::read_dir(dir.path().join("UWTI")).unwrap().collect();
    assert!(dir_entries.is_empty());
}

#[test]
fn test_invalid_symbol_rejected() {
    for symbol in ["", "../etc", "A/B", "BRK A"] {
        let result = Stock::new(
            symbol,
            Box::new(FakeQuote { price: 1.0 }),
            Box::new(FakeHistory::default()),
            CsvCache::default(),
        );
        assert!(
            matches!(result, Err(StockError::InvalidSymbol(_))),
            "{:?} should be rejected",
            symbol
        );
    }
}

#[test]
fn test_fetch_remembers_last_quote() {
    let mut stock = stock_with(FakeHistory::default(), CsvCache::default());
    assert!(stock.last_quote().is_none());

    let tick = stock.fetch().unwrap().clone();
    assert_eq!(tick.interval, Interval::OneMinute);
    assert_eq!(tick.close, 2.0);
    assert_eq!(tick.source_type, Some(SourceType::Google));
    assert_eq!(stock.last_quote(), Some(&tick));

    let json: serde_json::Value = serde_json::from_str(&tick.to_string()).unwrap();
    assert_eq!(json["type"], "goog");
    assert_eq!(json["interval"], 1);
    assert_eq!(json["id"], "304466804484872");
}

#[test]
fn test_fetch_history_returns_provider_rows() {
    let stock = stock_with(FakeHistory::new(uwti_history()), CsvCache::default());
    let ticks = stock
        .fetch_history(Some(DateInput::from("2016-01-04")), Some(DateInput::from("2016-01-08")))
        .unwrap();
    assert_eq!(ticks.len(), 5);
    assert!(ticks.iter().all(|t| t.interval == Interval::OneDay));
}

#[test]
fn test_load_cached_file() {
    let dir = tempdir().unwrap();
    let stock = stock_with(FakeHistory::new(uwti_history()), CsvCache::new(dir.path(), "txt"));
    let path = stock
        .range_to_csv(Some("2016-01-04".into()), Some("2016-01-08".into()))
        .unwrap();

    let rows = load_csv(&path).unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].date.to_string(), "2016-01-04");
    assert_eq!(rows[0].close, 2.80);
    assert_eq!(rows[4].adj_close, Some(2.10));
    assert_eq!(rows[2].volume, Some(1_000_000.0));
}

#[test]
fn test_config_cache_settings() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tomastocks.toml");
    let data_dir = dir.path().join("quotes");
    fs::write(
        &config_path,
        format!("[data]\ndir = {:?}\nextension = \"csv\"\n", data_dir.display().to_string()),
    )
    .unwrap();

    let config = AppConfig::load(&config_path).unwrap();
    let stock = stock_with(FakeHistory::new(uwti_history()), config.data.cache());
    let path = stock
        .range_to_csv(Some("2016-01-04".into()), Some("2016-01-08".into()))
        .unwrap();

    assert_eq!(path, data_dir.join("UWTI").join("UWTI_2016-01-04_to_2016-01-08.csv"));
    assert!(path.is_file());
}

/// Drive the strategy the way the engine does: signals on one bar, fills on
/// the next bar's close.
#[test]
fn test_strategy_over_cached_rows() {
    let dir = tempdir().unwrap();
    let stock = stock_with(FakeHistory::new(uwti_history()), CsvCache::new(dir.path(), "txt"));
    let path = stock
        .range_to_csv(Some("2016-01-04".into()), Some("2016-01-08".into()))
        .unwrap();
    let rows = load_csv(&path).unwrap();

    let readings = [
        MacdReading::new(0.10, 0.05, None),
        MacdReading::new(0.12, 0.06, Some(0.10)),
        MacdReading::new(0.15, 0.08, Some(0.12)),
        MacdReading::new(0.11, 0.09, Some(0.15)),
        MacdReading::new(0.05, 0.09, Some(0.11)),
    ];

    let mut strategy = MacdCrossover::default();
    strategy.init();

    let mut position = 0.0;
    let mut pending: Option<(Side, f64)> = None;
    let mut entry = 0.0;
    let commission = 0.05;

    for (row, macd) in rows.iter().zip(readings) {
        if let Some((side, size)) = pending.take() {
            let value = row.close * size;
            let comm = value * commission;
            strategy.on_order(
                row.date,
                &OrderEvent {
                    side,
                    status: OrderStatus::Completed,
                    price: row.close,
                    value,
                    commission: comm,
                },
            );
            match side {
                Side::Buy => {
                    position += size;
                    entry = row.close;
                }
                Side::Sell => {
                    let pnl = (row.close - entry) * size;
                    position -= size;
                    strategy.on_trade(
                        row.date,
                        &TradeEvent {
                            pnl,
                            pnl_net: pnl - comm - entry * size * commission,
                            is_closed: true,
                        },
                    );
                }
            }
        }

        let ctx = StrategyContext {
            date: row.date,
            close: row.close,
            macd,
            position,
        };
        match strategy.on_bar(&ctx) {
            Signal::Buy(size) => pending = Some((Side::Buy, size)),
            Signal::Sell(size) => pending = Some((Side::Sell, size)),
            Signal::Hold => {}
        }
    }
    strategy.on_finish();

    let journal = strategy.journal();
    assert_eq!(journal[0], "2016-01-04, Close, 2.80");
    assert_eq!(journal[1], "2016-01-04, BUY CREATE, 2.80");
    assert!(journal.contains(&"2016-01-05, BUY EXECUTED, Price: 2.71, Cost: 271.00, Comm 13.55".to_string()));
    assert!(journal.contains(&"2016-01-07, SELL CREATE, 2.25".to_string()));
    assert!(journal.contains(&"2016-01-08, SELL EXECUTED, Price: 2.10, Cost: 210.00, Comm 10.50".to_string()));
    assert!(journal.iter().any(|l| l.starts_with("2016-01-08, OPERATION PROFIT, GROSS -61.00")));
    assert_eq!(position, 0.0);
}
