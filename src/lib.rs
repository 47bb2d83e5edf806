//! Tomastocks - daily price history for a backtesting engine.
//!
//! # Overview
//!
//! Tomastocks fetches quotes and daily history for a stock symbol, writes the
//! history to a CSV cache file and hands that file to an external
//! backtesting engine running a MACD crossover strategy.
//!
//! - **Range resolution**: optional start/end in many shapes, defaulting to
//!   the last year
//! - **CSV cache**: one file per symbol and range; an existing file is never
//!   fetched again
//! - **Tick normalization**: Yahoo and Google records mapped onto one type
//! - **Strategy callback**: the MACD crossover rules the engine drives
//!
//! # Quick Start
//!
//! ```no_run
//! use tomastocks::{AppConfig, Stock};
//!
//! let config = AppConfig::default();
//! let stock = Stock::new(
//!     "AAPL",
//!     config.provider.quote_source().unwrap(),
//!     config.provider.history_source().unwrap(),
//!     config.data.cache(),
//! )
//! .unwrap();
//!
//! // data/AAPL/AAPL_2024-01-02_to_2024-06-28.txt
//! let path = stock
//!     .range_to_csv(Some("2024-01-02".into()), Some("2024-06-28".into()))
//!     .unwrap();
//! println!("{}", path.display());
//! ```
//!
//! # Driving the strategy
//!
//! The engine computes indicators and reports order updates; the strategy
//! only decides.
//!
//! ```
//! use chrono::NaiveDate;
//! use tomastocks::strategies::MacdCrossover;
//! use tomastocks::strategy::{MacdReading, Strategy, StrategyContext};
//! use tomastocks::types::Signal;
//!
//! let mut strategy = MacdCrossover::default();
//! let ctx = StrategyContext {
//!     date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
//!     close: 10.0,
//!     macd: MacdReading::new(0.3, 0.1, None),
//!     position: 0.0,
//! };
//! assert_eq!(strategy.on_bar(&ctx), Signal::Buy(100.0));
//! ```
//!
//! # Modules
//!
//! - [`dates`]: Date parsing and fetch-range resolution
//! - [`types`]: Core data types (Tick, Interval, Side, Signal)
//! - [`quotes`]: Quote providers and record normalization
//! - [`data`]: CSV cache files
//! - [`stock`]: Per-symbol facade
//! - [`strategy`]: Strategy trait and engine events
//! - [`strategies`]: Built-in strategies
//! - [`config`]: TOML configuration file support

pub mod config;
pub mod data;
pub mod dates;
pub mod error;
pub mod quotes;
pub mod stock;
pub mod strategies;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use config::AppConfig;
pub use data::{file_checksum, load_csv, write_ticks, CachedRow, CsvCache};
pub use dates::{date_to_str, str_to_date, DateInput, FetchRange, DATE_FORMAT};
pub use error::{Result, StockError};
pub use quotes::{
    tick_from_google, tick_from_yahoo, GoogleClient, HistorySource, QuoteSource, RawRecord,
    YahooClient,
};
pub use stock::Stock;
pub use strategy::Strategy;
pub use types::{Interval, Side, Signal, SourceType, Tick};
