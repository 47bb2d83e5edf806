//! Error types for quote fetching and the CSV cache.

use thiserror::Error;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum StockError {
    #[error("Date is not in a parseable format: {0}")]
    DateParseError(String),

    #[error("Invalid symbol: '{0}'")]
    InvalidSymbol(String),

    #[error("Missing field '{field}' in {source_type} record")]
    MissingField {
        field: &'static str,
        source_type: &'static str,
    },

    #[error("Invalid value for '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("No data for {0}")]
    NoData(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    ChronoError(#[from] chrono::ParseError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, StockError>;
