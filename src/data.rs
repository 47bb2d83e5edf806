//! Range-to-CSV cache files.
//!
//! A cache file holds the daily history of one symbol over one resolved
//! range and lives at `<root>/<SYMBOL>/<SYMBOL>_<start>_to_<end>.<ext>`.
//! The name is the cache key: if the file exists the range is not fetched
//! again.

use crate::dates::{FetchRange, DATE_FORMAT};
use crate::error::{Result, StockError};
use crate::types::Tick;
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default cache root, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default cache file extension.
pub const DEFAULT_EXTENSION: &str = "txt";

/// Raw CSV row of a cache file.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "date")]
    date: String,
    #[serde(alias = "Open", alias = "open", default)]
    open: Option<f64>,
    #[serde(alias = "High", alias = "high", default)]
    high: Option<f64>,
    #[serde(alias = "Low", alias = "low", default)]
    low: Option<f64>,
    #[serde(alias = "Close", alias = "close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: Option<f64>,
    #[serde(
        rename = "Adj Close",
        alias = "adj_close",
        alias = "Adj_Close",
        default
    )]
    adj_close: Option<f64>,
}

/// One row read back from a cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRow {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
    pub adj_close: Option<f64>,
}

/// Location and naming of cache files.
#[derive(Debug, Clone)]
pub struct CsvCache {
    root: PathBuf,
    extension: String,
}

impl Default for CsvCache {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR, DEFAULT_EXTENSION)
    }
}

impl CsvCache {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache file path for a symbol and range, without touching the disk.
    pub fn path_for(&self, symbol: &str, range: &FetchRange) -> Result<PathBuf> {
        validate_symbol(symbol)?;
        let file_name = format!(
            "{symbol}_{}_to_{}.{}",
            range.start, range.end, self.extension
        );
        Ok(self.root.join(symbol).join(file_name))
    }

    /// Cache file path for a symbol and range; the symbol directory is
    /// created when missing.
    pub fn cache_path(&self, symbol: &str, range: &FetchRange) -> Result<PathBuf> {
        let path = self.path_for(symbol, range)?;
        if let Some(dir) = path.parent() {
            if !dir.is_dir() {
                debug!("Creating cache directory {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        Ok(path)
    }

    /// Whether a cache file is already on disk.
    pub fn is_cached(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Reject symbols that are empty or would escape the cache directory.
pub fn validate_symbol(symbol: &str) -> Result<()> {
    let bad = symbol.is_empty()
        || symbol == "."
        || symbol.contains("..")
        || symbol
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
    if bad {
        return Err(StockError::InvalidSymbol(symbol.to_string()));
    }
    Ok(())
}

/// Write ticks as a cache file, oldest first, and return the row count.
///
/// Rows go to a `.part` sibling that is renamed into place once complete.
pub fn write_ticks(path: impl AsRef<Path>, ticks: &[Tick]) -> Result<usize> {
    let path = path.as_ref();
    if ticks.is_empty() {
        return Err(StockError::NoData(path.display().to_string()));
    }

    let mut rows: Vec<&Tick> = ticks.iter().collect();
    rows.sort_by_key(|t| t.date);

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let written = write_rows(&tmp, &rows).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

fn write_rows(path: &Path, rows: &[&Tick]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(Tick::csv_header())?;
    for tick in rows {
        writer.write_record(tick.to_csv_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a cache file back into rows sorted by date.
///
/// Unreadable rows are skipped and counted; duplicate dates keep the first
/// row.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<CachedRow>> {
    let path = path.as_ref();
    info!("Loading cache file: {}", path.display());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    let mut skipped = 0;

    for (row_num, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping row {}: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
        };

        let date = match NaiveDate::parse_from_str(&row.date, DATE_FORMAT) {
            Ok(d) => d,
            Err(e) => {
                debug!("Skipping row {} due to date parse error: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
        };

        rows.push(CachedRow {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            adj_close: row.adj_close,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }

    rows.sort_by_key(|r| r.date);

    let original_len = rows.len();
    rows.dedup_by_key(|r| r.date);
    if rows.len() < original_len {
        warn!("Removed {} duplicate dates", original_len - rows.len());
    }

    if rows.is_empty() {
        return Err(StockError::NoData(path.display().to_string()));
    }

    info!(
        "Loaded {} rows from {} to {}",
        rows.len(),
        rows[0].date,
        rows[rows.len() - 1].date
    );

    Ok(rows)
}

/// SHA-256 of a file, hex encoded.
pub fn file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}
