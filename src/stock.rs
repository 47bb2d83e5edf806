//! Per-symbol facade over the quote providers and the CSV cache.

use crate::data::{validate_symbol, write_ticks, CsvCache};
use crate::dates::{DateInput, FetchRange};
use crate::error::Result;
use crate::quotes::{HistorySource, QuoteSource};
use crate::types::Tick;
use std::path::PathBuf;
use tracing::info;

/// A stock symbol with its providers and cache.
///
/// Live quotes and daily history may come from different providers.
pub struct Stock {
    symbol: String,
    quotes: Box<dyn QuoteSource>,
    history: Box<dyn HistorySource>,
    cache: CsvCache,
    last_quote: Option<Tick>,
}

impl Stock {
    pub fn new(
        symbol: impl Into<String>,
        quotes: Box<dyn QuoteSource>,
        history: Box<dyn HistorySource>,
        cache: CsvCache,
    ) -> Result<Self> {
        let symbol = symbol.into();
        validate_symbol(&symbol)?;
        Ok(Self {
            symbol,
            quotes,
            history,
            cache,
            last_quote: None,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }

    /// Most recent quote returned by [`Stock::fetch`].
    pub fn last_quote(&self) -> Option<&Tick> {
        self.last_quote.as_ref()
    }

    /// Fetch the latest price of the symbol.
    pub fn fetch(&mut self) -> Result<&Tick> {
        info!(
            "fetch starting: {} ({})",
            self.symbol,
            self.quotes.source_type()
        );
        let tick = self.quotes.latest(&self.symbol)?;
        info!("fetch complete: {}", tick);
        Ok(&*self.last_quote.insert(tick))
    }

    /// Fetch daily history between `start` and `end`.
    ///
    /// The end defaults to today and the start to one year before the end.
    pub fn fetch_history(
        &self,
        start: Option<DateInput>,
        end: Option<DateInput>,
    ) -> Result<Vec<Tick>> {
        let range = FetchRange::resolve(start, end)?;
        self.fetch_range(&range)
    }

    /// Fetch daily history for an already resolved range.
    pub fn fetch_range(&self, range: &FetchRange) -> Result<Vec<Tick>> {
        info!(
            "fetching history start: {} {} ({})",
            self.symbol,
            range,
            self.history.source_type()
        );
        let history = self.history.history(&self.symbol, range)?;
        info!("fetching history complete: {} rows retrieved", history.len());
        Ok(history)
    }

    /// Make sure the cache file for the range exists and return its path.
    ///
    /// An existing file is reused without any network call.
    pub fn range_to_csv(
        &self,
        start: Option<DateInput>,
        end: Option<DateInput>,
    ) -> Result<PathBuf> {
        let range = FetchRange::resolve(start, end)?;
        self.range_to_csv_for(&range)
    }

    /// [`Stock::range_to_csv`] for an already resolved range.
    pub fn range_to_csv_for(&self, range: &FetchRange) -> Result<PathBuf> {
        info!("start range to csv: {} {}", self.symbol, range);
        let path = self.cache.cache_path(&self.symbol, range)?;

        if self.cache.is_cached(&path) {
            info!("file created already");
        } else {
            info!("creating csv file");
            let history = self.fetch_range(range)?;
            write_ticks(&path, &history)?;
        }

        info!("done with range to csv: {}", path.display());
        Ok(path)
    }
}
