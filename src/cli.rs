//! Command-line interface for fetching and caching price history.

use tomastocks::config::AppConfig;
use tomastocks::data::{file_checksum, load_csv, CachedRow};
use tomastocks::dates::{DateInput, FetchRange};
use tomastocks::error::{Result, StockError};
use tomastocks::stock::Stock;
use tomastocks::strategies::MacdCrossover;
use tomastocks::strategy::Strategy;
use tomastocks::types::Tick;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::{builder::Builder, settings::Style};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Tomastocks - daily price history for a backtesting engine.
#[derive(Parser)]
#[command(name = "tomastocks")]
#[command(version)]
#[command(about = "Fetch stock quotes and cache daily history as CSV for backtesting")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the latest quote for a symbol
    Quote {
        /// Ticker symbol
        symbol: String,
    },

    /// Fetch daily history and print it
    History {
        /// Ticker symbol
        symbol: String,

        /// Start date (defaults to one year before the end)
        #[arg(short, long)]
        start: Option<String>,

        /// End date (defaults to today)
        #[arg(short, long)]
        end: Option<String>,
    },

    /// Write daily history to the CSV cache and print the file path
    Csv {
        /// Ticker symbol
        symbol: String,

        /// Start date (defaults to one year before the end)
        #[arg(short, long)]
        start: Option<String>,

        /// End date (defaults to today)
        #[arg(short, long)]
        end: Option<String>,
    },

    /// Prepare the data file and settings for a backtest run
    Prepare {
        /// Ticker symbol
        symbol: String,

        /// Start date (defaults to backtest.default_start)
        start: Option<String>,

        /// End date (defaults to today)
        end: Option<String>,
    },

    /// Validate a cache file
    Validate {
        /// Path to the cache file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Create an example configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "tomastocks.toml")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        // stdout carries command output
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(io::stderr)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to set tracing subscriber: {}", e);
        }
    }

    fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load_or_default(self.config.as_deref())
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Quote { symbol } => show_quote(&cli.load_config()?, symbol, cli.output),

        Commands::History { symbol, start, end } => show_history(
            &cli.load_config()?,
            symbol,
            date_arg(start),
            date_arg(end),
            cli.output,
        ),

        Commands::Csv { symbol, start, end } => write_csv(
            &cli.load_config()?,
            symbol,
            date_arg(start),
            date_arg(end),
            cli.output,
        ),

        Commands::Prepare { symbol, start, end } => prepare_backtest(
            &cli.load_config()?,
            symbol,
            date_arg(start),
            date_arg(end),
            cli.output,
        ),

        Commands::Validate { data } => validate_data(data, cli.output),

        Commands::Init { output } => init_config(output),
    }
}

fn date_arg(value: &Option<String>) -> Option<DateInput> {
    value.as_deref().map(DateInput::from)
}

fn build_stock(config: &AppConfig, symbol: &str) -> Result<Stock> {
    Stock::new(
        symbol,
        config.provider.quote_source()?,
        config.provider.history_source()?,
        config.data.cache(),
    )
}

/// Run `f` behind a spinner when writing text output.
fn with_spinner<T>(output: OutputFormat, message: String, f: impl FnOnce() -> Result<T>) -> Result<T> {
    if output != OutputFormat::Text {
        return f();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = f();
    pb.finish_and_clear();
    result
}

fn print_heading(title: &str) {
    println!();
    println!("{}", "═".repeat(60).blue());
    println!("{}", format!(" {} ", title).bold().blue());
    println!("{}", "═".repeat(60).blue());
    println!();
}

fn print_csv_ticks(ticks: &[Tick]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(Tick::csv_header())?;
    for tick in ticks {
        writer.write_record(tick.to_csv_record())?;
    }
    writer.flush()?;
    Ok(())
}

fn print_csv_row<T: Serialize>(row: &T) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn show_quote(config: &AppConfig, symbol: &str, output: OutputFormat) -> Result<()> {
    let mut stock = build_stock(config, symbol)?;
    let tick = with_spinner(output, format!("Fetching quote for {}", symbol), || {
        Ok(stock.fetch()?.clone())
    })?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tick)?),
        OutputFormat::Csv => print_csv_ticks(std::slice::from_ref(&tick))?,
        OutputFormat::Text => {
            print_heading("QUOTE");
            println!("  Symbol:    {}", tick.symbol.bold());
            println!("  Price:     {:.2}", tick.close);
            println!("  Time:      {}", tick.date);
            if let Some(source) = tick.source_type {
                println!("  Source:    {}", source);
            }
            if let Some(dividend) = tick.dividend {
                println!("  Dividend:  {}", dividend);
            }
            if let Some(yield_pct) = tick.yield_pct {
                println!("  Yield:     {}%", yield_pct);
            }
            if let Some(id) = &tick.id {
                println!("  ID:        {}", id);
            }
            println!();
        }
    }
    Ok(())
}

fn show_history(
    config: &AppConfig,
    symbol: &str,
    start: Option<DateInput>,
    end: Option<DateInput>,
    output: OutputFormat,
) -> Result<()> {
    let stock = build_stock(config, symbol)?;
    let range = FetchRange::resolve(start, end)?;
    let mut ticks = with_spinner(output, format!("Fetching {} {}", symbol, range), || {
        stock.fetch_range(&range)
    })?;
    ticks.sort_by_key(|t| t.date);

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ticks)?),
        OutputFormat::Csv => print_csv_ticks(&ticks)?,
        OutputFormat::Text => {
            print_heading("DAILY HISTORY");
            println!("  Symbol:  {}", symbol.bold());
            println!("  Period:  {}", range);
            println!("  Rows:    {}", ticks.len());
            println!();

            if ticks.is_empty() {
                println!("{}", "No rows returned".yellow());
                return Ok(());
            }

            let mut builder = Builder::default();
            builder.push_record(Tick::csv_header());
            for tick in &ticks {
                builder.push_record(tick.to_csv_record());
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }
    Ok(())
}

fn write_csv(
    config: &AppConfig,
    symbol: &str,
    start: Option<DateInput>,
    end: Option<DateInput>,
    output: OutputFormat,
) -> Result<()> {
    let stock = build_stock(config, symbol)?;
    let range = FetchRange::resolve(start, end)?;
    let path = with_spinner(output, format!("Caching {} {}", symbol, range), || {
        stock.range_to_csv_for(&range)
    })?;

    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "symbol": symbol,
                "start": range.start,
                "end": range.end,
                "path": path.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Csv => println!("{}", path.display()),
        OutputFormat::Text => {
            println!("{} {}", "Cache file:".bold(), path.display());
        }
    }
    Ok(())
}

/// What the engine needs to start a run.
#[derive(Debug, Clone, Serialize)]
struct PrepareSummary {
    symbol: String,
    path: String,
    start: String,
    end: String,
    rows: usize,
    first_date: String,
    last_date: String,
    cash: f64,
    commission: f64,
    strategy: String,
    ma_period: usize,
    stake: u32,
    order_size: f64,
}

impl PrepareSummary {
    fn new(
        config: &AppConfig,
        symbol: &str,
        range: &FetchRange,
        path: &Path,
        rows: &[CachedRow],
        strategy: &MacdCrossover,
    ) -> Result<Self> {
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Err(StockError::NoData(path.display().to_string()));
        };

        Ok(Self {
            symbol: symbol.to_string(),
            path: path.display().to_string(),
            start: range.start.clone(),
            end: range.end.clone(),
            rows: rows.len(),
            first_date: first.date.to_string(),
            last_date: last.date.to_string(),
            cash: config.backtest.cash,
            commission: config.backtest.commission,
            strategy: strategy.name().to_string(),
            ma_period: strategy.ma_period(),
            stake: strategy.stake(),
            order_size: config.strategy.order_size,
        })
    }
}

fn prepare_backtest(
    config: &AppConfig,
    symbol: &str,
    start: Option<DateInput>,
    end: Option<DateInput>,
    output: OutputFormat,
) -> Result<()> {
    let start = start.unwrap_or_else(|| DateInput::from(config.backtest.default_start.as_str()));
    let range = FetchRange::resolve(Some(start), end)?;
    info!("Preparing backtest data for {} {}", symbol, range);

    let stock = build_stock(config, symbol)?;
    let path = with_spinner(output, format!("Caching {} {}", symbol, range), || {
        stock.range_to_csv_for(&range)
    })?;
    let rows = load_csv(&path)?;
    let strategy = MacdCrossover::from_settings(&config.strategy);
    let summary = PrepareSummary::new(config, symbol, &range, &path, &rows, &strategy)?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Csv => print_csv_row(&summary)?,
        OutputFormat::Text => {
            print_heading("BACKTEST DATA");

            println!("{}", "Data Feed".bold().underline());
            println!("  Symbol:          {}", summary.symbol);
            println!("  File:            {}", summary.path);
            println!("  Requested:       {}", range);
            println!("  Rows:            {}", summary.rows);
            println!(
                "  Available:       {} to {}",
                summary.first_date, summary.last_date
            );
            println!();

            println!("{}", "Broker".bold().underline());
            println!("  Starting Cash:   ${:>12.2}", summary.cash);
            println!("  Commission:      {:.2}%", summary.commission * 100.0);
            println!();

            println!("{}", "Strategy".bold().underline());
            println!("  Name:            {}", summary.strategy);
            for (key, value) in strategy.parameters() {
                println!("  {:<16} {}", format!("{}:", key), value);
            }
            println!();
        }
    }
    Ok(())
}

/// Summary of a cache file.
#[derive(Debug, Clone, Serialize)]
struct DataSummary {
    path: String,
    rows: usize,
    start: String,
    end: String,
    min_close: f64,
    max_close: f64,
    avg_close: f64,
    avg_volume: Option<f64>,
    sha256: String,
}

impl DataSummary {
    fn from_rows(path: &Path, rows: &[CachedRow], sha256: String) -> Result<Self> {
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Err(StockError::NoData(path.display().to_string()));
        };

        let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
        let min_close = closes.iter().fold(f64::INFINITY, |a: f64, &b| a.min(b));
        let max_close = closes.iter().fold(f64::NEG_INFINITY, |a: f64, &b| a.max(b));
        let avg_close = closes.iter().sum::<f64>() / closes.len() as f64;

        let volumes: Vec<f64> = rows.iter().filter_map(|r| r.volume).collect();
        let avg_volume = if volumes.is_empty() {
            None
        } else {
            Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
        };

        Ok(Self {
            path: path.display().to_string(),
            rows: rows.len(),
            start: first.date.to_string(),
            end: last.date.to_string(),
            min_close,
            max_close,
            avg_close,
            avg_volume,
            sha256,
        })
    }
}

fn validate_data(data_path: &Path, output: OutputFormat) -> Result<()> {
    let rows = load_csv(data_path)?;
    let checksum = file_checksum(data_path)?;
    let summary = DataSummary::from_rows(data_path, &rows, checksum)?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Csv => print_csv_row(&summary)?,
        OutputFormat::Text => {
            println!("Validating data file: {}", data_path.display());
            println!("\nData Summary:");
            println!("  Rows: {}", summary.rows);
            println!("  Start: {}", summary.start);
            println!("  End: {}", summary.end);
            println!(
                "  Price Range: {:.2} - {:.2}",
                summary.min_close, summary.max_close
            );
            println!("  Average Price: {:.2}", summary.avg_close);
            if let Some(avg_volume) = summary.avg_volume {
                println!("  Average Volume: {:.0}", avg_volume);
            }
            println!("  SHA-256: {}", summary.sha256);
            println!("\nValidation: {}", "PASSED".green().bold());
        }
    }
    Ok(())
}

fn init_config(output: &Path) -> Result<()> {
    fs::write(output, AppConfig::example())?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file, then run:");
    println!("  tomastocks -c {} prepare SYMBOL", output.display());
    Ok(())
}
