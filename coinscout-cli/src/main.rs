//! CoinScout CLI: signal scans, grid scans and leverage lookups.
//!
//! Commands:
//! - `scan`: rank the market universe by confidence × expected return
//! - `grid`: rank swap markets by grid-trading suitability
//! - `leverage`: leverage recommendation for given volatility/trend inputs
//! - `default-config`: print the default scan configuration as TOML
//!
//! Reports go to stdout; logs go to stderr (`RUST_LOG`, `--verbose`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use coinscout_core::domain::{MarketType, Timeframe};
use coinscout_core::leverage::{Granularity, LeverageCalculator};
use coinscout_runner::export::{
    export_grid_csv, export_grid_json, export_json, export_signals_csv, generate_grid_report,
    generate_report, save_artifacts,
};
use coinscout_runner::{
    CsvProvider, MarketCatalog, OhlcvProvider, ScanConfig, Scanner, SyntheticProvider,
};

#[derive(Parser)]
#[command(
    name = "coinscout",
    about = "CoinScout CLI: crypto opportunity scoring and ranking"
)]
struct Cli {
    /// Debug-level logging (overrides RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the market universe and rank trading signals.
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// Venue override: spot or swap.
        #[arg(long)]
        venue: Option<Venue>,

        /// Timeframe override, comma separated (e.g. 6h,1d).
        #[arg(long, value_delimiter = ',')]
        timeframes: Option<Vec<Timeframe>>,

        /// Number of ranked signals to keep.
        #[arg(long)]
        top_n: Option<usize>,

        /// Worker threads (1 = sequential).
        #[arg(long)]
        workers: Option<usize>,

        /// Add Ichimoku columns to the indicator snapshot.
        #[arg(long, default_value_t = false)]
        ichimoku: bool,

        /// Output format on stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Also write report.json, signals.csv and report.md under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Rank swap markets by grid-trading suitability.
    Grid {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of ranked markets to keep.
        #[arg(long)]
        top_n: Option<usize>,

        /// Worker threads (1 = sequential).
        #[arg(long)]
        workers: Option<usize>,

        /// Output format on stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Leverage recommendation for one market.
    Leverage {
        /// ATR / price of the primary timeframe.
        #[arg(long)]
        volatility: f64,

        /// Trend strength in [0, 1].
        #[arg(long)]
        trend: f64,

        /// Volume stability in [0, 1]. With --rank selects the rank-aware model.
        #[arg(long)]
        stability: Option<f64>,

        /// Market-cap rank of the base asset (1 = largest).
        #[arg(long)]
        rank: Option<u32>,

        #[arg(long, default_value_t = 4.0)]
        min: f64,

        #[arg(long, default_value_t = 8.0)]
        max: f64,

        /// Round to whole multiples instead of one decimal.
        #[arg(long, default_value_t = false)]
        integer: bool,
    },
    /// Print the default scan configuration as TOML.
    DefaultConfig,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Scan configuration TOML. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Market catalog JSON: {"markets": [...], "market_caps": [...]}.
    #[arg(long)]
    catalog: PathBuf,

    /// Directory of <SYMBOL>_<tf>.csv OHLCV files.
    #[arg(long, conflicts_with = "synthetic")]
    data_dir: Option<PathBuf>,

    /// Use deterministic synthetic bars instead of CSV files.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Venue {
    Spot,
    Swap,
}

impl From<Venue> for MarketType {
    fn from(v: Venue) -> Self {
        match v {
            Venue::Spot => MarketType::Spot,
            Venue::Swap => MarketType::Swap,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Markdown table.
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan {
            source,
            venue,
            timeframes,
            top_n,
            workers,
            ichimoku,
            format,
            output_dir,
        } => {
            let mut config = load_config(&source)?;
            if let Some(v) = venue {
                config.scan.venue = v.into();
            }
            if let Some(tfs) = timeframes {
                config.scan.timeframes = tfs;
            }
            if let Some(n) = top_n {
                config.scan.top_n = n;
            }
            if let Some(w) = workers {
                config.scan.workers = w;
            }
            config.scan.include_ichimoku |= ichimoku;
            run_scan(config, &source, format, output_dir)
        }
        Commands::Grid {
            source,
            top_n,
            workers,
            format,
        } => {
            let mut config = load_config(&source)?;
            if let Some(n) = top_n {
                config.grid.top_n = n;
            }
            if let Some(w) = workers {
                config.scan.workers = w;
            }
            run_grid(config, &source, format)
        }
        Commands::Leverage {
            volatility,
            trend,
            stability,
            rank,
            min,
            max,
            integer,
        } => run_leverage(volatility, trend, stability, rank, min, max, integer),
        Commands::DefaultConfig => {
            print!("{}", ScanConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(source: &SourceArgs) -> Result<ScanConfig> {
    match &source.config {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ScanConfig::default()),
    }
}

fn open_source(source: &SourceArgs) -> Result<(MarketCatalog, Box<dyn OhlcvProvider>)> {
    let catalog = MarketCatalog::from_file(&source.catalog)
        .with_context(|| format!("failed to load catalog {}", source.catalog.display()))?;
    let provider: Box<dyn OhlcvProvider> = match (&source.data_dir, source.synthetic) {
        (Some(dir), _) => Box::new(CsvProvider::new(dir)),
        (None, true) => Box::new(SyntheticProvider::default()),
        (None, false) => anyhow::bail!("one of --data-dir or --synthetic is required"),
    };
    Ok((catalog, provider))
}

fn run_scan(
    config: ScanConfig,
    source: &SourceArgs,
    format: OutputFormat,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let (catalog, provider) = open_source(source)?;
    let scanner = Scanner::new(config).context("invalid scan configuration")?;
    let report = scanner.scan(&catalog, provider.as_ref());

    match format {
        OutputFormat::Table => println!("{}", generate_report(&report)),
        OutputFormat::Csv => print!("{}", export_signals_csv(&report)?),
        OutputFormat::Json => println!("{}", export_json(&report)?),
    }

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&report, &dir)?;
        info!(dir = %run_dir.display(), "artifacts saved");
    }
    Ok(())
}

fn run_grid(config: ScanConfig, source: &SourceArgs, format: OutputFormat) -> Result<()> {
    let (catalog, provider) = open_source(source)?;
    let scanner = Scanner::new(config).context("invalid scan configuration")?;
    let report = scanner.scan_grid(&catalog, provider.as_ref());

    match format {
        OutputFormat::Table => println!("{}", generate_grid_report(&report)),
        OutputFormat::Csv => print!("{}", export_grid_csv(&report)?),
        OutputFormat::Json => println!("{}", export_grid_json(&report)?),
    }
    Ok(())
}

fn run_leverage(
    volatility: f64,
    trend: f64,
    stability: Option<f64>,
    rank: Option<u32>,
    min: f64,
    max: f64,
    integer: bool,
) -> Result<()> {
    let granularity = if integer {
        Granularity::Integer
    } else {
        Granularity::OneDecimal
    };
    let calc = LeverageCalculator::new(min, max, granularity)?;
    let info = calc
        .recommend(volatility, trend, stability, rank)
        .context("leverage calculation failed")?;

    println!(
        "{:.1}x  ({} risk, {:?} model)",
        info.suggested_leverage,
        info.risk_tier.as_str(),
        info.model
    );
    println!("{}", info.description);
    println!("{}", serde_json::to_string_pretty(&info.breakdown)?);
    Ok(())
}
