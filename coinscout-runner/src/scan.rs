//! Scan driver: filter the universe, analyze every symbol on a bounded
//! worker pool, rank what comes back.
//!
//! A symbol that cannot be fetched or analyzed is recorded as a
//! [`ScanFailure`] and logged; it never aborts the batch. Rankings sort by
//! score descending then symbol ascending, so sequential and parallel runs
//! produce the same report.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use coinscout_core::domain::{AnalysisResult, Bar, MarketType, Timeframe};
use coinscout_core::{
    AnalysisError, GridAnalysis, GridAnalyzer, MarketAnalyzer, MarketContext, TimeframeSeries,
    Verdict,
};

use crate::config::{ConfigError, ScanConfig};
use crate::leaderboard::{rank_top, RankedEntry};
use crate::provider::OhlcvProvider;
use crate::universe::{MarketCatalog, UniverseEntry, UniverseFilter};

/// Current report schema version. Bump on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Where a symbol dropped out of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fetch,
    /// Bars fetched but unusable, e.g. zero-volume rows.
    Data,
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub symbol: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_hash: String,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub venue: MarketType,
    pub timeframes: Vec<Timeframe>,
    pub universe_size: usize,
    /// Symbols below the confidence threshold.
    pub no_signal: usize,
    pub signals: Vec<RankedEntry<AnalysisResult>>,
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_hash: String,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub timeframe: Timeframe,
    pub universe_size: usize,
    /// Analyzed markets at or above the suitability threshold.
    pub suitable: usize,
    pub opportunities: Vec<RankedEntry<GridAnalysis>>,
    pub failures: Vec<ScanFailure>,
}

enum Outcome<T> {
    Ranked(T),
    Unranked,
    Failed(ScanFailure),
}

pub struct Scanner {
    config: ScanConfig,
    config_hash: String,
    analyzer: MarketAnalyzer,
    grid: GridAnalyzer,
    pool: Option<rayon::ThreadPool>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let config_hash = config.config_hash()?;
        let analyzer = MarketAnalyzer::new(config.to_analyzer_config()?)?;
        let grid = GridAnalyzer::new(config.grid.params.clone())?;

        let pool = if config.scan.workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.scan.workers)
                    .build()
                    .map_err(|e| ScanError::ThreadPool(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Self {
            config,
            config_hash,
            analyzer,
            grid,
            pool,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Signal scan over the configured venue and timeframes.
    pub fn scan(&self, catalog: &MarketCatalog, provider: &dyn OhlcvProvider) -> ScanReport {
        self.scan_with_filter(catalog, &self.config.signal_universe(), provider)
    }

    pub fn scan_with_filter(
        &self,
        catalog: &MarketCatalog,
        filter: &UniverseFilter,
        provider: &dyn OhlcvProvider,
    ) -> ScanReport {
        let universe = catalog.filter_universe(filter);
        let scan = &self.config.scan;
        info!(
            venue = %scan.venue,
            timeframes = ?scan.timeframes,
            symbols = universe.len(),
            workers = scan.workers,
            provider = provider.name(),
            "starting scan"
        );

        let outcomes = self.run_parallel(&universe, |entry| self.scan_symbol(entry, provider));
        let (signals, no_signal, failures) = collect(outcomes);

        let ranked = rank_top(signals, scan.top_n);
        info!(
            signals = ranked.len(),
            no_signal,
            failures = failures.len(),
            "scan complete"
        );

        ScanReport {
            schema_version: SCHEMA_VERSION,
            config_hash: self.config_hash.clone(),
            generated_at: Utc::now(),
            provider: provider.name().to_string(),
            venue: scan.venue,
            timeframes: scan.timeframes.clone(),
            universe_size: universe.len(),
            no_signal,
            signals: ranked,
            failures,
        }
    }

    /// Grid suitability scan over swap markets on the grid timeframe.
    pub fn scan_grid(&self, catalog: &MarketCatalog, provider: &dyn OhlcvProvider) -> GridReport {
        let universe = catalog.filter_universe(&self.config.grid_universe());
        let grid = &self.config.grid;
        info!(
            timeframe = %grid.timeframe,
            symbols = universe.len(),
            workers = self.config.scan.workers,
            provider = provider.name(),
            "starting grid scan"
        );

        let outcomes = self.run_parallel(&universe, |entry| self.grid_symbol(entry, provider));
        let (analyses, _, failures) = collect(outcomes);

        let suitable = analyses.iter().filter(|a| a.is_suitable()).count();
        let ranked = rank_top(analyses, grid.top_n);
        info!(
            ranked = ranked.len(),
            suitable,
            failures = failures.len(),
            "grid scan complete"
        );

        GridReport {
            schema_version: SCHEMA_VERSION,
            config_hash: self.config_hash.clone(),
            generated_at: Utc::now(),
            provider: provider.name().to_string(),
            timeframe: grid.timeframe,
            universe_size: universe.len(),
            suitable,
            opportunities: ranked,
            failures,
        }
    }

    fn run_parallel<O, F>(&self, universe: &[UniverseEntry], f: F) -> Vec<O>
    where
        O: Send,
        F: Fn(&UniverseEntry) -> O + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| universe.par_iter().map(&f).collect()),
            None => universe.iter().map(f).collect(),
        }
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        provider: &dyn OhlcvProvider,
    ) -> Result<Vec<Bar>, ScanFailure> {
        let bars = provider
            .fetch(symbol, timeframe, limit)
            .map_err(|e| failure(symbol, FailureStage::Fetch, e.to_string()))?;
        if bars.is_empty() {
            return Err(failure(symbol, FailureStage::Fetch, format!("{timeframe}: no bars")));
        }
        if self.config.scan.reject_zero_volume && bars.iter().any(|b| b.volume <= 0.0) {
            return Err(failure(
                symbol,
                FailureStage::Data,
                format!("{timeframe}: zero-volume bar in series"),
            ));
        }
        Ok(bars)
    }

    fn scan_symbol(
        &self,
        entry: &UniverseEntry,
        provider: &dyn OhlcvProvider,
    ) -> Outcome<AnalysisResult> {
        let symbol = entry.market.symbol.as_str();
        let scan = &self.config.scan;

        let mut series = Vec::with_capacity(scan.timeframes.len());
        for &tf in &scan.timeframes {
            match self.fetch(symbol, tf, scan.lookback, provider) {
                Ok(bars) => series.push(TimeframeSeries::new(tf, bars)),
                Err(f) => return Outcome::Failed(f),
            }
        }

        let context = MarketContext {
            market_cap_rank: entry.rank,
        };
        match self.analyzer.analyze(symbol, &series, context) {
            Ok(Verdict::Signal(result)) => {
                debug!(symbol, confidence = result.confidence, "signal");
                Outcome::Ranked(*result)
            }
            Ok(Verdict::NoSignal(_)) => Outcome::Unranked,
            Err(e) => Outcome::Failed(failure(symbol, FailureStage::Analysis, e.to_string())),
        }
    }

    fn grid_symbol(
        &self,
        entry: &UniverseEntry,
        provider: &dyn OhlcvProvider,
    ) -> Outcome<GridAnalysis> {
        let symbol = entry.market.symbol.as_str();
        let grid = &self.config.grid;
        let bars = match self.fetch(symbol, grid.timeframe, grid.lookback, provider) {
            Ok(bars) => bars,
            Err(f) => return Outcome::Failed(f),
        };
        match self.grid.analyze(symbol, &bars) {
            Ok(analysis) => Outcome::Ranked(analysis),
            Err(e) => Outcome::Failed(failure(symbol, FailureStage::Analysis, e.to_string())),
        }
    }
}

fn failure(symbol: &str, stage: FailureStage, reason: String) -> ScanFailure {
    ScanFailure {
        symbol: symbol.to_string(),
        stage,
        reason,
    }
}

fn collect<T>(outcomes: Vec<Outcome<T>>) -> (Vec<T>, usize, Vec<ScanFailure>) {
    let mut ranked = Vec::new();
    let mut unranked = 0;
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Ranked(r) => ranked.push(r),
            Outcome::Unranked => unranked += 1,
            Outcome::Failed(f) => {
                warn!(symbol = %f.symbol, stage = ?f.stage, reason = %f.reason, "skipping symbol");
                failures.push(f);
            }
        }
    }
    (ranked, unranked, failures)
}
