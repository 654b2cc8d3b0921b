//! CoinScout Runner: scan orchestration on top of `coinscout-core`.
//!
//! This crate provides:
//! - TOML scan configuration with content hashing
//! - Market catalog and universe filtering by venue, quote and market-cap rank
//! - OHLCV providers (CSV directory, deterministic synthetic, in-memory)
//! - Signal and grid scans on a bounded rayon worker pool
//! - Bounded leaderboards with percentile ranking
//! - JSON, CSV and Markdown export

pub mod config;
pub mod export;
pub mod leaderboard;
pub mod provider;
pub mod scan;
pub mod universe;

pub use config::{ConfigError, GridSection, LeverageSection, ScanConfig, ScanSection};
pub use leaderboard::{rank_normalize, rank_top, InsertResult, Leaderboard, RankedEntry, Scored};
pub use provider::{
    CsvProvider, InMemoryProvider, OhlcvProvider, ProviderError, SyntheticProvider,
};
pub use scan::{
    FailureStage, GridReport, ScanError, ScanFailure, ScanReport, Scanner, SCHEMA_VERSION,
};
pub use universe::{CatalogError, MarketCatalog, UniverseEntry, UniverseFilter};
