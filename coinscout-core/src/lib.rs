//! CoinScout Core: indicators, confidence scoring, entry/exit, leverage and
//! grid suitability for crypto markets.
//!
//! This crate is pure computation over OHLCV series:
//! - Domain types (bars, timeframes, markets, analysis results)
//! - Indicator library producing row-aligned columns with NaN warm-up
//! - Per-timeframe confidence scoring and multi-timeframe aggregation
//! - ATR-based entry, stop-loss and take-profit
//! - Rank-aware and two-factor leverage recommendation
//! - Market analyzer pipeline (spot and swap)
//! - Grid-trading suitability analyzer
//!
//! Fetching data, walking a market universe and ranking live in
//! `coinscout-runner`.

pub mod analyzer;
pub mod confidence;
pub mod domain;
pub mod entry;
pub mod error;
pub mod frame;
pub mod grid;
pub mod indicators;
pub mod leverage;
pub mod stats;
pub mod trend;

pub use analyzer::{
    AnalyzerConfig, MarketAnalyzer, MarketContext, NoSignal, ScoringHooks, TimeframeSeries,
    Verdict,
};
pub use error::AnalysisError;
pub use frame::IndicatorFrame;
pub use grid::{GridAnalysis, GridAnalyzer, GridConfig};
