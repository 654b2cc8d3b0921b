//! OHLCV providers.
//!
//! The scanner only needs "give me the last `limit` bars of this symbol on
//! this timeframe". Exchange connectivity lives outside this crate; what ships
//! here is a CSV directory reader, a deterministic synthetic generator and an
//! in-memory store for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coinscout_core::domain::{Bar, Timeframe};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no data for {symbol} {timeframe}")]
    NotFound { symbol: String, timeframe: Timeframe },
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv '{path}': {reason}")]
    Malformed { path: String, reason: String },
    #[error("cannot generate {count} {timeframe} bars before the anchor")]
    OutOfRange { count: usize, timeframe: Timeframe },
}

/// Source of OHLCV history, shared across scan workers.
pub trait OhlcvProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The most recent `limit` bars, oldest first.
    fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize)
        -> Result<Vec<Bar>, ProviderError>;
}

fn tail(mut bars: Vec<Bar>, limit: usize) -> Vec<Bar> {
    if bars.len() > limit {
        bars.drain(..bars.len() - limit);
    }
    bars
}

// ── CSV directory ─────────────────────────

/// CSV row: millisecond epoch timestamp plus OHLCV.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Reads `<dir>/<SYMBOL>_<tf>.csv`, with `/` and `:` in the symbol mapped to `_`.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(symbol: &str, timeframe: Timeframe) -> String {
        let sanitized: String = symbol
            .chars()
            .map(|c| if c == '/' || c == ':' { '_' } else { c })
            .collect();
        format!("{sanitized}_{timeframe}.csv")
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(Self::file_name(symbol, timeframe))
    }

    /// Write bars in the format `fetch` reads.
    pub fn store(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<PathBuf, ProviderError> {
        let path = self.path_for(symbol, timeframe);
        let io_err = |source: std::io::Error| ProviderError::Io {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        let mut wtr = csv::Writer::from_path(&path).map_err(|e| malformed(&path, e))?;
        for bar in bars {
            wtr.serialize(CsvRow {
                timestamp: bar.timestamp.timestamp_millis(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .map_err(|e| malformed(&path, e))?;
        }
        wtr.flush().map_err(io_err)?;
        Ok(path)
    }
}

fn malformed(path: &Path, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Malformed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

impl OhlcvProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Err(ProviderError::NotFound {
                symbol: symbol.to_string(),
                timeframe,
            });
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| malformed(&path, e))?;
        let mut bars = Vec::new();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| malformed(&path, e))?;
            let timestamp = DateTime::from_timestamp_millis(row.timestamp).ok_or_else(|| {
                let reason = format!("row {}: timestamp {} out of range", line + 1, row.timestamp);
                malformed(&path, reason)
            })?;
            bars.push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        Ok(tail(bars, limit))
    }
}

// ── Synthetic ──────────────────────────

/// Deterministic random-walk bars, seeded from symbol and timeframe.
///
/// Each step draws a return in [-3%, 3%) plus `drift`; wicks extend up to 1%
/// past the body. The last bar sits on `anchor`.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    anchor: DateTime<Utc>,
    drift: f64,
    start_price: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            anchor: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            drift: 0.0,
            start_price: 100.0,
        }
    }
}

impl SyntheticProvider {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            ..Self::default()
        }
    }

    /// Mean per-bar return added to every step.
    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// `count` bars ending on the anchor. Fails when the series would not fit
    /// in chrono's date range.
    pub fn generate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let out_of_range = || ProviderError::OutOfRange { count, timeframe };
        let n = i32::try_from(count).map_err(|_| out_of_range())?;
        let step = timeframe.duration();
        let first = step
            .checked_mul((n - 1).max(0))
            .and_then(|span| self.anchor.checked_sub_signed(span))
            .ok_or_else(out_of_range)?;

        let seed = blake3::hash(format!("{symbol}|{timeframe}").as_bytes());
        let mut rng = StdRng::from_seed(*seed.as_bytes());
        let mut price = self.start_price;
        let mut bars = Vec::with_capacity(count);

        for i in 0..n {
            let ret: f64 = rng.gen_range(-0.03..0.03) + self.drift;
            let open = price;
            let close = (price * (1.0 + ret)).max(1e-8);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(50_000.0..500_000.0);

            bars.push(Bar {
                timestamp: first + step * i,
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
        }
        Ok(bars)
    }
}

impl OhlcvProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.generate(symbol, timeframe, limit)
    }
}

// ── In-memory ──────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<(String, Timeframe), Vec<Bar>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) {
        self.series.insert((symbol.to_string(), timeframe), bars);
    }

    pub fn with_series(mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.insert(symbol, timeframe, bars);
        self
    }
}

impl OhlcvProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.series
            .get(&(symbol.to_string(), timeframe))
            .map(|bars| tail(bars.clone(), limit))
            .ok_or_else(|| ProviderError::NotFound {
                symbol: symbol.to_string(),
                timeframe,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_is_deterministic_per_symbol_and_timeframe() {
        let p = SyntheticProvider::default();
        let a = p.fetch("BTC/USDT", Timeframe::H6, 120).unwrap();
        let b = p.fetch("BTC/USDT", Timeframe::H6, 120).unwrap();
        let c = p.fetch("ETH/USDT", Timeframe::H6, 120).unwrap();
        let d = p.fetch("BTC/USDT", Timeframe::D1, 120).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn synthetic_bars_are_sane_and_spaced() {
        let p = SyntheticProvider::default();
        let bars = p.fetch("SOL/USDT", Timeframe::H4, 200).unwrap();
        assert_eq!(bars.len(), 200);
        assert_eq!(bars.last().unwrap().timestamp, p.anchor);
        for w in bars.windows(2) {
            assert_eq!(w[1].timestamp - w[0].timestamp, Timeframe::H4.duration());
        }
        assert!(bars.iter().all(|b| b.is_sane()));
    }

    #[test]
    fn positive_drift_trends_up() {
        let p = SyntheticProvider::default().with_drift(0.02);
        let bars = p.fetch("UP/USDT", Timeframe::D1, 100).unwrap();
        assert!(bars.last().unwrap().close > bars[0].open * 2.0);
    }

    #[test]
    fn synthetic_rejects_counts_past_the_date_range() {
        let p = SyntheticProvider::default();
        assert!(matches!(
            p.fetch("BTC/USDT", Timeframe::H1, usize::MAX),
            Err(ProviderError::OutOfRange { .. })
        ));
        assert!(matches!(
            p.generate("BTC/USDT", Timeframe::W1, i32::MAX as usize),
            Err(ProviderError::OutOfRange { .. })
        ));
        assert!(p.generate("BTC/USDT", Timeframe::W1, 0).unwrap().is_empty());
    }

    #[test]
    fn in_memory_returns_tail_and_reports_missing() {
        let bars = SyntheticProvider::default()
            .generate("X/USDT", Timeframe::H1, 50)
            .unwrap();
        let p = InMemoryProvider::new().with_series("X/USDT", Timeframe::H1, bars.clone());
        let got = p.fetch("X/USDT", Timeframe::H1, 20).unwrap();
        assert_eq!(got.as_slice(), &bars[30..]);
        assert!(matches!(
            p.fetch("X/USDT", Timeframe::D1, 20),
            Err(ProviderError::NotFound { .. })
        ));
    }

    #[test]
    fn csv_file_name_sanitizes_symbol() {
        assert_eq!(
            CsvProvider::file_name("BTC/USDT:USDT", Timeframe::H6),
            "BTC_USDT_USDT_6h.csv"
        );
    }
}
