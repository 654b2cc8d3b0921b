//! Scan configuration, loaded from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults of the
//! scan that the tool was built around (swap venue, 6h + 1d timeframes,
//! 300 bars, top 10, market-cap rank ≤ 200).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coinscout_core::confidence::ThresholdPolicy;
use coinscout_core::domain::{MarketType, Timeframe};
use coinscout_core::leverage::{Granularity, LeverageCalculator};
use coinscout_core::{AnalysisError, AnalyzerConfig, GridConfig};

use crate::universe::UniverseFilter;

/// Errors from loading or validating a scan configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid analyzer settings: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Top-level scan configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub scan: ScanSection,
    pub universe: UniverseFilter,
    pub leverage: LeverageSection,
    /// Venue default when absent.
    pub thresholds: Option<ThresholdPolicy>,
    pub grid: GridSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub venue: MarketType,
    pub timeframes: Vec<Timeframe>,
    /// Bars requested per timeframe.
    pub lookback: usize,
    pub top_n: usize,
    /// Worker threads; 1 runs sequentially.
    pub workers: usize,
    pub include_ichimoku: bool,
    /// Skip series containing a bar with zero volume.
    pub reject_zero_volume: bool,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            venue: MarketType::Swap,
            timeframes: vec![Timeframe::H6, Timeframe::D1],
            lookback: 300,
            top_n: 10,
            workers: 4,
            include_ichimoku: false,
            reject_zero_volume: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeverageSection {
    pub min: f64,
    pub max: f64,
    pub granularity: Granularity,
}

impl Default for LeverageSection {
    fn default() -> Self {
        Self {
            min: 4.0,
            max: 8.0,
            granularity: Granularity::OneDecimal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub timeframe: Timeframe,
    pub lookback: usize,
    pub top_n: usize,
    /// Market-cap rank cap for grid scans; wider than the signal scan.
    pub max_rank: Option<u32>,
    pub params: GridConfig,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::D1,
            lookback: 250,
            top_n: 10,
            max_rank: Some(500),
            params: GridConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load a scan configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a scan configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scan = &self.scan;
        if scan.timeframes.is_empty() {
            return Err(ConfigError::Invalid("scan.timeframes is empty".into()));
        }
        let mut tfs = scan.timeframes.clone();
        tfs.sort();
        tfs.dedup();
        if tfs.len() != scan.timeframes.len() {
            return Err(ConfigError::Invalid("scan.timeframes has duplicates".into()));
        }
        if scan.workers == 0 {
            return Err(ConfigError::Invalid("scan.workers must be >= 1".into()));
        }
        if scan.top_n == 0 || self.grid.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be >= 1".into()));
        }
        if let Some(0) = self.universe.max_rank {
            return Err(ConfigError::Invalid("universe.max_rank must be >= 1".into()));
        }

        let analyzer = self.to_analyzer_config()?;
        analyzer.validate()?;
        self.grid.params.validate()?;

        let required = coinscout_core::MarketAnalyzer::new(analyzer)?.required_rows();
        if scan.lookback < required {
            return Err(ConfigError::Invalid(format!(
                "scan.lookback {} is below the {required} bars the analyzer needs",
                scan.lookback
            )));
        }
        let grid_required =
            coinscout_core::GridAnalyzer::new(self.grid.params.clone())?.required_rows();
        if self.grid.lookback < grid_required {
            return Err(ConfigError::Invalid(format!(
                "grid.lookback {} is below the {grid_required} bars the grid analyzer needs",
                self.grid.lookback
            )));
        }
        Ok(())
    }

    /// BLAKE3 digest of the canonical JSON form, recorded in scan reports.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Venue thresholds unless overridden.
    pub fn thresholds(&self) -> ThresholdPolicy {
        self.thresholds.unwrap_or(match self.scan.venue {
            MarketType::Spot => ThresholdPolicy::spot(),
            MarketType::Swap => ThresholdPolicy::swap(),
        })
    }

    pub fn to_analyzer_config(&self) -> Result<AnalyzerConfig, ConfigError> {
        let leverage = LeverageCalculator::new(
            self.leverage.min,
            self.leverage.max,
            self.leverage.granularity,
        )?;
        Ok(AnalyzerConfig {
            thresholds: self.thresholds(),
            leverage,
            include_ichimoku: self.scan.include_ichimoku,
            ..AnalyzerConfig::for_market(self.scan.venue)
        })
    }

    /// Universe filter for the signal scan, bound to the configured venue.
    pub fn signal_universe(&self) -> UniverseFilter {
        UniverseFilter {
            market_type: Some(self.scan.venue),
            ..self.universe.clone()
        }
    }

    /// Universe filter for the grid scan: swap markets up to the grid rank cap.
    pub fn grid_universe(&self) -> UniverseFilter {
        UniverseFilter {
            market_type: Some(MarketType::Swap),
            max_rank: self.grid.max_rank,
            ..self.universe.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ScanConfig::from_toml("").unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.scan.timeframes, vec![Timeframe::H6, Timeframe::D1]);
        assert_eq!(config.thresholds(), ThresholdPolicy::swap());
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
            [scan]
            venue = "spot"
            timeframes = ["4h"]
            workers = 1

            [universe]
            max_rank = 50

            [leverage]
            min = 2.0
            max = 5.0
            granularity = "integer"

            [thresholds]
            single = 0.6
            multi = 0.55
        "#;
        let config = ScanConfig::from_toml(toml).unwrap();
        assert_eq!(config.scan.venue, MarketType::Spot);
        assert_eq!(config.scan.timeframes, vec![Timeframe::H4]);
        assert_eq!(config.universe.max_rank, Some(50));
        assert_eq!(config.scan.lookback, 300);

        let analyzer = config.to_analyzer_config().unwrap();
        assert_eq!(analyzer.market_type, MarketType::Spot);
        assert_eq!(analyzer.thresholds.single, 0.6);
        assert_eq!(analyzer.leverage.max_leverage(), 5.0);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases = [
            "[scan]\ntimeframes = []",
            "[scan]\nworkers = 0",
            "[scan]\ntop_n = 0",
            "[scan]\nlookback = 40",
            "[scan]\ntimeframes = [\"6h\", \"6h\"]",
            "[leverage]\nmin = 9.0\nmax = 3.0",
            "[thresholds]\nsingle = 1.2\nmulti = 0.5",
            "[grid]\nlookback = 10",
        ];
        for toml in cases {
            assert!(ScanConfig::from_toml(toml).is_err(), "accepted: {toml}");
        }
    }

    #[test]
    fn unknown_timeframe_is_a_parse_error() {
        let err = ScanConfig::from_toml("[scan]\ntimeframes = [\"7m\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn config_hash_is_deterministic_and_sensitive() {
        let a = ScanConfig::default();
        let mut b = a.clone();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        b.scan.top_n = 20;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn toml_roundtrip() {
        let config = ScanConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(ScanConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn universe_filters_bind_venue() {
        let mut config = ScanConfig::default();
        config.scan.venue = MarketType::Spot;
        assert_eq!(config.signal_universe().market_type, Some(MarketType::Spot));
        assert_eq!(config.grid_universe().market_type, Some(MarketType::Swap));
        assert_eq!(config.grid_universe().max_rank, Some(500));
    }
}
