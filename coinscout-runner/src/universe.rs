//! Market universe: the catalog of exchange markets plus market-cap ranks,
//! and the filter that turns it into the list of symbols to scan.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coinscout_core::domain::{is_stablecoin, Market, MarketCap, MarketType};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("read catalog '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Markets listed by an exchange together with market-cap ranks of their
/// base assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketCatalog {
    pub markets: Vec<Market>,
    #[serde(default)]
    pub market_caps: Vec<MarketCap>,
}

/// Which markets a scan covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseFilter {
    pub market_type: Option<MarketType>,
    /// Keep only base assets ranked at or above this. Unranked assets are
    /// dropped when set.
    pub max_rank: Option<u32>,
    pub quote: Option<String>,
    pub exclude_stablecoins: bool,
    pub active_only: bool,
    /// Explicit allow-list of symbols; empty means all.
    pub symbols: Vec<String>,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            market_type: None,
            max_rank: Some(200),
            quote: Some("USDT".to_string()),
            exclude_stablecoins: true,
            active_only: true,
            symbols: Vec::new(),
        }
    }
}

/// A market selected for scanning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub market: Market,
    pub rank: Option<u32>,
}

impl MarketCatalog {
    pub fn new(markets: Vec<Market>, market_caps: Vec<MarketCap>) -> Self {
        Self {
            markets,
            market_caps,
        }
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Best (lowest) market-cap rank listed for a base asset.
    pub fn rank_of(&self, base: &str) -> Option<u32> {
        self.market_caps
            .iter()
            .filter(|c| c.symbol.eq_ignore_ascii_case(base))
            .map(|c| c.rank)
            .min()
    }

    /// Apply a filter. Output is ordered by rank (unranked last), then symbol.
    pub fn filter_universe(&self, filter: &UniverseFilter) -> Vec<UniverseEntry> {
        let ranks = self.rank_index();
        let mut entries: Vec<UniverseEntry> = self
            .markets
            .iter()
            .filter(|m| filter.market_type.map_or(true, |t| m.market_type == t))
            .filter(|m| !filter.active_only || m.active)
            .filter(|m| {
                filter
                    .quote
                    .as_deref()
                    .map_or(true, |q| m.quote.eq_ignore_ascii_case(q))
            })
            .filter(|m| !(filter.exclude_stablecoins && is_stablecoin(&m.base)))
            .filter(|m| filter.symbols.is_empty() || filter.symbols.iter().any(|s| s == &m.symbol))
            .filter_map(|m| {
                let rank = ranks.get(&m.base.to_ascii_uppercase()).copied();
                match (filter.max_rank, rank) {
                    (Some(_), None) => None,
                    (Some(max), Some(r)) if r > max => None,
                    _ => Some(UniverseEntry {
                        market: m.clone(),
                        rank,
                    }),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            let ka = a.rank.unwrap_or(u32::MAX);
            let kb = b.rank.unwrap_or(u32::MAX);
            ka.cmp(&kb).then_with(|| a.market.symbol.cmp(&b.market.symbol))
        });
        entries.dedup_by(|a, b| a.market.symbol == b.market.symbol);
        entries
    }

    fn rank_index(&self) -> HashMap<String, u32> {
        let mut index: HashMap<String, u32> = HashMap::new();
        for cap in &self.market_caps {
            index
                .entry(cap.symbol.to_ascii_uppercase())
                .and_modify(|r| *r = (*r).min(cap.rank))
                .or_insert(cap.rank);
        }
        index
    }
}
