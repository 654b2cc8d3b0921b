//! Market catalog metadata: exchange markets and market-cap ranks.

use serde::{Deserialize, Serialize};

/// Well-known USD stablecoins. Markets with one of these as base asset carry
/// no directional opportunity and are excluded from scans.
pub const STABLECOINS: &[&str] = &[
    "USDT", "USDC", "BUSD", "DAI", "TUSD", "UST", "USDP", "USDD", "FDUSD",
];

pub fn is_stablecoin(asset: &str) -> bool {
    STABLECOINS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(asset))
}

/// Trading venue of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    /// Perpetual swap, traded with leverage.
    Swap,
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketType::Spot => f.write_str("spot"),
            MarketType::Swap => f.write_str("swap"),
        }
    }
}

/// Exchange market metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Exchange symbol, e.g. `BTC/USDT` or `BTC/USDT:USDT`.
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub market_type: MarketType,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub price_precision: Option<u32>,
    #[serde(default)]
    pub amount_precision: Option<u32>,
    #[serde(default)]
    pub min_amount: Option<f64>,
}

fn default_active() -> bool {
    true
}

impl Market {
    pub fn new(symbol: &str, base: &str, quote: &str, market_type: MarketType) -> Self {
        Self {
            symbol: symbol.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            market_type,
            active: true,
            price_precision: None,
            amount_precision: None,
            min_amount: None,
        }
    }
}

/// Market-capitalisation rank of a base asset (1 = largest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCap {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub rank: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stablecoin_lookup_is_case_insensitive() {
        assert!(is_stablecoin("USDT"));
        assert!(is_stablecoin("usdc"));
        assert!(!is_stablecoin("BTC"));
    }

    #[test]
    fn market_deserializes_with_defaults() {
        let json = r#"{"symbol":"ETH/USDT","base":"ETH","quote":"USDT","market_type":"swap"}"#;
        let m: Market = serde_json::from_str(json).unwrap();
        assert_eq!(m.market_type, MarketType::Swap);
        assert!(m.active);
        assert_eq!(m.min_amount, None);
    }
}
