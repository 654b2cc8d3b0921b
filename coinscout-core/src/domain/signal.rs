//! Analysis output: one immutable result per (symbol, analysis run).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MarketType, Timeframe};
use crate::confidence::TimeframeScore;
use crate::leverage::LeverageInfo;

/// Direction of an emitted signal. Spot signals buy, swap signals go long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    Buy,
    Long,
}

impl SignalClass {
    pub fn for_market(market_type: MarketType) -> Self {
        match market_type {
            MarketType::Spot => SignalClass::Buy,
            MarketType::Swap => SignalClass::Long,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub market_type: MarketType,
    pub signal: SignalClass,
    /// Aggregated confidence in [0, 1].
    pub confidence: f64,
    pub threshold: f64,
    pub timeframe_scores: Vec<TimeframeScore>,
    pub primary_timeframe: Timeframe,
    /// Timestamp of the primary timeframe's latest bar.
    pub as_of: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub atr: f64,
    pub expected_return: f64,
    pub leverage: Option<LeverageInfo>,
    /// Latest indicator values of the primary timeframe.
    pub indicators: BTreeMap<String, f64>,
    pub rationale: Vec<String>,
}

impl AnalysisResult {
    /// Ranking key: confidence × expected return.
    pub fn composite_score(&self) -> f64 {
        self.confidence * self.expected_return
    }
}
