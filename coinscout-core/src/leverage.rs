//! Leverage recommendation for perpetual-swap signals.
//!
//! Two models share the same bounds, rounding and risk tiers:
//!
//! **Rank-aware** (volatility, trend strength, volume stability, market-cap rank):
//! - rank is clamped to [1, 500]; the expected volatility bands widen with
//!   log10(rank): normal = 0.015·(1 + 0.5·log10 r), max = 0.035·(1 + 0.6·log10 r)
//! - vol_score = 1 / (1 + e^(k·(v - normal))), times e^(-5·(v - max)) above the
//!   max band; steepness k is 300 up to rank 20 and flattens for smaller caps
//! - trend_score = strength^0.7, volume_score = log10(1 + 9x)
//! - composite = vol^0.5 · trend^0.3 · volume^0.2
//! - leverage = (min + range·composite) · multiplier, where the multiplier is
//!   0.7 above the max band and 1.1 for a strong trend with stable volume
//!
//! **Two-factor** (volatility, trend strength): a risk curve over fixed
//! volatility bands and a piecewise-linear composite → leverage map.
//!
//! Both clamp to [min, max], round to the requested granularity and never
//! increase leverage as volatility rises past the normal band.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub const MAX_RANK: u32 = 500;

const BASE_NORMAL_VOLATILITY: f64 = 0.015;
const BASE_MAX_VOLATILITY: f64 = 0.035;
const GEOMETRIC_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Volatility → risk curve of the two-factor model, as (volatility, risk) knots.
const RISK_CURVE: [(f64, f64); 6] = [
    (0.0, 0.0),
    (0.005, 0.05),
    (0.02, 0.2),
    (0.05, 0.5),
    (0.10, 0.8),
    (0.20, 1.0),
];

/// Composite → fraction of the leverage range, as (composite, fraction) knots.
const LEVERAGE_CURVE: [(f64, f64); 5] = [
    (0.0, 0.0),
    (0.2, 0.0),
    (0.5, 0.4),
    (0.8, 0.8),
    (1.0, 1.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Integer,
    #[default]
    OneDecimal,
}

impl Granularity {
    pub fn round(&self, value: f64) -> f64 {
        match self {
            Granularity::Integer => value.round(),
            Granularity::OneDecimal => (value * 10.0).round() / 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Tier from the position within the allowed range.
    pub fn from_relative_level(level: f64) -> Self {
        if level <= 0.33 {
            RiskTier::Low
        } else if level <= 0.66 {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeverageModel {
    RankAware,
    TwoFactor,
}

/// Real-world volatility classes used by the two-factor model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityBand {
    /// < 0.5%
    Stablecoin,
    /// < 2%
    Low,
    /// < 5%
    Medium,
    /// < 10%
    High,
    Extreme,
}

impl VolatilityBand {
    pub fn classify(volatility: f64) -> Self {
        if volatility < 0.005 {
            VolatilityBand::Stablecoin
        } else if volatility < 0.02 {
            VolatilityBand::Low
        } else if volatility < 0.05 {
            VolatilityBand::Medium
        } else if volatility < 0.10 {
            VolatilityBand::High
        } else {
            VolatilityBand::Extreme
        }
    }
}

/// Rank-dependent volatility expectations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankBands {
    pub rank: u32,
    pub normal_volatility: f64,
    pub max_volatility: f64,
    pub steepness: f64,
}

/// Volatility bands for a market-cap rank. Larger caps get tighter bands and
/// a steeper sigmoid.
pub fn rank_bands(market_cap_rank: u32) -> RankBands {
    let rank = market_cap_rank.clamp(1, MAX_RANK);
    let log_rank = (rank as f64).log10();
    let steepness = if rank <= 20 {
        300.0
    } else if rank <= 150 {
        250.0 - (rank - 20) as f64
    } else {
        200.0 - (rank - 150) as f64 * 0.2
    };
    RankBands {
        rank,
        normal_volatility: BASE_NORMAL_VOLATILITY * (1.0 + log_rank * 0.5),
        max_volatility: BASE_MAX_VOLATILITY * (1.0 + log_rank * 0.6),
        steepness,
    }
}

/// Score breakdown kept on every recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageBreakdown {
    pub volatility_score: f64,
    pub trend_score: f64,
    /// Absent for the two-factor model.
    pub volume_score: Option<f64>,
    pub composite_score: f64,
    pub market_condition_multiplier: f64,
    pub normal_volatility: Option<f64>,
    pub max_volatility: Option<f64>,
    pub volatility_band: VolatilityBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageInfo {
    pub suggested_leverage: f64,
    pub min_leverage: f64,
    pub max_leverage: f64,
    pub relative_level: f64,
    pub risk_tier: RiskTier,
    pub model: LeverageModel,
    pub market_cap_rank: Option<u32>,
    pub volatility: f64,
    pub breakdown: LeverageBreakdown,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageCalculator {
    min_leverage: f64,
    max_leverage: f64,
    granularity: Granularity,
}

impl Default for LeverageCalculator {
    fn default() -> Self {
        Self {
            min_leverage: 4.0,
            max_leverage: 8.0,
            granularity: Granularity::OneDecimal,
        }
    }
}

impl LeverageCalculator {
    pub fn new(
        min_leverage: f64,
        max_leverage: f64,
        granularity: Granularity,
    ) -> Result<Self, AnalysisError> {
        let calc = Self {
            min_leverage,
            max_leverage,
            granularity,
        };
        calc.validate()?;
        Ok(calc)
    }

    /// Bounds must be finite with 0 < min <= max. Deserialized calculators
    /// skip [`LeverageCalculator::new`], so owners re-check through here.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let (min, max) = (self.min_leverage, self.max_leverage);
        if !(min.is_finite() && max.is_finite()) {
            return Err(AnalysisError::Configuration(
                "leverage bounds must be finite".into(),
            ));
        }
        if min <= 0.0 || min > max {
            return Err(AnalysisError::Configuration(format!(
                "leverage bounds must satisfy 0 < min <= max (min {min}, max {max})"
            )));
        }
        Ok(())
    }

    pub fn min_leverage(&self) -> f64 {
        self.min_leverage
    }

    pub fn max_leverage(&self) -> f64 {
        self.max_leverage
    }

    /// Rank-aware model when rank and volume stability are known, two-factor otherwise.
    pub fn recommend(
        &self,
        volatility: f64,
        trend_strength: f64,
        volume_stability: Option<f64>,
        market_cap_rank: Option<u32>,
    ) -> Result<LeverageInfo, AnalysisError> {
        match (volume_stability, market_cap_rank) {
            (Some(stability), Some(rank)) => {
                self.calculate(volatility, trend_strength, stability, rank)
            }
            _ => self.calculate_two_factor(volatility, trend_strength),
        }
    }

    /// Rank-aware recommendation.
    pub fn calculate(
        &self,
        volatility: f64,
        trend_strength: f64,
        volume_stability: f64,
        market_cap_rank: u32,
    ) -> Result<LeverageInfo, AnalysisError> {
        check_volatility(volatility)?;
        let trend = unit_input("trend strength", trend_strength)?;
        let stability = unit_input("volume stability", volume_stability)?;
        let bands = rank_bands(market_cap_rank);

        let mut vol_score =
            1.0 / (1.0 + (bands.steepness * (volatility - bands.normal_volatility)).exp());
        if volatility > bands.max_volatility {
            vol_score *= (-5.0 * (volatility - bands.max_volatility)).exp();
        }
        let trend_score = trend.powf(0.7);
        let volume_score = if stability <= 0.0 {
            0.0
        } else {
            (1.0 + 9.0 * stability).log10()
        };

        let composite = [vol_score, trend_score, volume_score]
            .iter()
            .zip(GEOMETRIC_WEIGHTS)
            .map(|(s, w)| s.max(0.0).powf(w))
            .product::<f64>();

        let multiplier = if volatility > bands.max_volatility {
            0.7
        } else if trend > 0.8 && stability > 0.7 {
            1.1
        } else {
            1.0
        };
        let raw = (self.min_leverage + self.range() * composite) * multiplier;

        let breakdown = LeverageBreakdown {
            volatility_score: vol_score,
            trend_score,
            volume_score: Some(volume_score),
            composite_score: composite,
            market_condition_multiplier: multiplier,
            normal_volatility: Some(bands.normal_volatility),
            max_volatility: Some(bands.max_volatility),
            volatility_band: VolatilityBand::classify(volatility),
        };
        Ok(self.finish(
            raw,
            volatility,
            LeverageModel::RankAware,
            Some(bands.rank),
            breakdown,
        ))
    }

    /// Fallback when rank or volume stability is unavailable.
    pub fn calculate_two_factor(
        &self,
        volatility: f64,
        trend_strength: f64,
    ) -> Result<LeverageInfo, AnalysisError> {
        check_volatility(volatility)?;
        let trend = unit_input("trend strength", trend_strength)?;

        let vol_score = 1.0 - interpolate(&RISK_CURVE, volatility);
        let trend_score = trend.powf(0.7);
        let composite = (0.6 * vol_score + 0.4 * trend_score).clamp(0.0, 1.0);
        let raw = self.min_leverage + self.range() * interpolate(&LEVERAGE_CURVE, composite);

        let breakdown = LeverageBreakdown {
            volatility_score: vol_score,
            trend_score,
            volume_score: None,
            composite_score: composite,
            market_condition_multiplier: 1.0,
            normal_volatility: None,
            max_volatility: None,
            volatility_band: VolatilityBand::classify(volatility),
        };
        Ok(self.finish(raw, volatility, LeverageModel::TwoFactor, None, breakdown))
    }

    fn range(&self) -> f64 {
        self.max_leverage - self.min_leverage
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_leverage, self.max_leverage)
    }

    fn finish(
        &self,
        raw: f64,
        volatility: f64,
        model: LeverageModel,
        market_cap_rank: Option<u32>,
        breakdown: LeverageBreakdown,
    ) -> LeverageInfo {
        let leverage = self.clamp(self.granularity.round(self.clamp(raw)));
        let relative_level = if self.range() > 0.0 {
            (leverage - self.min_leverage) / self.range()
        } else {
            0.0
        };
        let risk_tier = RiskTier::from_relative_level(relative_level);

        let mut description = format!(
            "suggested leverage {leverage:.1}x (range {:.1}x-{:.1}x), {} risk at {:.0}% of range; \
             volatility {:.2}%",
            self.min_leverage,
            self.max_leverage,
            risk_tier.as_str(),
            relative_level * 100.0,
            volatility * 100.0,
        );
        if let (Some(normal), Some(max)) = (breakdown.normal_volatility, breakdown.max_volatility) {
            description.push_str(&format!(
                " (expected {:.2}%-{:.2}%)",
                normal * 100.0,
                max * 100.0
            ));
        }
        if let Some(rank) = market_cap_rank {
            description.push_str(&format!("; market-cap rank {rank}"));
        }
        description.push_str(&format!(
            "; composite score {:.3}",
            breakdown.composite_score
        ));

        LeverageInfo {
            suggested_leverage: leverage,
            min_leverage: self.min_leverage,
            max_leverage: self.max_leverage,
            relative_level,
            risk_tier,
            model,
            market_cap_rank,
            volatility,
            breakdown,
            description,
        }
    }
}

fn check_volatility(volatility: f64) -> Result<(), AnalysisError> {
    if volatility.is_finite() && volatility >= 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::DataQuality(format!(
            "volatility must be finite and non-negative, got {volatility}"
        )))
    }
}

fn unit_input(name: &str, value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(AnalysisError::DataQuality(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

/// Piecewise-linear interpolation over ascending knots, flat beyond the ends.
fn interpolate(knots: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = (knots[0], knots[knots.len() - 1]);
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for pair in knots.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        if x <= x1 {
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    last.1
}
