//! Grid-trading suitability: how well a market suits a buy-low/sell-high
//! grid, and the bounds and cell count to run it with.
//!
//! Scores are computed over the last `window` rows of the indicator frame:
//!
//! - volatility: mean(atr / close) · 100 · (1 - cv), clamped to [0, 1]
//! - trend: (share of RSI inside the neutral band + clamp(1 - cv(bandwidth))) / 2
//! - volume: (|corr(obv, row index)| + clamp(1 - cv(obv))) / 2
//!
//! Grid parameters come from the efficiency ratio over `efficiency_window`
//! rows: |close - close[-w]| / (rolling high - rolling low), averaged.
//! Trend strength is |mean RSI - 50| / 50 scaled by that ratio. The price
//! range is a fraction of the latest close, skewed 60/40 toward the RSI side
//! in trending markets and widened to cover the scored window otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Bar;
use crate::error::AnalysisError;
use crate::frame::IndicatorFrame;
use crate::indicators::{Atr, Bollinger, IndicatorSet, Obv, Rsi};
use crate::stats::{coefficient_of_variation, correlation, mean, rolling_max, rolling_min};

const MIN_VOLATILITY: f64 = 0.01;
const MIN_RANGE_FACTOR: f64 = 0.02;
const MIN_GRIDS: usize = 4;
const BASE_GRIDS: f64 = 20.0;
/// Minimum price step as a fraction of the latest close.
const MIN_STEP_FRACTION: f64 = 0.001;
const STEP_MULTIPLE: f64 = 3.0;
/// Lower bound never drops below this fraction of the latest close.
const LOWER_FLOOR_FRACTION: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub atr_period: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub obv_signal_period: usize,
    /// Rows scored for volatility, trend and volume.
    pub window: usize,
    pub efficiency_window: usize,
    pub volatility_weight: f64,
    pub trend_weight: f64,
    pub volume_weight: f64,
    pub neutral_rsi_low: f64,
    pub neutral_rsi_high: f64,
    /// Trend strength above which the grid is skewed toward the trend.
    pub trend_threshold: f64,
    /// Composite score at or above which a market counts as grid-suitable.
    pub suitable_threshold: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            rsi_period: 14,
            bb_period: 20,
            bb_multiplier: 2.0,
            obv_signal_period: 20,
            window: 30,
            efficiency_window: 20,
            volatility_weight: 0.6,
            trend_weight: 0.2,
            volume_weight: 0.2,
            neutral_rsi_low: 35.0,
            neutral_rsi_high: 65.0,
            trend_threshold: 0.3,
            suitable_threshold: 0.5,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.window < 2 || self.efficiency_window < 2 {
            return Err(AnalysisError::Configuration(format!(
                "grid windows must be >= 2, got window {} and efficiency window {}",
                self.window, self.efficiency_window
            )));
        }
        let weights = [self.volatility_weight, self.trend_weight, self.volume_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::Configuration(
                "grid score weights must be finite and non-negative".into(),
            ));
        }
        if (weights.iter().sum::<f64>() - 1.0).abs() > 1e-9 {
            return Err(AnalysisError::Configuration(format!(
                "grid score weights must sum to 1, got {}",
                weights.iter().sum::<f64>()
            )));
        }
        if !(0.0..=100.0).contains(&self.neutral_rsi_low)
            || !(0.0..=100.0).contains(&self.neutral_rsi_high)
            || self.neutral_rsi_low >= self.neutral_rsi_high
        {
            return Err(AnalysisError::Configuration(format!(
                "neutral RSI band [{}, {}] is invalid",
                self.neutral_rsi_low, self.neutral_rsi_high
            )));
        }
        if !(0.0..=1.0).contains(&self.trend_threshold)
            || !(0.0..=1.0).contains(&self.suitable_threshold)
        {
            return Err(AnalysisError::Configuration(
                "grid thresholds must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Suitability scores and grid parameters for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAnalysis {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub price: f64,
    pub composite_score: f64,
    pub volatility_score: f64,
    pub trend_score: f64,
    pub volume_score: f64,
    pub upper_price: f64,
    pub lower_price: f64,
    pub grid_count: usize,
    pub efficiency_ratio: f64,
    pub trend_strength: f64,
    pub suitable_threshold: f64,
}

impl GridAnalysis {
    pub fn is_suitable(&self) -> bool {
        self.composite_score >= self.suitable_threshold
    }

    /// Price distance between adjacent grid lines.
    pub fn grid_step(&self) -> f64 {
        (self.upper_price - self.lower_price) / self.grid_count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridParameters {
    upper: f64,
    lower: f64,
    count: usize,
    efficiency: f64,
    trend: f64,
}

#[derive(Debug)]
pub struct GridAnalyzer {
    config: GridConfig,
    indicators: IndicatorSet,
}

impl GridAnalyzer {
    pub fn new(config: GridConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let indicators = IndicatorSet::new(vec![
            Box::new(Atr::new(config.atr_period)?),
            Box::new(Rsi::new(config.rsi_period)?),
            Box::new(Bollinger::new(config.bb_period, config.bb_multiplier)?),
            Box::new(Obv::new(config.obv_signal_period)?),
        ]);
        Ok(Self { config, indicators })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Bars needed for a full scoring window after warm-up and for the
    /// efficiency ratio's look-back.
    pub fn required_rows(&self) -> usize {
        (self.indicators.max_lookback() + self.config.window)
            .max(2 * self.config.efficiency_window)
    }

    pub fn analyze(&self, symbol: &str, bars: &[Bar]) -> Result<GridAnalysis, AnalysisError> {
        let required = self.required_rows();
        if bars.len() < required {
            return Err(AnalysisError::insufficient(
                format!("grid analysis of {symbol}"),
                required,
                bars.len(),
            ));
        }
        let frame = self.indicators.apply(&IndicatorFrame::new(bars.to_vec())?)?;
        let scored = frame.tail(self.config.window);
        scored.ensure_defined(&[])?;

        let volatility_score = self.volatility_score(&scored)?;
        let trend_score = self.trend_score(&scored)?;
        let volume_score = volume_score(&scored)?;
        let composite_score = self.config.volatility_weight * volatility_score
            + self.config.trend_weight * trend_score
            + self.config.volume_weight * volume_score;
        debug!(
            symbol,
            volatility_score, trend_score, volume_score, composite_score, "grid scores"
        );

        let params = self.parameters(&frame, &scored)?;
        let latest = frame
            .latest_bar()
            .ok_or_else(|| AnalysisError::insufficient("grid analysis", required, 0))?;
        debug!(
            symbol,
            upper = params.upper,
            lower = params.lower,
            grids = params.count,
            "grid parameters"
        );

        Ok(GridAnalysis {
            symbol: symbol.to_string(),
            as_of: latest.timestamp,
            price: latest.close,
            composite_score,
            volatility_score,
            trend_score,
            volume_score,
            upper_price: params.upper,
            lower_price: params.lower,
            grid_count: params.count,
            efficiency_ratio: params.efficiency,
            trend_strength: params.trend,
            suitable_threshold: self.config.suitable_threshold,
        })
    }

    fn volatility_score(&self, scored: &IndicatorFrame) -> Result<f64, AnalysisError> {
        let normalized: Vec<f64> = scored
            .require("atr")?
            .iter()
            .zip(scored.bars())
            .map(|(atr, bar)| atr / bar.close)
            .collect();
        let avg = mean(&normalized);
        Ok(match coefficient_of_variation(&normalized) {
            Some(cv) if avg > 0.0 => (avg * 100.0 * (1.0 - cv)).clamp(0.0, 1.0),
            _ => 0.0,
        })
    }

    fn trend_score(&self, scored: &IndicatorFrame) -> Result<f64, AnalysisError> {
        let rsi = scored.require("rsi")?;
        let band = self.config.neutral_rsi_low..=self.config.neutral_rsi_high;
        let neutral = rsi.iter().filter(|v| band.contains(*v)).count() as f64 / rsi.len() as f64;
        let width = stability(scored.require("bb_bandwidth")?);
        Ok((neutral + width) / 2.0)
    }

    fn parameters(
        &self,
        frame: &IndicatorFrame,
        scored: &IndicatorFrame,
    ) -> Result<GridParameters, AnalysisError> {
        let w = self.config.efficiency_window;
        let n = frame.len();
        let bars = frame.bars();
        let price = bars[n - 1].close;

        let efficiency = efficiency_ratio(bars, w);
        let rsi = frame.require("rsi")?;
        let trend = (mean(&rsi[n - w..]) - 50.0).abs() / 50.0 * efficiency;
        let volatility = (mean(&frame.require("atr")?[n - w..]) / price).max(MIN_VOLATILITY);
        let range = (volatility * (1.0 + trend) * 2.0).max(MIN_RANGE_FACTOR);

        let (mut upper, mut lower) = if trend > self.config.trend_threshold {
            if rsi[n - 1] > 50.0 {
                (price * (1.0 + range * 0.6), price * (1.0 - range * 0.4))
            } else {
                (price * (1.0 + range * 0.4), price * (1.0 - range * 0.6))
            }
        } else {
            let window_high = scored.bars().iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let window_low = scored.bars().iter().map(|b| b.low).fold(f64::MAX, f64::min);
            (
                (price * (1.0 + range / 2.0)).max(window_high),
                (price * (1.0 - range / 2.0)).min(window_low),
            )
        };
        let floor = price * LOWER_FLOOR_FRACTION;
        lower = lower.max(floor);

        let volatility_factor = (volatility * 100.0).min(1.0);
        let base = (BASE_GRIDS * (1.0 + volatility_factor)).floor();
        let modifier = if efficiency > 0.7 {
            1.3
        } else if efficiency < 0.3 {
            0.7
        } else {
            1.0
        };
        let mut count = ((base * modifier).floor() as usize).max(MIN_GRIDS);

        let closes = frame.closes();
        let diffs: Vec<f64> = closes.windows(2).map(|c| (c[1] - c[0]).abs()).collect();
        let step = STEP_MULTIPLE * mean(&diffs).max(price * MIN_STEP_FRACTION);
        let min_span = step * MIN_GRIDS as f64;
        if upper - lower < min_span {
            let extra = (min_span - (upper - lower)) / 2.0;
            upper += extra;
            lower -= extra;
            if lower < floor {
                lower = floor;
                upper = lower + min_span;
            }
        }
        let by_range = ((upper - lower) / step).floor() as usize;
        count = count.min(by_range.max(MIN_GRIDS));

        if !(upper.is_finite() && lower.is_finite() && lower > 0.0 && upper > lower) {
            return Err(AnalysisError::DegenerateMath(format!(
                "grid bounds [{lower}, {upper}] around price {price}"
            )));
        }
        Ok(GridParameters {
            upper,
            lower,
            count,
            efficiency,
            trend,
        })
    }
}

fn volume_score(scored: &IndicatorFrame) -> Result<f64, AnalysisError> {
    let obv = scored.require("obv")?;
    let index: Vec<f64> = (0..obv.len()).map(|i| i as f64).collect();
    Ok((correlation(obv, &index).abs() + stability(obv)) / 2.0)
}

/// clamp(1 - cv); 0 when the mean is zero.
fn stability(values: &[f64]) -> f64 {
    coefficient_of_variation(values)
        .map(|cv| (1.0 - cv).clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Mean over the last `window` rows of net move / high-low range across the
/// same span; rows with no range contribute 0.
pub fn efficiency_ratio(bars: &[Bar], window: usize) -> f64 {
    let n = bars.len();
    if window == 0 || n < 2 * window {
        return 0.0;
    }
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let (hh, ll) = (rolling_max(&highs, window), rolling_min(&lows, window));
    let ratios: Vec<f64> = (n - window..n)
        .map(|i| {
            let path = hh[i] - ll[i];
            if path > 0.0 {
                (bars[i].close - bars[i - window].close).abs() / path
            } else {
                0.0
            }
        })
        .collect();
    mean(&ratios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    fn analyzer() -> GridAnalyzer {
        GridAnalyzer::new(GridConfig::default()).unwrap()
    }

    #[test]
    fn required_rows_cover_warmup_and_window() {
        // Bollinger and OBV signal both look back 19 rows.
        assert_eq!(analyzer().required_rows(), 49);
    }

    #[test]
    fn short_series_is_insufficient() {
        let bars = make_bars(&[100.0; 30]);
        let err = analyzer().analyze("FLAT/USDT", &bars).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 49,
                actual: 30,
                ..
            }
        ));
    }

    #[test]
    fn flat_market_scores_and_bounds() {
        let bars = make_bars(&[100.0; 120]);
        let a = analyzer().analyze("FLAT/USDT", &bars).unwrap();
        // ATR 2 on price 100 with zero dispersion saturates volatility.
        assert_approx(a.volatility_score, 1.0, 1e-12);
        // RSI pinned at 50; bandwidth is all zero.
        assert_approx(a.trend_score, 0.5, 1e-12);
        // OBV never moves.
        assert_approx(a.volume_score, 0.0, 1e-12);
        assert_approx(a.composite_score, 0.7, 1e-12);
        assert!(a.is_suitable());

        assert_approx(a.efficiency_ratio, 0.0, 1e-12);
        assert_approx(a.upper_price, 102.0, 1e-9);
        assert_approx(a.lower_price, 98.0, 1e-9);
        // 0.7 × 40 = 28 grids, capped at 4 / 0.3 = 13 by the minimum step.
        assert_eq!(a.grid_count, 13);
        assert!(a.grid_step() >= 0.3);
    }

    #[test]
    fn uptrend_skews_range_upward() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let bars = make_bars(&closes);
        let a = analyzer().analyze("UP/USDT", &bars).unwrap();
        assert!(a.trend_strength > 0.3, "trend {}", a.trend_strength);
        assert!(a.upper_price - a.price > a.price - a.lower_price);
        assert!(a.lower_price > 0.0);
        assert!(a.grid_count >= MIN_GRIDS);
    }

    #[test]
    fn efficiency_of_straight_line_is_high() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let er = efficiency_ratio(&make_bars(&closes), 20);
        // Net move 40 over a high-low span of about 40.
        assert!(er > 0.8 && er <= 1.0, "efficiency {er}");
    }

    #[test]
    fn efficiency_needs_two_windows() {
        assert_eq!(efficiency_ratio(&make_bars(&[100.0; 30]), 20), 0.0);
    }

    #[test]
    fn rejects_unbalanced_weights() {
        let cfg = GridConfig {
            volume_weight: 0.5,
            ..GridConfig::default()
        };
        assert!(matches!(
            GridAnalyzer::new(cfg),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_inverted_rsi_band() {
        let cfg = GridConfig {
            neutral_rsi_low: 70.0,
            neutral_rsi_high: 30.0,
            ..GridConfig::default()
        };
        assert!(GridAnalyzer::new(cfg).is_err());
    }
}
