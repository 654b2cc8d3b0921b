//! Per-timeframe confidence scoring and cross-timeframe aggregation.
//!
//! A timeframe's confidence is the sum of four independently capped
//! contributions read from the latest row of its indicator frame:
//!
//! | Component      | Full weight             | Partial weight                |
//! |----------------|-------------------------|-------------------------------|
//! | RSI            | 40 ≤ rsi ≤ 60           | 30–40 / 60–70, then 20–30 / 70–80 |
//! | MACD           | macd > signal           | otherwise (both finite)       |
//! | Volume profile | close > poc_price       | otherwise                     |
//! | Bollinger      | middle < close ≤ upper  | other in-band positions       |
//!
//! A sum below `min_informative` is reported as zero. Timeframe scores are
//! combined with a weight map renormalised over the timeframes supplied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Timeframe;
use crate::error::AnalysisError;
use crate::frame::IndicatorFrame;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub rsi_neutral: f64,
    pub rsi_mild: f64,
    pub rsi_extreme: f64,
    pub macd_bullish: f64,
    pub macd_other: f64,
    pub above_poc: f64,
    pub below_poc: f64,
    pub bollinger_upper_half: f64,
    pub bollinger_in_band: f64,
    /// Sums below this are treated as no information.
    pub min_informative: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            rsi_neutral: 0.15,
            rsi_mild: 0.10,
            rsi_extreme: 0.05,
            macd_bullish: 0.30,
            macd_other: 0.10,
            above_poc: 0.25,
            below_poc: 0.10,
            bollinger_upper_half: 0.30,
            bollinger_in_band: 0.10,
            min_informative: 0.2,
        }
    }
}

impl ConfidenceWeights {
    /// Highest achievable sum.
    pub fn max_total(&self) -> f64 {
        self.rsi_neutral.max(self.rsi_mild).max(self.rsi_extreme)
            + self.macd_bullish.max(self.macd_other)
            + self.above_poc.max(self.below_poc)
            + self.bollinger_upper_half.max(self.bollinger_in_band)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let all = [
            self.rsi_neutral,
            self.rsi_mild,
            self.rsi_extreme,
            self.macd_bullish,
            self.macd_other,
            self.above_poc,
            self.below_poc,
            self.bollinger_upper_half,
            self.bollinger_in_band,
            self.min_informative,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::Configuration(
                "confidence weights must be finite and non-negative".into(),
            ));
        }
        if self.max_total() > 1.0 + 1e-9 {
            return Err(AnalysisError::Configuration(format!(
                "confidence weights can sum to {:.3}, above 1.0",
                self.max_total()
            )));
        }
        Ok(())
    }
}

/// Breakdown of one timeframe's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub rsi: f64,
    pub macd: f64,
    pub volume_profile: f64,
    pub bollinger: f64,
}

impl ComponentScores {
    pub fn sum(&self) -> f64 {
        self.rsi + self.macd + self.volume_profile + self.bollinger
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeScore {
    pub timeframe: Timeframe,
    /// Final score in [0, 1], zero when below the informativeness floor.
    pub score: f64,
    pub components: ComponentScores,
    pub reasons: Vec<String>,
}

/// Score the latest row of an indicator frame.
pub fn score_timeframe(
    frame: &IndicatorFrame,
    timeframe: Timeframe,
    weights: &ConfidenceWeights,
) -> Result<TimeframeScore, AnalysisError> {
    let close = frame
        .latest_bar()
        .map(|b| b.close)
        .ok_or_else(|| AnalysisError::insufficient(timeframe.as_str(), 1, 0))?;
    let latest = |name: &str| -> Result<f64, AnalysisError> {
        Ok(frame.require(name)?.last().copied().unwrap_or(f64::NAN))
    };

    let mut reasons = Vec::new();
    let mut components = ComponentScores::default();

    let rsi = latest("rsi")?;
    components.rsi = rsi_component(rsi, weights);
    if components.rsi > 0.0 {
        reasons.push(format!("{timeframe}: RSI {rsi:.1}"));
    }

    let (macd, signal) = (latest("macd")?, latest("macd_signal")?);
    if macd.is_finite() && signal.is_finite() {
        if macd > signal {
            components.macd = weights.macd_bullish;
            reasons.push(format!("{timeframe}: MACD above signal line"));
        } else {
            components.macd = weights.macd_other;
        }
    }

    let poc = latest("poc_price")?;
    if poc.is_finite() {
        if close > poc {
            components.volume_profile = weights.above_poc;
            reasons.push(format!("{timeframe}: price above POC {poc:.4}"));
        } else {
            components.volume_profile = weights.below_poc;
        }
    }

    let (upper, middle, lower) = (latest("bb_upper")?, latest("bb_middle")?, latest("bb_lower")?);
    if upper.is_finite() && middle.is_finite() && lower.is_finite() {
        if close > middle && close <= upper {
            components.bollinger = weights.bollinger_upper_half;
            reasons.push(format!("{timeframe}: price in upper Bollinger half"));
        } else if close >= lower && close <= upper {
            components.bollinger = weights.bollinger_in_band;
        }
    }

    let raw = components.sum();
    let score = if raw < weights.min_informative {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    };

    Ok(TimeframeScore {
        timeframe,
        score,
        components,
        reasons,
    })
}

fn rsi_component(rsi: f64, w: &ConfidenceWeights) -> f64 {
    if !rsi.is_finite() {
        0.0
    } else if (40.0..=60.0).contains(&rsi) {
        w.rsi_neutral
    } else if (30.0..=70.0).contains(&rsi) {
        w.rsi_mild
    } else if (20.0..=80.0).contains(&rsi) {
        w.rsi_extreme
    } else {
        0.0
    }
}

/// Relative weight of each timeframe in the aggregate. Longer timeframes
/// weigh more; unknown timeframes count 1.0 before renormalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeWeights(pub BTreeMap<Timeframe, f64>);

impl Default for TimeframeWeights {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Timeframe::H1, 0.2),
            (Timeframe::H4, 0.3),
            (Timeframe::H6, 0.4),
            (Timeframe::H12, 0.5),
            (Timeframe::D1, 0.6),
            (Timeframe::W1, 0.7),
        ]))
    }
}

impl TimeframeWeights {
    pub fn weight(&self, timeframe: Timeframe) -> f64 {
        self.0.get(&timeframe).copied().unwrap_or(1.0)
    }

    /// Weights of the supplied timeframes, renormalised to sum to 1.
    pub fn normalized(&self, timeframes: &[Timeframe]) -> Vec<f64> {
        let raw: Vec<f64> = timeframes
            .iter()
            .map(|tf| self.weight(*tf).max(0.0))
            .collect();
        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            raw.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / timeframes.len().max(1) as f64; timeframes.len()]
        }
    }
}

/// Weighted mean of the timeframe scores.
pub fn aggregate(scores: &[TimeframeScore], weights: &TimeframeWeights) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let tfs: Vec<Timeframe> = scores.iter().map(|s| s.timeframe).collect();
    weights
        .normalized(&tfs)
        .iter()
        .zip(scores)
        .map(|(w, s)| w * s.score)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Confidence thresholds: `single` applies to one timeframe (or timeframes
/// that do not all carry a signal), `multi` when two or more timeframes each
/// score above zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub single: f64,
    pub multi: f64,
}

impl ThresholdPolicy {
    pub fn spot() -> Self {
        Self {
            single: 0.75,
            multi: 0.70,
        }
    }

    pub fn swap() -> Self {
        Self {
            single: 0.80,
            multi: 0.75,
        }
    }

    pub fn threshold_for(&self, scores: &[TimeframeScore]) -> f64 {
        if scores.len() >= 2 && scores.iter().all(|s| s.score > 0.0) {
            self.multi
        } else {
            self.single
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, v) in [("single", self.single), ("multi", self.multi)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(AnalysisError::Configuration(format!(
                    "{name} threshold must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn frame_with(close: f64, cols: &[(&str, f64)]) -> IndicatorFrame {
        let mut frame = IndicatorFrame::new(make_bars(&[close])).unwrap();
        for (name, v) in cols {
            frame = frame.with_column(*name, vec![*v]).unwrap();
        }
        frame
    }

    fn bullish_frame(rsi: f64) -> IndicatorFrame {
        frame_with(
            105.0,
            &[
                ("rsi", rsi),
                ("macd", 1.0),
                ("macd_signal", 0.5),
                ("poc_price", 100.0),
                ("bb_upper", 110.0),
                ("bb_middle", 100.0),
                ("bb_lower", 90.0),
            ],
        )
    }

    #[test]
    fn default_weights_are_valid_and_max_out_at_one() {
        let w = ConfidenceWeights::default();
        w.validate().unwrap();
        assert_approx(w.max_total(), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn overweight_configuration_is_rejected() {
        let w = ConfidenceWeights {
            macd_bullish: 0.6,
            ..Default::default()
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn all_bullish_components_sum_to_one() {
        let s = score_timeframe(&bullish_frame(50.0), Timeframe::H6, &Default::default()).unwrap();
        assert_approx(s.score, 1.0, DEFAULT_EPSILON);
        assert_eq!(s.reasons.len(), 4);
    }

    #[test]
    fn rsi_zones() {
        let w = ConfidenceWeights::default();
        assert_eq!(rsi_component(50.0, &w), 0.15);
        assert_eq!(rsi_component(35.0, &w), 0.10);
        assert_eq!(rsi_component(65.0, &w), 0.10);
        assert_eq!(rsi_component(25.0, &w), 0.05);
        assert_eq!(rsi_component(75.0, &w), 0.05);
        assert_eq!(rsi_component(95.0, &w), 0.0);
        assert_eq!(rsi_component(f64::NAN, &w), 0.0);
    }

    #[test]
    fn weak_sum_is_reported_as_zero() {
        // RSI 0 pts, MACD bearish 0.1, below POC 0.1 → 0.2 is still informative
        let frame = frame_with(
            95.0,
            &[
                ("rsi", 90.0),
                ("macd", -1.0),
                ("macd_signal", 0.0),
                ("poc_price", 100.0),
                ("bb_upper", 94.0),
                ("bb_middle", 92.0),
                ("bb_lower", 90.0),
            ],
        );
        let s = score_timeframe(&frame, Timeframe::D1, &Default::default()).unwrap();
        assert_approx(s.components.sum(), 0.2, 1e-12);

        let strict = ConfidenceWeights {
            min_informative: 0.25,
            ..Default::default()
        };
        let s = score_timeframe(&frame, Timeframe::D1, &strict).unwrap();
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn undefined_macd_contributes_nothing() {
        let frame = frame_with(
            105.0,
            &[
                ("rsi", 50.0),
                ("macd", f64::NAN),
                ("macd_signal", 0.5),
                ("poc_price", 100.0),
                ("bb_upper", 110.0),
                ("bb_middle", 100.0),
                ("bb_lower", 90.0),
            ],
        );
        let s = score_timeframe(&frame, Timeframe::H6, &Default::default()).unwrap();
        assert_eq!(s.components.macd, 0.0);
    }

    #[test]
    fn missing_column_is_data_quality() {
        let frame = frame_with(100.0, &[("rsi", 50.0)]);
        let err = score_timeframe(&frame, Timeframe::H6, &Default::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::DataQuality(_)));
    }

    #[test]
    fn weights_renormalise_over_supplied_subset() {
        let w = TimeframeWeights::default();
        let n = w.normalized(&[Timeframe::H6, Timeframe::D1]);
        assert_approx(n[0], 0.4, 1e-12);
        assert_approx(n[1], 0.6, 1e-12);
        let single = w.normalized(&[Timeframe::H4]);
        assert_approx(single[0], 1.0, 1e-12);
    }

    #[test]
    fn aggregate_weights_longer_timeframe_more() {
        let mk = |tf, score| TimeframeScore {
            timeframe: tf,
            score,
            components: ComponentScores::default(),
            reasons: vec![],
        };
        let scores = [mk(Timeframe::H6, 0.5), mk(Timeframe::D1, 1.0)];
        let agg = aggregate(&scores, &TimeframeWeights::default());
        assert_approx(agg, 0.4 * 0.5 + 0.6 * 1.0, 1e-12);
    }

    #[test]
    fn threshold_policy_picks_multi_only_when_all_score() {
        let mk = |score| TimeframeScore {
            timeframe: Timeframe::H6,
            score,
            components: ComponentScores::default(),
            reasons: vec![],
        };
        let p = ThresholdPolicy::swap();
        assert_eq!(p.threshold_for(&[mk(0.9)]), 0.80);
        assert_eq!(p.threshold_for(&[mk(0.9), mk(0.7)]), 0.75);
        assert_eq!(p.threshold_for(&[mk(0.9), mk(0.0)]), 0.80);
    }
}
