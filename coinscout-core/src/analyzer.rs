//! Market analyzer: the per-symbol scoring pipeline.
//!
//! ```text
//! Initialized → IndicatorsComputed → ConfidenceScored → EntryComputed → Finalized
//!                       ↘                   ↘                  ↘
//!                                        Rejected
//! ```
//!
//! One configurable implementation serves both venues. Spot and swap differ
//! only in [`AnalyzerConfig`] (thresholds, ATR multiples, leverage sizing);
//! the confidence scorer and entry calculator are swappable functions in
//! [`ScoringHooks`].
//!
//! The analyzer never mutates caller data: every timeframe is copied into its
//! own [`IndicatorFrame`] before indicators run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::{
    aggregate, score_timeframe, ConfidenceWeights, ThresholdPolicy, TimeframeScore,
    TimeframeWeights,
};
use crate::domain::{AnalysisResult, Bar, MarketType, SignalClass, Timeframe};
use crate::entry::{entry_from_frame, EntryPoints, EntryRule};
use crate::error::AnalysisError;
use crate::frame::IndicatorFrame;
use crate::indicators::IndicatorSet;
use crate::leverage::LeverageCalculator;
use crate::trend::{self, VOLUME_WINDOW};

/// No analysis runs on fewer bars than this, whatever the indicator windows.
pub const MIN_ROWS: usize = 30;

/// Pipeline stage, traced at debug level on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialized,
    IndicatorsComputed,
    ConfidenceScored,
    EntryComputed,
    Finalized,
    Rejected,
}

/// One OHLCV series and its bar interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeSeries {
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
}

impl TimeframeSeries {
    pub fn new(timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self { timeframe, bars }
    }
}

/// Facts about the market that do not come from its bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketContext {
    pub market_cap_rank: Option<u32>,
}

pub type ConfidenceFn =
    fn(&IndicatorFrame, Timeframe, &ConfidenceWeights) -> Result<TimeframeScore, AnalysisError>;
pub type EntryFn = fn(&IndicatorFrame, &EntryRule) -> Result<EntryPoints, AnalysisError>;

/// Pluggable scoring strategies.
#[derive(Debug, Clone, Copy)]
pub struct ScoringHooks {
    pub confidence: ConfidenceFn,
    pub entry: EntryFn,
}

impl Default for ScoringHooks {
    fn default() -> Self {
        Self {
            confidence: score_timeframe,
            entry: entry_from_frame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub market_type: MarketType,
    pub confidence_weights: ConfidenceWeights,
    pub timeframe_weights: TimeframeWeights,
    pub thresholds: ThresholdPolicy,
    pub entry_rule: EntryRule,
    pub leverage: LeverageCalculator,
    /// Rows required beyond the largest indicator lookback.
    pub warmup_margin: usize,
    pub include_ichimoku: bool,
}

impl AnalyzerConfig {
    pub fn spot() -> Self {
        Self {
            market_type: MarketType::Spot,
            confidence_weights: ConfidenceWeights::default(),
            timeframe_weights: TimeframeWeights::default(),
            thresholds: ThresholdPolicy::spot(),
            entry_rule: EntryRule::spot(),
            leverage: LeverageCalculator::default(),
            warmup_margin: 30,
            include_ichimoku: false,
        }
    }

    pub fn swap() -> Self {
        Self {
            market_type: MarketType::Swap,
            thresholds: ThresholdPolicy::swap(),
            entry_rule: EntryRule::swap(),
            ..Self::spot()
        }
    }

    pub fn for_market(market_type: MarketType) -> Self {
        match market_type {
            MarketType::Spot => Self::spot(),
            MarketType::Swap => Self::swap(),
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.confidence_weights.validate()?;
        self.thresholds.validate()?;
        self.entry_rule.validate()?;
        self.leverage.validate()?;
        if self.warmup_margin < VOLUME_WINDOW {
            return Err(AnalysisError::Configuration(format!(
                "warm-up margin {} must leave at least {VOLUME_WINDOW} scored rows",
                self.warmup_margin
            )));
        }
        Ok(())
    }
}

/// Below-threshold outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct NoSignal {
    pub symbol: String,
    pub confidence: f64,
    pub threshold: f64,
    pub timeframe_scores: Vec<TimeframeScore>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Signal(Box<AnalysisResult>),
    NoSignal(NoSignal),
}

impl Verdict {
    pub fn is_signal(&self) -> bool {
        matches!(self, Verdict::Signal(_))
    }

    pub fn signal(&self) -> Option<&AnalysisResult> {
        match self {
            Verdict::Signal(r) => Some(r),
            Verdict::NoSignal(_) => None,
        }
    }

    pub fn into_signal(self) -> Option<AnalysisResult> {
        match self {
            Verdict::Signal(r) => Some(*r),
            Verdict::NoSignal(_) => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Verdict::Signal(r) => r.confidence,
            Verdict::NoSignal(n) => n.confidence,
        }
    }
}

#[derive(Debug)]
pub struct MarketAnalyzer {
    config: AnalyzerConfig,
    indicators: IndicatorSet,
    hooks: ScoringHooks,
}

impl MarketAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        Self::with_hooks(config, ScoringHooks::default())
    }

    pub fn with_hooks(config: AnalyzerConfig, hooks: ScoringHooks) -> Result<Self, AnalysisError> {
        config.validate()?;
        let indicators = if config.include_ichimoku {
            IndicatorSet::with_ichimoku()?
        } else {
            IndicatorSet::standard()?
        };
        Ok(Self {
            config,
            indicators,
            hooks,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Bars each timeframe must supply.
    pub fn required_rows(&self) -> usize {
        (self.indicators.max_lookback() + self.config.warmup_margin).max(MIN_ROWS)
    }

    /// Run the full pipeline for one symbol.
    pub fn analyze(
        &self,
        symbol: &str,
        series: &[TimeframeSeries],
        context: MarketContext,
    ) -> Result<Verdict, AnalysisError> {
        let mut stage = Stage::Initialized;
        trace(symbol, stage);

        let result = self.run(symbol, series, context, &mut stage);
        if let Err(err) = &result {
            debug!(symbol, failed_after = ?stage, error = %err, "analysis rejected");
            trace(symbol, Stage::Rejected);
        }
        result
    }

    fn run(
        &self,
        symbol: &str,
        series: &[TimeframeSeries],
        context: MarketContext,
        stage: &mut Stage,
    ) -> Result<Verdict, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::Configuration(format!(
                "{symbol}: no timeframe supplied"
            )));
        }
        let mut seen = BTreeSet::new();
        for s in series {
            if !seen.insert(s.timeframe) {
                return Err(AnalysisError::Configuration(format!(
                    "{symbol}: timeframe {} supplied twice",
                    s.timeframe
                )));
            }
        }

        let mut ordered: Vec<&TimeframeSeries> = series.iter().collect();
        ordered.sort_by_key(|s| s.timeframe);

        let frames = ordered
            .iter()
            .map(|s| -> Result<_, AnalysisError> { Ok((s.timeframe, self.prepare(s)?)) })
            .collect::<Result<Vec<_>, AnalysisError>>()?;
        advance(symbol, stage, Stage::IndicatorsComputed);

        let scores = frames
            .iter()
            .map(|(tf, frame)| (self.hooks.confidence)(frame, *tf, &self.config.confidence_weights))
            .collect::<Result<Vec<_>, AnalysisError>>()?;
        let confidence = aggregate(&scores, &self.config.timeframe_weights);
        let threshold = self.config.thresholds.threshold_for(&scores);
        advance(symbol, stage, Stage::ConfidenceScored);

        if confidence < threshold {
            debug!(symbol, confidence, threshold, "below confidence threshold");
            advance(symbol, stage, Stage::Rejected);
            return Ok(Verdict::NoSignal(NoSignal {
                symbol: symbol.to_string(),
                confidence,
                threshold,
                timeframe_scores: scores,
            }));
        }

        let (primary_tf, primary) = &frames[0];
        let entry = (self.hooks.entry)(primary, &self.config.entry_rule)?;
        advance(symbol, stage, Stage::EntryComputed);

        let leverage = match self.config.market_type {
            MarketType::Spot => None,
            MarketType::Swap => {
                let volatility = trend::volatility(primary)?;
                let strength = trend::trend_strength(primary)?;
                let stability = trend::volume_stability(primary, VOLUME_WINDOW);
                Some(self.config.leverage.recommend(
                    volatility,
                    strength,
                    Some(stability),
                    context.market_cap_rank,
                )?)
            }
        };

        let mut rationale: Vec<String> = scores.iter().flat_map(|s| s.reasons.clone()).collect();
        rationale.push(format!(
            "confidence {confidence:.3} >= threshold {threshold:.2} over {} timeframe(s)",
            scores.len()
        ));
        rationale.push(format!(
            "entry {:.6}, stop {:.6}, target {:.6}, reward/risk {:.2}",
            entry.entry, entry.stop_loss, entry.take_profit, entry.expected_return
        ));
        if let Some(info) = &leverage {
            rationale.push(info.description.clone());
        }

        let as_of = primary
            .latest_bar()
            .map(|b| b.timestamp)
            .ok_or_else(|| AnalysisError::insufficient(primary_tf.as_str(), 1, 0))?;

        let result = AnalysisResult {
            symbol: symbol.to_string(),
            market_type: self.config.market_type,
            signal: SignalClass::for_market(self.config.market_type),
            confidence,
            threshold,
            timeframe_scores: scores,
            primary_timeframe: *primary_tf,
            as_of,
            entry_price: entry.entry,
            stop_loss: entry.stop_loss,
            take_profit: entry.take_profit,
            atr: entry.atr,
            expected_return: entry.expected_return,
            leverage,
            indicators: primary.snapshot(),
            rationale,
        };
        advance(symbol, stage, Stage::Finalized);
        Ok(Verdict::Signal(Box::new(result)))
    }

    /// Validate, compute indicators, trim the warm-up and check definedness.
    fn prepare(&self, series: &TimeframeSeries) -> Result<IndicatorFrame, AnalysisError> {
        let required = self.required_rows();
        if series.bars.len() < required {
            return Err(AnalysisError::insufficient(
                series.timeframe.as_str(),
                required,
                series.bars.len(),
            ));
        }
        let frame = IndicatorFrame::new(series.bars.clone())?;
        let computed = self.indicators.apply(&frame)?;
        let trimmed = computed.trim_warmup(self.indicators.max_lookback())?;
        trimmed.ensure_defined(&self.indicators.lagging_columns())?;
        Ok(trimmed)
    }
}

fn trace(symbol: &str, stage: Stage) {
    debug!(symbol, stage = ?stage, "analyzer stage");
}

fn advance(symbol: &str, stage: &mut Stage, next: Stage) {
    *stage = next;
    trace(symbol, next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn uptrend(n: usize) -> Vec<Bar> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * 1.005f64.powi(i as i32)).collect();
        make_bars(&closes)
    }

    #[test]
    fn required_rows_covers_lookback_and_margin() {
        let a = MarketAnalyzer::new(AnalyzerConfig::swap()).unwrap();
        assert_eq!(a.required_rows(), 49 + 30);
    }

    #[test]
    fn empty_and_duplicate_timeframes_are_configuration_errors() {
        let a = MarketAnalyzer::new(AnalyzerConfig::swap()).unwrap();
        assert!(matches!(
            a.analyze("X", &[], MarketContext::default()),
            Err(AnalysisError::Configuration(_))
        ));
        let s = TimeframeSeries::new(Timeframe::H6, uptrend(100));
        assert!(matches!(
            a.analyze("X", &[s.clone(), s], MarketContext::default()),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn short_series_is_insufficient() {
        let a = MarketAnalyzer::new(AnalyzerConfig::spot()).unwrap();
        let s = TimeframeSeries::new(Timeframe::D1, uptrend(60));
        match a.analyze("X", &[s], MarketContext::default()) {
            Err(AnalysisError::InsufficientData { required, actual, .. }) => {
                assert_eq!(required, 79);
                assert_eq!(actual, 60);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn custom_confidence_hook_is_used() {
        fn always_full(
            _: &IndicatorFrame,
            timeframe: Timeframe,
            _: &ConfidenceWeights,
        ) -> Result<TimeframeScore, AnalysisError> {
            Ok(TimeframeScore {
                timeframe,
                score: 1.0,
                components: Default::default(),
                reasons: vec!["hooked".into()],
            })
        }
        let hooks = ScoringHooks {
            confidence: always_full,
            ..Default::default()
        };
        let a = MarketAnalyzer::with_hooks(AnalyzerConfig::spot(), hooks).unwrap();
        let flat = make_bars(&[100.0; 120]);
        let v = a
            .analyze("FLAT", &[TimeframeSeries::new(Timeframe::H4, flat)], MarketContext::default())
            .unwrap();
        let r = v.signal().unwrap();
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.rationale[0], "hooked");
        assert!(r.leverage.is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = AnalyzerConfig::swap();
        cfg.thresholds.single = 1.5;
        assert!(MarketAnalyzer::new(cfg).is_err());

        let mut cfg = AnalyzerConfig::swap();
        cfg.warmup_margin = 5;
        assert!(MarketAnalyzer::new(cfg).is_err());
    }
}
