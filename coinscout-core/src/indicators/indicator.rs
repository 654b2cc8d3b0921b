//! Indicator trait and the explicit indicator set used by the analyzers.
//!
//! Indicators are pure functions: bar history in, named numeric columns out.
//! There is no global registry; each analyzer builds its [`IndicatorSet`]
//! at construction time.

use crate::domain::Bar;
use crate::error::AnalysisError;
use crate::frame::IndicatorFrame;

use super::{Atr, Bollinger, Ema, Ichimoku, Macd, Obv, Rsi, Stochastic, VolumeProfile};

/// A named output series, same length as the input bars.
pub type Column = (String, Vec<f64>);

/// Trait for indicators.
///
/// The first `lookback()` values of every column should be `f64::NAN`.
///
/// # Look-ahead contamination guard
/// Apart from frame-wide aggregates (Volume Profile) and columns declared in
/// [`lagging_columns`](Indicator::lagging_columns), no value at bar t may
/// depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "macd_12_26_9").
    fn name(&self) -> &str;

    /// Number of leading rows that are undefined.
    fn lookback(&self) -> usize;

    /// Columns that are undefined at the end of the series by construction
    /// and therefore exempt from the post-trim definedness check.
    fn lagging_columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Compute every output column for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<Column>;

    /// Return a new frame with this indicator's columns added.
    fn calculate(&self, frame: &IndicatorFrame) -> Result<IndicatorFrame, AnalysisError> {
        self.compute(frame.bars())
            .into_iter()
            .try_fold(frame.clone(), |f, (name, values)| f.with_column(name, values))
    }
}

/// Ordered collection of indicators applied together.
pub struct IndicatorSet {
    indicators: Vec<Box<dyn Indicator>>,
}

impl std::fmt::Debug for IndicatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.indicators.iter().map(|i| i.name()))
            .finish()
    }
}

impl IndicatorSet {
    pub fn new(indicators: Vec<Box<dyn Indicator>>) -> Self {
        Self { indicators }
    }

    /// EMA 20/50, MACD 12/26/9, Bollinger 20/2, RSI 14, Stochastic 14/3,
    /// ATR 14, OBV with a 20-bar signal line and a 24-bin volume profile.
    pub fn standard() -> Result<Self, AnalysisError> {
        Ok(Self::new(vec![
            Box::new(Ema::new(20)?),
            Box::new(Ema::new(50)?),
            Box::new(Macd::new(12, 26, 9)?),
            Box::new(Bollinger::new(20, 2.0)?),
            Box::new(Rsi::new(14)?),
            Box::new(Stochastic::new(14, 3)?),
            Box::new(Atr::new(14)?),
            Box::new(Obv::new(20)?),
            Box::new(VolumeProfile::new(24)?),
        ]))
    }

    /// The standard set plus Ichimoku 9/26/52.
    pub fn with_ichimoku() -> Result<Self, AnalysisError> {
        let mut set = Self::standard()?;
        set.push(Box::new(Ichimoku::new(9, 26, 52)?));
        Ok(set)
    }

    pub fn push(&mut self, indicator: Box<dyn Indicator>) {
        self.indicators.push(indicator);
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.indicators.iter().map(|i| i.name()).collect()
    }

    /// Largest warm-up of any member.
    pub fn max_lookback(&self) -> usize {
        self.indicators
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    pub fn lagging_columns(&self) -> Vec<String> {
        self.indicators
            .iter()
            .flat_map(|i| i.lagging_columns())
            .collect()
    }

    /// Compute every indicator over the frame and return the extended copy.
    pub fn apply(&self, frame: &IndicatorFrame) -> Result<IndicatorFrame, AnalysisError> {
        self.indicators.iter().try_fold(frame.clone(), |f, ind| {
            ind.compute(f.bars())
                .into_iter()
                .try_fold(f, |acc, (name, values)| acc.with_column(name, values))
        })
    }
}
