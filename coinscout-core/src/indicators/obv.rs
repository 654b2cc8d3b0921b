//! On-Balance Volume with an EMA signal line.
//!
//! obv[0] = 0; obv[t] = obv[t-1] ± volume[t] by close-to-close direction,
//! unchanged on a flat close. obv_ema = EMA(obv, signal_period).
//! Lookback: signal_period - 1.

use super::ema::ema_of_series;
use super::indicator::{Column, Indicator};
use crate::domain::Bar;
use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub struct Obv {
    signal_period: usize,
    name: String,
}

impl Obv {
    pub fn new(signal_period: usize) -> Result<Self, AnalysisError> {
        if signal_period == 0 {
            return Err(AnalysisError::Configuration(
                "OBV signal period must be >= 1".into(),
            ));
        }
        Ok(Self {
            signal_period,
            name: format!("obv_{signal_period}"),
        })
    }
}

pub fn on_balance_volume(bars: &[Bar]) -> Vec<f64> {
    let mut obv = Vec::with_capacity(bars.len());
    let mut acc = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev = bars[i - 1].close;
            if bar.close > prev {
                acc += bar.volume;
            } else if bar.close < prev {
                acc -= bar.volume;
            }
        }
        obv.push(acc);
    }
    obv
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.signal_period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let obv = on_balance_volume(bars);
        let signal = ema_of_series(&obv, self.signal_period);
        vec![("obv".to_string(), obv), ("obv_ema".to_string(), signal)]
    }
}
