//! Moving Average Convergence/Divergence.
//!
//! macd = EMA(close, fast) - EMA(close, slow)
//! macd_signal = EMA(macd, signal)
//! macd_hist = macd - macd_signal
//! Lookback: (slow - 1) + (signal - 1).

use super::ema::ema_of_series;
use super::indicator::{Column, Indicator};
use crate::domain::Bar;
use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, AnalysisError> {
        if fast == 0 || slow == 0 || signal == 0 {
            return Err(AnalysisError::Configuration(
                "MACD periods must be >= 1".into(),
            ));
        }
        if fast >= slow {
            return Err(AnalysisError::Configuration(format!(
                "MACD fast period ({fast}) must be shorter than slow period ({slow})"
            )));
        }
        Ok(Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        })
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.slow - 1) + (self.signal - 1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);

        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&macd, self.signal);
        let hist: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        vec![
            ("macd".to_string(), macd),
            ("macd_signal".to_string(), signal),
            ("macd_hist".to_string(), hist),
        ]
    }
}
