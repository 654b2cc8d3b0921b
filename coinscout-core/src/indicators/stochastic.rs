//! Stochastic oscillator.
//!
//! %K = 100 · (close - lowest_low(k)) / (highest_high(k) - lowest_low(k)),
//! 50 when the window has no range. %D = SMA(%K, d).
//! Lookback: (k - 1) + (d - 1).

use super::indicator::{Column, Indicator};
use super::sma::sma_of_series;
use crate::domain::Bar;
use crate::error::AnalysisError;
use crate::stats::{rolling_max, rolling_min};

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    name: String,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Result<Self, AnalysisError> {
        if k_period == 0 || d_period == 0 {
            return Err(AnalysisError::Configuration(
                "Stochastic periods must be >= 1".into(),
            ));
        }
        Ok(Self {
            k_period,
            d_period,
            name: format!("stoch_{k_period}_{d_period}"),
        })
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.k_period - 1) + (self.d_period - 1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let hh = rolling_max(&highs, self.k_period);
        let ll = rolling_min(&lows, self.k_period);

        let k: Vec<f64> = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                if hh[i].is_nan() || ll[i].is_nan() {
                    return f64::NAN;
                }
                let range = hh[i] - ll[i];
                if range <= 0.0 {
                    50.0
                } else {
                    (100.0 * (bar.close - ll[i]) / range).clamp(0.0, 100.0)
                }
            })
            .collect();
        let d = sma_of_series(&k, self.d_period);

        vec![("stoch_k".to_string(), k), ("stoch_d".to_string(), d)]
    }
}
