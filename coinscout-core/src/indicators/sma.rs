//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use super::indicator::{Column, Indicator};
use crate::domain::Bar;
use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, AnalysisError> {
        if period == 0 {
            return Err(AnalysisError::Configuration("SMA period must be >= 1".into()));
        }
        Ok(Self {
            period,
            name: format!("sma_{period}"),
        })
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        vec![(self.name.clone(), sma_of_series(&closes, self.period))]
    }
}

/// Rolling mean of an arbitrary series. A window containing NaN yields NaN,
/// so a NaN warm-up prefix in the input simply extends the output's prefix.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}

/// Rolling population standard deviation (divide by N), NaN-propagating like
/// [`sma_of_series`].
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        result[i] = var.sqrt();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_3_known_values() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let cols = Sma::new(3).unwrap().compute(&bars);
        let (name, v) = &cols[0];
        assert_eq!(name, "sma_3");
        assert!(v[0].is_nan());
        assert!(v[1].is_nan());
        assert_approx(v[2], 11.0, DEFAULT_EPSILON);
        assert_approx(v[3], 12.0, DEFAULT_EPSILON);
        assert_approx(v[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_of_series_skips_nan_prefix() {
        let v = sma_of_series(&[f64::NAN, 1.0, 2.0, 3.0], 2);
        assert!(v[0].is_nan());
        assert!(v[1].is_nan());
        assert_approx(v[2], 1.5, DEFAULT_EPSILON);
        assert_approx(v[3], 2.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_std_of_constant_is_zero() {
        let v = rolling_std(&[5.0; 6], 3);
        assert!(v[1].is_nan());
        assert_approx(v[5], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_period_is_configuration_error() {
        assert!(matches!(Sma::new(0), Err(AnalysisError::Configuration(_))));
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).unwrap().lookback(), 19);
    }
}
