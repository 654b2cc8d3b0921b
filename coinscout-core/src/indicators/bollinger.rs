//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - `bb_middle`: SMA(close, period)
//! - `bb_upper` / `bb_lower`: middle ± mult · stddev(close, period)
//! - `bb_bandwidth`: (upper - lower) / middle, 0 when middle is 0
//! - `bb_percent_b`: (close - lower) / (upper - lower), clamped to [0, 1],
//!   0.5 when the bands collapse
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use super::indicator::{Column, Indicator};
use super::sma::{rolling_std, sma_of_series};
use crate::domain::Bar;
use crate::error::AnalysisError;

/// Band width below which the bands count as collapsed, relative to the middle.
const COLLAPSE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Result<Self, AnalysisError> {
        if period == 0 {
            return Err(AnalysisError::Configuration(
                "Bollinger period must be >= 1".into(),
            ));
        }
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "Bollinger multiplier must be positive, got {multiplier}"
            )));
        }
        Ok(Self {
            period,
            multiplier,
            name: format!("bollinger_{period}_{multiplier}"),
        })
    }
}

/// %B with the collapsed-band fallback and [0, 1] clamp.
pub fn percent_b(close: f64, lower: f64, middle: f64, upper: f64) -> f64 {
    if [close, lower, middle, upper].iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let width = upper - lower;
    if width <= COLLAPSE_TOLERANCE * middle.abs().max(1.0) {
        return 0.5;
    }
    ((close - lower) / width).clamp(0.0, 1.0)
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let middle = sma_of_series(&closes, self.period);
        let std = rolling_std(&closes, self.period);

        let n = closes.len();
        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];
        let mut bandwidth = vec![f64::NAN; n];
        let mut pct_b = vec![f64::NAN; n];

        for i in 0..n {
            if middle[i].is_nan() || std[i].is_nan() {
                continue;
            }
            upper[i] = middle[i] + self.multiplier * std[i];
            lower[i] = middle[i] - self.multiplier * std[i];
            bandwidth[i] = if middle[i] == 0.0 {
                0.0
            } else {
                (upper[i] - lower[i]) / middle[i]
            };
            pct_b[i] = percent_b(closes[i], lower[i], middle[i], upper[i]);
        }

        vec![
            ("bb_upper".to_string(), upper),
            ("bb_middle".to_string(), middle),
            ("bb_lower".to_string(), lower),
            ("bb_bandwidth".to_string(), bandwidth),
            ("bb_percent_b".to_string(), pct_b),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, column, make_bars, DEFAULT_EPSILON};

    #[test]
    fn bollinger_middle_is_sma() {
        let cols = Bollinger::new(3, 2.0)
            .unwrap()
            .compute(&make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]));
        let mid = column(&cols, "bb_middle").unwrap();
        assert!(mid[0].is_nan());
        assert!(mid[1].is_nan());
        assert_approx(mid[2], 11.0, DEFAULT_EPSILON);
        assert_approx(mid[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let cols = Bollinger::new(3, 2.0)
            .unwrap()
            .compute(&make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]));
        let upper = column(&cols, "bb_upper").unwrap();
        let middle = column(&cols, "bb_middle").unwrap();
        let lower = column(&cols, "bb_lower").unwrap();
        for i in 2..5 {
            assert_approx(middle[i] - lower[i], upper[i] - middle[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn bollinger_constant_price_collapses_to_neutral_percent_b() {
        let cols = Bollinger::new(3, 2.0)
            .unwrap()
            .compute(&make_bars(&[100.0, 100.0, 100.0, 100.0]));
        assert_approx(column(&cols, "bb_upper").unwrap()[2], 100.0, DEFAULT_EPSILON);
        assert_approx(column(&cols, "bb_lower").unwrap()[2], 100.0, DEFAULT_EPSILON);
        assert_approx(column(&cols, "bb_bandwidth").unwrap()[3], 0.0, DEFAULT_EPSILON);
        assert_eq!(column(&cols, "bb_percent_b").unwrap()[3], 0.5);
    }

    #[test]
    fn percent_b_is_clamped() {
        assert_eq!(percent_b(120.0, 90.0, 100.0, 110.0), 1.0);
        assert_eq!(percent_b(80.0, 90.0, 100.0, 110.0), 0.0);
        assert_approx(percent_b(105.0, 90.0, 100.0, 110.0), 0.75, DEFAULT_EPSILON);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(Bollinger::new(0, 2.0).is_err());
        assert!(Bollinger::new(20, 0.0).is_err());
        assert!(Bollinger::new(20, f64::NAN).is_err());
    }

    #[test]
    fn bollinger_lookback() {
        assert_eq!(Bollinger::new(20, 2.0).unwrap().lookback(), 19);
    }
}
