//! Ichimoku Kinko Hyo.
//!
//! - `tenkan_sen`: midpoint of rolling high/low over `tenkan`
//! - `kijun_sen`: midpoint of rolling high/low over `kijun`
//! - `senkou_span_a`: (tenkan + kijun) / 2, shifted forward by `kijun`
//! - `senkou_span_b`: midpoint of rolling high/low over `senkou_b`, shifted forward by `kijun`
//! - `chikou_span`: close shifted backward by `kijun`
//!
//! Chikou reads future closes, so its last `kijun` rows are undefined and it
//! is reported as a lagging column.
//! Lookback: (max window - 1) + kijun.

use super::indicator::{Column, Indicator};
use crate::domain::Bar;
use crate::error::AnalysisError;
use crate::stats::{rolling_max, rolling_min};

#[derive(Debug, Clone)]
pub struct Ichimoku {
    tenkan: usize,
    kijun: usize,
    senkou_b: usize,
    name: String,
}

impl Ichimoku {
    pub fn new(tenkan: usize, kijun: usize, senkou_b: usize) -> Result<Self, AnalysisError> {
        if tenkan == 0 || kijun == 0 || senkou_b == 0 {
            return Err(AnalysisError::Configuration(
                "Ichimoku periods must be >= 1".into(),
            ));
        }
        Ok(Self {
            tenkan,
            kijun,
            senkou_b,
            name: format!("ichimoku_{tenkan}_{kijun}_{senkou_b}"),
        })
    }
}

fn midpoint(highs: &[f64], lows: &[f64], period: usize) -> Vec<f64> {
    rolling_max(highs, period)
        .into_iter()
        .zip(rolling_min(lows, period))
        .map(|(h, l)| (h + l) / 2.0)
        .collect()
}

/// Shift a series by `by` rows: positive moves values later, negative earlier.
fn shift(values: &[f64], by: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let src = i - by;
            if (0..n).contains(&src) {
                values[src as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}

impl Indicator for Ichimoku {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.senkou_b.max(self.kijun).max(self.tenkan) - 1) + self.kijun
    }

    fn lagging_columns(&self) -> Vec<String> {
        vec!["chikou_span".to_string()]
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let tenkan = midpoint(&highs, &lows, self.tenkan);
        let kijun = midpoint(&highs, &lows, self.kijun);
        let span_a: Vec<f64> = tenkan.iter().zip(&kijun).map(|(t, k)| (t + k) / 2.0).collect();
        let span_b = midpoint(&highs, &lows, self.senkou_b);
        let shift_by = self.kijun as isize;

        vec![
            ("tenkan_sen".to_string(), tenkan),
            ("kijun_sen".to_string(), kijun),
            ("senkou_span_a".to_string(), shift(&span_a, shift_by)),
            ("senkou_span_b".to_string(), shift(&span_b, shift_by)),
            ("chikou_span".to_string(), shift(&closes, -shift_by)),
        ]
    }
}
