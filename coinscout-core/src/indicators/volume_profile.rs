//! Volume Profile: Point of Control and Value Area, plus cumulative VWAP.
//!
//! The frame's [min low, max high] range is split into `n_bins` equal
//! buckets and each bar's volume is assigned to the bucket holding its
//! close (the top edge folds into the last bucket). The Point of Control
//! (POC) is the heaviest bucket, lowest index on ties. The Value Area grows
//! one bucket at a time from the POC toward the heavier neighbour (below on
//! ties) until it holds at least 70% of the total volume.
//!
//! `poc_price`, `va_high` and `va_low` are frame-wide constants, so this
//! indicator is not causal; `vwap` is.
//!
//! Degenerate frames: zero total volume → POC at the range midpoint and the
//! Value Area spanning the whole range; zero price range → POC and both
//! Value Area bounds at that single price.
//! Lookback: 0.

use super::indicator::{Column, Indicator};
use crate::domain::Bar;
use crate::error::AnalysisError;

/// Fraction of total volume the Value Area must enclose.
pub const VALUE_AREA_FRACTION: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct VolumeProfile {
    n_bins: usize,
    name: String,
}

/// Histogram and derived levels of one volume profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub price_low: f64,
    pub price_high: f64,
    pub bin_size: f64,
    pub volumes: Vec<f64>,
    pub total_volume: f64,
    pub poc_bin: usize,
    pub va_low_bin: usize,
    pub va_high_bin: usize,
    pub poc_price: f64,
    pub va_low: f64,
    pub va_high: f64,
}

impl ProfileSummary {
    /// Volume enclosed by the Value Area buckets.
    pub fn value_area_volume(&self) -> f64 {
        self.volumes[self.va_low_bin..=self.va_high_bin].iter().sum()
    }
}

impl VolumeProfile {
    pub fn new(n_bins: usize) -> Result<Self, AnalysisError> {
        if n_bins == 0 {
            return Err(AnalysisError::Configuration(
                "Volume profile needs at least one bin".into(),
            ));
        }
        Ok(Self {
            n_bins,
            name: format!("volume_profile_{n_bins}"),
        })
    }

    /// Build the profile histogram. `None` for an empty series.
    pub fn profile(&self, bars: &[Bar]) -> Option<ProfileSummary> {
        if bars.is_empty() {
            return None;
        }
        let price_low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let price_high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let range = price_high - price_low;
        let n = self.n_bins;

        let mut volumes = vec![0.0; n];
        let total_volume: f64 = bars.iter().map(|b| b.volume).sum();

        if range <= 0.0 {
            volumes[0] = total_volume;
            return Some(ProfileSummary {
                price_low,
                price_high,
                bin_size: 0.0,
                volumes,
                total_volume,
                poc_bin: 0,
                va_low_bin: 0,
                va_high_bin: 0,
                poc_price: price_low,
                va_low: price_low,
                va_high: price_low,
            });
        }

        let bin_size = range / n as f64;
        for bar in bars {
            let raw = ((bar.close - price_low) / bin_size).floor();
            let idx = if raw <= 0.0 { 0 } else { (raw as usize).min(n - 1) };
            volumes[idx] += bar.volume;
        }

        if total_volume <= 0.0 {
            return Some(ProfileSummary {
                price_low,
                price_high,
                bin_size,
                volumes,
                total_volume,
                poc_bin: n / 2,
                va_low_bin: 0,
                va_high_bin: n - 1,
                poc_price: price_low + range / 2.0,
                va_low: price_low,
                va_high: price_high,
            });
        }

        let mut poc_bin = 0;
        for (i, &v) in volumes.iter().enumerate() {
            if v > volumes[poc_bin] {
                poc_bin = i;
            }
        }

        let target = VALUE_AREA_FRACTION * total_volume;
        let (mut lo, mut hi) = (poc_bin, poc_bin);
        let mut enclosed = volumes[poc_bin];
        while enclosed < target && (lo > 0 || hi < n - 1) {
            let below = if lo > 0 { Some(volumes[lo - 1]) } else { None };
            let above = if hi < n - 1 { Some(volumes[hi + 1]) } else { None };
            match (below, above) {
                (Some(b), Some(a)) if a > b => {
                    hi += 1;
                    enclosed += a;
                }
                (Some(b), _) => {
                    lo -= 1;
                    enclosed += b;
                }
                (None, Some(a)) => {
                    hi += 1;
                    enclosed += a;
                }
                (None, None) => break,
            }
        }

        Some(ProfileSummary {
            price_low,
            price_high,
            bin_size,
            volumes,
            total_volume,
            poc_bin,
            va_low_bin: lo,
            va_high_bin: hi,
            poc_price: price_low + (poc_bin as f64 + 0.5) * bin_size,
            va_low: price_low + lo as f64 * bin_size,
            va_high: price_low + (hi + 1) as f64 * bin_size,
        })
    }
}

/// Cumulative VWAP on the typical price. Rows before any volume has traded
/// fall back to the typical price itself.
pub fn cumulative_vwap(bars: &[Bar]) -> Vec<f64> {
    let mut pv = 0.0;
    let mut vol = 0.0;
    bars.iter()
        .map(|b| {
            let tp = b.typical_price();
            pv += tp * b.volume;
            vol += b.volume;
            if vol > 0.0 {
                pv / vol
            } else {
                tp
            }
        })
        .collect()
}

impl Indicator for VolumeProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Column> {
        let n = bars.len();
        let (poc, va_high, va_low) = match self.profile(bars) {
            Some(p) => (p.poc_price, p.va_high, p.va_low),
            None => (f64::NAN, f64::NAN, f64::NAN),
        };
        vec![
            ("poc_price".to_string(), vec![poc; n]),
            ("va_high".to_string(), vec![va_high; n]),
            ("va_low".to_string(), vec![va_low; n]),
            ("vwap".to_string(), cumulative_vwap(bars)),
        ]
    }
}
