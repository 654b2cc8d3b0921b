//! Indicator frame: an OHLCV series plus named, row-aligned indicator columns.
//!
//! Construction validates the series (sane bars, strictly increasing
//! timestamps). Columns are always the same length as the bar series and use
//! `f64::NAN` for undefined values. Frames are values: adding a column
//! consumes the frame and returns the extended one, so a frame that has been
//! handed to another analysis is never mutated behind its back.

use std::collections::BTreeMap;

use crate::domain::Bar;
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    bars: Vec<Bar>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    /// Validate and wrap an OHLCV series.
    pub fn new(bars: Vec<Bar>) -> Result<Self, AnalysisError> {
        validate_bars(&bars)?;
        Ok(Self {
            bars,
            columns: BTreeMap::new(),
        })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn latest_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Like [`column`](Self::column) but a missing column is a data-quality failure.
    pub fn require(&self, name: &str) -> Result<&[f64], AnalysisError> {
        self.column(name)
            .ok_or_else(|| AnalysisError::DataQuality(format!("missing indicator column '{name}'")))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.columns.get(name).and_then(|v| v.get(index).copied())
    }

    /// Value of a column on the last row.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.columns.get(name).and_then(|v| v.last().copied())
    }

    /// Latest value of a column, required to exist and be finite.
    pub fn latest_finite(&self, name: &str) -> Result<f64, AnalysisError> {
        let v = self.require(name)?.last().copied().unwrap_or(f64::NAN);
        if v.is_finite() {
            Ok(v)
        } else {
            Err(AnalysisError::DataQuality(format!(
                "latest value of '{name}' is not finite ({v})"
            )))
        }
    }

    /// Return the frame with one more column. Replaces an existing column of
    /// the same name.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        if values.len() != self.bars.len() {
            return Err(AnalysisError::DataQuality(format!(
                "column '{name}' has {} rows, frame has {}",
                values.len(),
                self.bars.len()
            )));
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    /// Drop the first `n` rows (the indicator warm-up prefix).
    pub fn trim_warmup(&self, n: usize) -> Result<Self, AnalysisError> {
        if n >= self.bars.len() {
            return Err(AnalysisError::insufficient(
                "warm-up trim",
                n + 1,
                self.bars.len(),
            ));
        }
        Ok(Self {
            bars: self.bars[n..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[n..].to_vec()))
                .collect(),
        })
    }

    /// Keep only the last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let skip = self.bars.len().saturating_sub(n);
        Self {
            bars: self.bars[skip..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[skip..].to_vec()))
                .collect(),
        }
    }

    /// Fail on the first non-finite value in any column not listed in `exempt`.
    pub fn ensure_defined(&self, exempt: &[String]) -> Result<(), AnalysisError> {
        for (name, values) in &self.columns {
            if exempt.iter().any(|e| e == name) {
                continue;
            }
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(AnalysisError::DataQuality(format!(
                    "column '{name}' undefined at row {row} after warm-up trim"
                )));
            }
        }
        Ok(())
    }

    /// Latest finite value of every column, for reporting.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.columns
            .iter()
            .filter_map(|(k, v)| {
                v.last()
                    .copied()
                    .filter(|x| x.is_finite())
                    .map(|x| (k.clone(), x))
            })
            .collect()
    }
}

fn validate_bars(bars: &[Bar]) -> Result<(), AnalysisError> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(AnalysisError::DataQuality(format!(
                "bar {i} at {} violates OHLCV invariants \
                 (o={}, h={}, l={}, c={}, v={})",
                bar.timestamp, bar.open, bar.high, bar.low, bar.close, bar.volume
            )));
        }
    }
    if let Some(i) = bars
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
    {
        return Err(AnalysisError::DataQuality(format!(
            "timestamps not strictly increasing at row {}: {} then {}",
            i + 1,
            bars[i].timestamp,
            bars[i + 1].timestamp
        )));
    }
    Ok(())
}
