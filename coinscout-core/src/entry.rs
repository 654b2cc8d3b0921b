//! Entry / stop-loss / take-profit from the latest close and ATR.
//!
//! entry = close, stop = entry - atr·m1, target = entry + atr·m2, with
//! m1 < m2 so that reward exceeds risk. expected_return = (target - entry) /
//! (entry - stop).

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::frame::IndicatorFrame;

/// Minimum distance between entry and stop before the return ratio is trusted.
pub const MIN_RISK_DISTANCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryRule {
    pub stop_atr_multiple: f64,
    pub target_atr_multiple: f64,
}

impl EntryRule {
    pub fn new(stop_atr_multiple: f64, target_atr_multiple: f64) -> Result<Self, AnalysisError> {
        let rule = Self {
            stop_atr_multiple,
            target_atr_multiple,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// 2 ATR stop, 3 ATR target.
    pub fn spot() -> Self {
        Self {
            stop_atr_multiple: 2.0,
            target_atr_multiple: 3.0,
        }
    }

    /// 1.5 ATR stop, 2.5 ATR target for leveraged positions.
    pub fn swap() -> Self {
        Self {
            stop_atr_multiple: 1.5,
            target_atr_multiple: 2.5,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let (m1, m2) = (self.stop_atr_multiple, self.target_atr_multiple);
        if !(m1.is_finite() && m2.is_finite() && m1 > 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "ATR multiples must be finite and positive (stop {m1}, target {m2})"
            )));
        }
        if m1 >= m2 {
            return Err(AnalysisError::Configuration(format!(
                "stop multiple {m1} must be smaller than target multiple {m2}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryPoints {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub atr: f64,
    pub expected_return: f64,
}

/// Derive entry points from a close and its ATR.
pub fn entry_points(close: f64, atr: f64, rule: &EntryRule) -> Result<EntryPoints, AnalysisError> {
    if !(close.is_finite() && close > 0.0) {
        return Err(AnalysisError::DegenerateMath(format!(
            "entry price must be positive, got {close}"
        )));
    }
    if !(atr.is_finite() && atr > 0.0) {
        return Err(AnalysisError::DegenerateMath(format!(
            "ATR must be positive, got {atr}"
        )));
    }

    let entry = close;
    let stop_loss = entry - atr * rule.stop_atr_multiple;
    let take_profit = entry + atr * rule.target_atr_multiple;

    if !(stop_loss.is_finite() && stop_loss > 0.0) {
        return Err(AnalysisError::DegenerateMath(format!(
            "stop-loss {stop_loss} is not positive (entry {entry}, atr {atr})"
        )));
    }
    if !take_profit.is_finite() {
        return Err(AnalysisError::DegenerateMath(format!(
            "take-profit {take_profit} is not finite"
        )));
    }
    let risk = entry - stop_loss;
    if risk <= MIN_RISK_DISTANCE {
        return Err(AnalysisError::DegenerateMath(format!(
            "risk distance {risk} below {MIN_RISK_DISTANCE}"
        )));
    }
    let expected_return = (take_profit - entry) / risk;
    if !(expected_return.is_finite() && expected_return > 0.0) {
        return Err(AnalysisError::DegenerateMath(format!(
            "expected return {expected_return} is not finite and positive"
        )));
    }

    Ok(EntryPoints {
        entry,
        stop_loss,
        take_profit,
        atr,
        expected_return,
    })
}

/// Entry points from the latest row of a frame carrying an `atr` column.
pub fn entry_from_frame(
    frame: &IndicatorFrame,
    rule: &EntryRule,
) -> Result<EntryPoints, AnalysisError> {
    let close = frame
        .latest_bar()
        .map(|b| b.close)
        .ok_or_else(|| AnalysisError::insufficient("entry", 1, 0))?;
    let atr = frame.require("atr")?.last().copied().unwrap_or(f64::NAN);
    entry_points(close, atr, rule)
}
