//! Market-state measures feeding the leverage calculator.
//!
//! Trend strength adds capped contributions from the latest rows of a
//! trimmed indicator frame:
//!
//! - EMA alignment: ema_20 > ema_50 (0.1), rising ema_20 (0.05), ema_20
//!   rising faster than ema_50 (0.05); slopes measured over 4 bars
//! - MACD: above zero (0.1), above signal (0.05), rising (0.05)
//! - Bollinger position: %B > 0.5 (0.1), %B > 0.8 (0.1)
//! - up-close consistency over the last 10 bars (up to 0.2)
//! - breakout above `va_high` scaled by relative volume (up to 0.2)
//!
//! The total is capped at 1.

use crate::error::AnalysisError;
use crate::frame::IndicatorFrame;
use crate::stats::{mean, std_dev};

const SLOPE_BARS: usize = 4;
const CONSISTENCY_BARS: usize = 10;
/// Volume window for stability and breakout confirmation.
pub const VOLUME_WINDOW: usize = 20;

/// Minimum rows required by [`trend_strength`].
pub const MIN_TREND_ROWS: usize = CONSISTENCY_BARS;

/// Latest ATR relative to the latest close.
pub fn volatility(frame: &IndicatorFrame) -> Result<f64, AnalysisError> {
    let atr = frame.latest_finite("atr")?;
    let close = frame
        .latest_bar()
        .map(|b| b.close)
        .ok_or_else(|| AnalysisError::insufficient("volatility", 1, 0))?;
    if close <= 0.0 {
        return Err(AnalysisError::DegenerateMath(format!(
            "cannot compute volatility against close {close}"
        )));
    }
    Ok(atr / close)
}

pub fn trend_strength(frame: &IndicatorFrame) -> Result<f64, AnalysisError> {
    let n = frame.len();
    if n < MIN_TREND_ROWS {
        return Err(AnalysisError::insufficient("trend strength", MIN_TREND_ROWS, n));
    }
    let last = n - 1;
    let back = last - SLOPE_BARS;
    let col = |name: &str| frame.require(name);

    let mut strength = 0.0;

    let (ema20, ema50) = (col("ema_20")?, col("ema_50")?);
    if ema20[last] > ema50[last] {
        strength += 0.1;
        let slope20 = relative_change(ema20[back], ema20[last]);
        let slope50 = relative_change(ema50[back], ema50[last]);
        if slope20 > 0.0 {
            strength += 0.05;
            if slope20 > slope50 {
                strength += 0.05;
            }
        }
    }

    let (macd, signal) = (col("macd")?, col("macd_signal")?);
    if macd[last] > 0.0 {
        strength += 0.1;
        if macd[last] > signal[last] {
            strength += 0.05;
            if macd[last] > macd[last - 1] {
                strength += 0.05;
            }
        }
    }

    let pct_b = col("bb_percent_b")?[last];
    if pct_b > 0.5 {
        strength += 0.1;
        if pct_b > 0.8 {
            strength += 0.1;
        }
    }

    let bars = frame.bars();
    let recent = &bars[n - CONSISTENCY_BARS..];
    let up = recent.windows(2).filter(|w| w[1].close > w[0].close).count();
    strength += up as f64 / (CONSISTENCY_BARS - 1) as f64 * 0.2;

    let close = bars[last].close;
    if close > col("va_high")?[last] {
        let window = &frame.volumes()[n.saturating_sub(VOLUME_WINDOW)..];
        let avg = mean(window);
        if avg > 0.0 {
            strength += (bars[last].volume / avg * 0.1).min(0.2);
        }
    }

    Ok(strength.clamp(0.0, 1.0))
}

/// 1 - min(1, cv) of the last `window` volumes; 0 when nothing traded.
pub fn volume_stability(frame: &IndicatorFrame, window: usize) -> f64 {
    let volumes = frame.volumes();
    let recent = &volumes[volumes.len().saturating_sub(window)..];
    let avg = mean(recent);
    if avg <= 0.0 {
        return 0.0;
    }
    1.0 - (std_dev(recent) / avg).min(1.0)
}

fn relative_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from
    }
}
