//! Error taxonomy for the scoring pipeline.
//!
//! A below-threshold confidence is not an error: it surfaces as
//! [`crate::analyzer::Verdict::NoSignal`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Too few bars for the indicator windows plus warm-up margin.
    #[error("insufficient data for {context}: need {required} bars, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    /// NaN/Inf values, broken OHLC invariants, unordered timestamps,
    /// non-positive prices or a missing column.
    #[error("data quality: {0}")]
    DataQuality(String),

    /// A denominator or derived price that cannot be resolved to a safe value.
    #[error("degenerate math: {0}")]
    DegenerateMath(String),

    /// Invalid construction parameters.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AnalysisError {
    pub fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context: context.into(),
            required,
            actual,
        }
    }

    /// Short machine-friendly label, used by the batch driver's failure log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::DataQuality(_) => "data_quality",
            Self::DegenerateMath(_) => "degenerate_math",
            Self::Configuration(_) => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_context() {
        let err = AnalysisError::insufficient("6h", 80, 12);
        assert_eq!(
            err.to_string(),
            "insufficient data for 6h: need 80 bars, got 12"
        );
        assert_eq!(err.kind(), "insufficient_data");
    }
}
