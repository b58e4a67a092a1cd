use thiserror::Error;

/// Errors raised by the indicator pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// The input series is shorter than the indicator's minimum window.
    #[error("insufficient data for {indicator}: need {required} values, got {actual}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        actual: usize,
    },

    /// A window or period of zero was requested.
    #[error("invalid period for {indicator}: {period}")]
    InvalidPeriod {
        indicator: &'static str,
        period: usize,
    },
}

impl IndicatorError {
    pub(crate) fn insufficient(indicator: &'static str, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            indicator,
            required,
            actual,
        }
    }
}
