//! Domain error types.
//!
//! Every variant except the config/data/io group is scoped to a single bar or
//! decision: the engine turns it into a [`BarOutcome`](crate::domain::engine::BarOutcome)
//! and carries on with the next bar.

use chrono::NaiveDateTime;

/// Top-level error type for orbtrader.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("out-of-order bar for {symbol}: {timestamp} is not after {last}")]
    OutOfOrder {
        symbol: String,
        timestamp: NaiveDateTime,
        last: NaiveDateTime,
    },

    #[error("bar for {got} appended to window of {expected}")]
    SymbolMismatch { expected: String, got: String },

    #[error("insufficient data: have {bars} bars, need {needed}")]
    InsufficientData { bars: usize, needed: usize },

    #[error("invalid signal: {reason}")]
    InvalidSignal { reason: String },

    #[error("order size is zero for {symbol} (capital {capital}, midpoint {midpoint})")]
    ZeroSize {
        symbol: String,
        capital: f64,
        midpoint: f64,
    },

    #[error("order submission rejected for {symbol}: {reason}")]
    Submission { symbol: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl EngineError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that only affect the bar or decision that raised them.
    pub fn is_bar_scoped(&self) -> bool {
        matches!(
            self,
            EngineError::OutOfOrder { .. }
                | EngineError::SymbolMismatch { .. }
                | EngineError::InsufficientData { .. }
                | EngineError::InvalidSignal { .. }
                | EngineError::ZeroSize { .. }
                | EngineError::Submission { .. }
        )
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Data { .. } => 3,
            EngineError::OutOfOrder { .. }
            | EngineError::SymbolMismatch { .. }
            | EngineError::InsufficientData { .. }
            | EngineError::InvalidSignal { .. }
            | EngineError::ZeroSize { .. }
            | EngineError::Submission { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
