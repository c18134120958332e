//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for strategist.
///
/// Every engine failure surfaces here; nothing is clamped or replaced with a
/// default. Running out of optimization budget is not an error and is reported
/// through [`crate::domain::optimizer::Termination`] instead.
#[derive(Debug, thiserror::Error)]
pub enum StrategistError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

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

    #[error("invalid rule {rule}: {reason}")]
    InvalidRule { rule: usize, reason: String },

    #[error("no data for {ticker} between {start} and {end}")]
    NoData {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("invalid price for {ticker} on {date}: {reason}")]
    InvalidPrice {
        ticker: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("insufficient data for {ticker}: {reason}")]
    DataInsufficient { ticker: String, reason: String },

    #[error(
        "window {start} to {end} is too short for a {horizon_days}-day realization horizon"
    )]
    DegenerateWindow {
        start: NaiveDate,
        end: NaiveDate,
        horizon_days: i64,
    },

    #[error("optimizer error: {reason}")]
    Optimizer { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StrategistError> for std::process::ExitCode {
    fn from(err: &StrategistError) -> Self {
        let code: u8 = match err {
            StrategistError::Io(_) => 1,
            StrategistError::ConfigParse { .. }
            | StrategistError::ConfigMissing { .. }
            | StrategistError::ConfigInvalid { .. } => 2,
            StrategistError::DataSource { .. } => 3,
            StrategistError::InvalidRule { .. } => 4,
            StrategistError::NoData { .. }
            | StrategistError::InvalidPrice { .. }
            | StrategistError::DataInsufficient { .. }
            | StrategistError::DegenerateWindow { .. } => 5,
            StrategistError::Optimizer { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
