//! Error types for Sleep Flux

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    /// No usable samples in the requested window
    #[error("No sleep data: {0}")]
    NoData(String),

    /// The data source itself failed
    #[error("Provider failure: {0}")]
    ProviderFailure(String),

    #[error("Provider call timed out after {seconds}s for window starting {window_start}")]
    Timeout { window_start: String, seconds: u64 },

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Accumulated surplus drove the debt-adjusted sleep need to zero or below
    #[error("Debt-adjusted sleep need is not positive: {0} hours")]
    NonPositiveSleepNeed(f64),
}

impl ComputeError {
    /// Whether this is a normal absence-of-data situation rather than a fault.
    ///
    /// Presentation layers should render these as "nothing to show yet".
    pub fn is_absence(&self) -> bool {
        matches!(self, ComputeError::NoData(_))
    }

    /// Short machine-readable code, shared by the CLI and FFI error payloads
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::NoData(_) => "NO_DATA",
            ComputeError::ProviderFailure(_) => "PROVIDER_FAILURE",
            ComputeError::Timeout { .. } => "TIMEOUT",
            ComputeError::InvalidWindow(_) => "INVALID_WINDOW",
            ComputeError::InvalidConfig(_) => "INVALID_CONFIG",
            ComputeError::ParseError(_) => "PARSE_ERROR",
            ComputeError::JsonError(_) => "JSON_ERROR",
            ComputeError::Runtime(_) => "RUNTIME_ERROR",
            ComputeError::NonPositiveSleepNeed(_) => "NON_POSITIVE_SLEEP_NEED",
        }
    }
}
