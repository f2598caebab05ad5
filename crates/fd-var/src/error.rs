//! Error types for VaR forecasting and backtesting.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for VaR operations.
pub type Result<T> = std::result::Result<T, VarError>;

/// Errors that abort a forecasting or backtesting run.
///
/// Per-point numerical problems are not errors; they surface as
/// [`crate::rolling::PointEstimate::Skip`] instead.
#[derive(Debug, Error)]
pub enum VarError {
    /// Input file does not exist
    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Missing required column in input data
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Timestamp that cannot be parsed as a calendar date
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// No rows left after merging and cleaning
    #[error("No data left after {0}")]
    EmptyData(String),

    /// Non-positive rolling window
    #[error("Window size must be positive, got {size} for {label}")]
    InvalidWindow {
        /// Window label
        label: String,
        /// Offending size
        size: usize,
    },

    /// Rolling window longer than the available history
    #[error("Window size {size} for {label} exceeds data length {available}")]
    WindowExceedsData {
        /// Window label
        label: String,
        /// Requested window size
        size: usize,
        /// Available number of periods
        available: usize,
    },

    /// Confidence level outside the open unit interval
    #[error("Confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),

    /// No z-score tabulated for a confidence level
    #[error("No z-score tabulated for confidence level {0}")]
    MissingZScore(f64),

    /// Forecast series does not contain the requested confidence level
    #[error("VaR forecasts must have '{0}' column")]
    MissingForecast(String),

    /// Returns and forecasts share no valid observations
    #[error("No valid data after aligning returns and VaR for {0}")]
    EmptyAlignment(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Run summary could not be serialized
    #[error("Failed to serialize run summary: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
