//! Error types for the forecasting engine.

use thiserror::Error;

/// Result type for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error kinds surfaced by the forecasting engine.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("No valid candidate found by {driver} after trying {tried} candidates")]
    NoValidCandidate { driver: String, tried: usize },

    #[error("Numeric failure: {0}")]
    NumericFailure(String),
}
