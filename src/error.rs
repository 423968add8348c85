//! Error types for the forecast_property crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the forecast_property crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing or malformed request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Source dataset or growth index missing or unreadable
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Model fitting aborted; no bundle was written
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// One or more bundle artifacts are missing from the store
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A bundle artifact is present but cannot be deserialized,
    /// or its schema version does not match this build
    #[error("Model corrupt: {0}")]
    ModelCorrupt(String),

    /// Query features incompatible with the trained schema
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Nearest-neighbor lookup could not be completed
    #[error("Similarity lookup failed: {0}")]
    SimilarityLookup(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}
