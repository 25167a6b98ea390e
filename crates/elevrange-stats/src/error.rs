//! Error types for the statistics crate.

use thiserror::Error;

/// Errors from summaries, model fitting and simulation.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Elevation bin width must be positive and finite.
    #[error("Invalid bin width: {0}")]
    InvalidBinWidth(f64),

    /// A distribution or model parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A feature row has the wrong number of values.
    #[error("Expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// No column with this name.
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Too few rows to fit or evaluate.
    #[error("Not enough data: need {needed}, have {available}")]
    NotEnoughData { needed: usize, available: usize },
}
