//! Error types for the geo crate.

use thiserror::Error;

/// Errors from grid construction and polygon loading.
#[derive(Debug, Error)]
pub enum GeoError {
    /// I/O error reading a polygon file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The polygon file is not valid GeoJSON.
    #[error("GeoJSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A geometry could not be converted to a polygon.
    #[error("Invalid geometry in feature {index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },

    /// Hex spacing must be positive and finite.
    #[error("Invalid hex spacing: {0} km")]
    InvalidSpacing(f64),
}
