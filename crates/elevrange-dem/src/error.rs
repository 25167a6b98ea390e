//! Error types for the DEM crate.

use thiserror::Error;

/// Errors that can occur when working with raster data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Coordinate is outside the bounds of the raster.
    #[error("Coordinate ({lat}, {lon}) is outside raster bounds ({min_lat}-{max_lat}, {min_lon}-{max_lon})")]
    OutOfBounds {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
        /// Raster minimum latitude.
        min_lat: f64,
        /// Raster maximum latitude.
        max_lat: f64,
        /// Raster minimum longitude.
        min_lon: f64,
        /// Raster maximum longitude.
        max_lon: f64,
    },

    /// No data value encountered.
    #[error("No raster data at coordinate ({lat}, {lon})")]
    NoData {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
    },

    /// Grid dimensions do not match the supplied data.
    #[error("Grid of {width}x{height} cells needs {expected} values, got {actual}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Crop region does not overlap the raster.
    #[error("Crop region does not overlap the raster")]
    EmptyCrop,
}
