//! # elevrange-geo
//!
//! Spatial keys and polygon lookups for observation records.
//!
//! - [`HexGrid`] bins points into equal-area hexagons. The cell id is only
//!   used to group records during spatial deduplication.
//! - [`MountainRanges`] holds named range polygons loaded from a GeoJSON
//!   FeatureCollection and answers "which range is this point within".
//!
//! All coordinates are WGS84 longitude/latitude in degrees.

mod error;
mod hexgrid;
mod ranges;

pub use error::GeoError;
pub use hexgrid::{HexCell, HexGrid, EARTH_RADIUS_KM};
pub use ranges::{MountainRange, MountainRanges, RangeLayerConfig};

/// Result type for geo operations.
pub type Result<T> = std::result::Result<T, GeoError>;
