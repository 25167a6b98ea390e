//! # elevrange-dem
//!
//! Elevation rasters read from GeoTIFF files, plus the terrain attributes
//! (slope and aspect) derived from them.
//!
//! ## Overview
//!
//! A [`RasterTile`] is a single-band grid in WGS84 longitude/latitude with
//! an optional no-data marker. It is read once and never mutated; cropping
//! produces a new tile. The same type holds elevation and covariate layers
//! such as land cover.
//!
//! A [`TerrainModel`] wraps an elevation tile and precomputes slope and
//! aspect with Horn's method, so that point queries return a
//! [`TerrainSample`] in one call.
//!
//! ## Example
//!
//! ```no_run
//! use elevrange_dem::{RasterTile, Sampling, TerrainModel, TileBounds};
//!
//! let tile = RasterTile::from_geotiff("data/elevation.tif")?;
//! let region = TileBounds { min_lat: 39.0, max_lat: 41.0, min_lon: -107.0, max_lon: -105.0 };
//! let terrain = TerrainModel::new(tile.crop(&region)?)?.with_sampling(Sampling::Bilinear);
//!
//! let sample = terrain.sample(39.6, -105.9)?;
//! println!("{} m, slope {:.1} deg", sample.elevation_m, sample.slope_deg);
//! # Ok::<(), elevrange_dem::DemError>(())
//! ```

mod error;
mod terrain;
mod tile;

pub use error::DemError;
pub use terrain::{horn_slope_aspect, SlopeAspect, TerrainModel, TerrainSample, FLAT_GRADIENT_THRESHOLD};
pub use tile::{RasterTile, Sampling, TileBounds};

/// Metres per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, DemError>;
