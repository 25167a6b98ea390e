//! Slope and aspect derived from an elevation raster.
//!
//! Gradients use Horn's (1981) 3x3 weighted finite difference. Edge cells
//! reuse their own value for missing neighbours. Aspect is the downslope
//! direction in degrees clockwise from north; cells whose gradient is below
//! [`FLAT_GRADIENT_THRESHOLD`] have no aspect.

use crate::tile::{RasterTile, Sampling, TileBounds};
use crate::{DemError, Result};
use serde::Serialize;

/// Minimum gradient magnitude treated as non-flat (tan 0.01°).
pub const FLAT_GRADIENT_THRESHOLD: f64 = 1.745e-4;

/// Slope and aspect of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeAspect {
    /// Slope in degrees from horizontal.
    pub slope_deg: f64,
    /// Downslope direction in degrees clockwise from north, `None` if flat.
    pub aspect_deg: Option<f64>,
}

/// Terrain attributes at a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerrainSample {
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub aspect_deg: Option<f64>,
}

/// Horn slope and aspect of a cell.
///
/// Returns `None` if the cell or any neighbour used is no-data.
pub fn horn_slope_aspect(tile: &RasterTile, row: u32, col: u32) -> Option<SlopeAspect> {
    let (width, height) = tile.dimensions();
    let center = tile.value(row, col)?;

    let z = |dr: i64, dc: i64| -> Option<f64> {
        let r = row as i64 + dr;
        let c = col as i64 + dc;
        if r < 0 || c < 0 || r >= height as i64 || c >= width as i64 {
            return Some(center as f64);
        }
        tile.value(r as u32, c as u32).map(|v| v as f64)
    };

    // a b c
    // d e f
    // g h i   (row 0 is north)
    let (a, b, c) = (z(-1, -1)?, z(-1, 0)?, z(-1, 1)?);
    let (d, f) = (z(0, -1)?, z(0, 1)?);
    let (g, h, i) = (z(1, -1)?, z(1, 0)?, z(1, 1)?);

    let (lat, _) = tile.cell_center(row, col);
    let (dx, dy) = tile.resolution_meters_at(lat);

    let dz_east = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
    let dz_north = ((a + 2.0 * b + c) - (g + 2.0 * h + i)) / (8.0 * dy);
    let magnitude = (dz_east * dz_east + dz_north * dz_north).sqrt();

    let aspect_deg = if magnitude < FLAT_GRADIENT_THRESHOLD {
        None
    } else {
        // Downslope vector is the negative gradient.
        let deg = (-dz_east).atan2(-dz_north).to_degrees();
        Some(if deg < 0.0 { deg + 360.0 } else { deg })
    };

    Some(SlopeAspect {
        slope_deg: magnitude.atan().to_degrees(),
        aspect_deg,
    })
}

/// Elevation raster with precomputed slope and aspect grids.
#[derive(Debug, Clone)]
pub struct TerrainModel {
    elevation: RasterTile,
    slope: RasterTile,
    aspect: RasterTile,
    sampling: Sampling,
}

impl TerrainModel {
    /// Derive slope and aspect grids from an elevation raster.
    pub fn new(elevation: RasterTile) -> Result<Self> {
        let (width, height) = elevation.dimensions();
        let cells = width as usize * height as usize;
        let mut slope = Vec::with_capacity(cells);
        let mut aspect = Vec::with_capacity(cells);

        for row in 0..height {
            for col in 0..width {
                match horn_slope_aspect(&elevation, row, col) {
                    Some(sa) => {
                        slope.push(sa.slope_deg as f32);
                        aspect.push(sa.aspect_deg.map_or(f32::NAN, |a| a as f32));
                    }
                    None => {
                        slope.push(f32::NAN);
                        aspect.push(f32::NAN);
                    }
                }
            }
        }

        let bounds = elevation.bounds();
        let flat = aspect.iter().filter(|a| a.is_nan()).count();
        tracing::info!(width, height, flat_or_missing = flat, "Derived slope and aspect");

        Ok(Self {
            slope: RasterTile::from_grid(width, height, bounds, slope, None)?,
            aspect: RasterTile::from_grid(width, height, bounds, aspect, None)?,
            elevation,
            sampling: Sampling::default(),
        })
    }

    /// Choose how elevation is sampled. Slope and aspect always use the
    /// containing cell.
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Terrain attributes at a coordinate.
    pub fn sample(&self, lat: f64, lon: f64) -> Result<TerrainSample> {
        let elevation_m = self.elevation.sample(lat, lon, self.sampling)? as f64;
        let (row, col) = self.slope.cell_index(lat, lon)?;
        let slope_deg = self
            .slope
            .value(row, col)
            .ok_or(DemError::NoData { lat, lon })? as f64;
        let aspect_deg = self.aspect.value(row, col).map(|a| a as f64);

        Ok(TerrainSample {
            elevation_m,
            slope_deg,
            aspect_deg,
        })
    }

    /// Geographic extent of the model.
    pub fn bounds(&self) -> TileBounds {
        self.elevation.bounds()
    }

    pub fn elevation(&self) -> &RasterTile {
        &self.elevation
    }

    pub fn slope(&self) -> &RasterTile {
        &self.slope
    }

    pub fn aspect(&self) -> &RasterTile {
        &self.aspect
    }
}
