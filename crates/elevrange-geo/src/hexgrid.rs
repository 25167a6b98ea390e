//! Hexagonal grid used as a spatial deduplication key.
//!
//! Points are projected with a Lambert cylindrical equal-area projection
//! (`x = R * lon`, `y = R * sin(lat)`) so that every cell covers the same
//! ground area, then binned into pointy-top hexagons addressed by axial
//! coordinates.

use crate::{GeoError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0072;

/// Axial coordinates of a hexagonal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexCell {
    pub q: i64,
    pub r: i64,
}

impl fmt::Display for HexCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.q, self.r)
    }
}

impl FromStr for HexCell {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Split on the separator after the first character so "-3_-4" works.
        let split = s
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '_')
            .map(|(i, _)| i)
            .ok_or_else(|| format!("invalid hex cell '{}'", s))?;
        let q = s[..split]
            .parse()
            .map_err(|_| format!("invalid hex cell '{}'", s))?;
        let r = s[split + 1..]
            .parse()
            .map_err(|_| format!("invalid hex cell '{}'", s))?;
        Ok(HexCell { q, r })
    }
}

impl Serialize for HexCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Pointy-top hexagonal grid with a fixed center-to-center spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexGrid {
    spacing_km: f64,
    /// Center-to-vertex radius in kilometres.
    size: f64,
}

impl HexGrid {
    /// Create a grid whose neighbouring cell centers are `spacing_km` apart.
    pub fn new(spacing_km: f64) -> Result<Self> {
        if !spacing_km.is_finite() || spacing_km <= 0.0 {
            return Err(GeoError::InvalidSpacing(spacing_km));
        }
        Ok(Self {
            spacing_km,
            size: spacing_km / 3f64.sqrt(),
        })
    }

    pub fn spacing_km(&self) -> f64 {
        self.spacing_km
    }

    /// Cell containing a point.
    pub fn cell(&self, lon: f64, lat: f64) -> HexCell {
        let (x, y) = project(lon, lat);
        let q = (3f64.sqrt() / 3.0 * x - y / 3.0) / self.size;
        let r = (2.0 / 3.0 * y) / self.size;
        cube_round(q, r)
    }

    /// Center of a cell as `(lon, lat)`.
    pub fn center(&self, cell: HexCell) -> (f64, f64) {
        let (q, r) = (cell.q as f64, cell.r as f64);
        let x = self.size * 3f64.sqrt() * (q + r / 2.0);
        let y = self.size * 1.5 * r;
        unproject(x, y)
    }
}

fn project(lon: f64, lat: f64) -> (f64, f64) {
    (
        EARTH_RADIUS_KM * lon.to_radians(),
        EARTH_RADIUS_KM * lat.to_radians().sin(),
    )
}

fn unproject(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_KM).to_degrees();
    let lat = (y / EARTH_RADIUS_KM).clamp(-1.0, 1.0).asin().to_degrees();
    (lon, lat)
}

/// Round fractional axial coordinates to the nearest hexagon.
fn cube_round(q: f64, r: f64) -> HexCell {
    let s = -q - r;
    let (mut rq, mut rr, rs) = (q.round(), r.round(), s.round());
    let (dq, dr, ds) = ((rq - q).abs(), (rr - r).abs(), (rs - s).abs());

    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    HexCell {
        q: rq as i64,
        r: rr as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_bad_spacing() {
        assert!(HexGrid::new(0.0).is_err());
        assert!(HexGrid::new(-3.0).is_err());
        assert!(HexGrid::new(f64::NAN).is_err());
    }

    #[test]
    fn test_center_maps_back_to_cell() {
        let grid = HexGrid::new(3.0).unwrap();
        for q in -5..5 {
            for r in 1440..1450 {
                let cell = HexCell { q: q * 1000, r };
                let (lon, lat) = grid.center(cell);
                assert_eq!(grid.cell(lon, lat), cell);
            }
        }
    }

    #[test]
    fn test_nearby_points_share_cell() {
        let grid = HexGrid::new(3.0).unwrap();
        let a = grid.cell(-105.9, 39.6);
        let (lon, lat) = grid.center(a);
        // ~100 m from the center.
        let b = grid.cell(lon + 0.0009, lat + 0.0009);
        assert_eq!(a, b);
        // ~10 km away.
        let c = grid.cell(lon, lat + 0.09);
        assert_ne!(a, c);
    }

    #[test]
    fn test_neighbour_spacing() {
        let grid = HexGrid::new(3.0).unwrap();
        let (x0, y0) = project_center(&grid, HexCell { q: 0, r: 0 });
        let (x1, y1) = project_center(&grid, HexCell { q: 1, r: 0 });
        let (x2, y2) = project_center(&grid, HexCell { q: 0, r: 1 });
        assert_relative_eq!(((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(((x2 - x0).powi(2) + (y2 - y0).powi(2)).sqrt(), 3.0, epsilon = 1e-9);
    }

    fn project_center(grid: &HexGrid, cell: HexCell) -> (f64, f64) {
        let (lon, lat) = grid.center(cell);
        project(lon, lat)
    }

    #[test]
    fn test_display_and_parse() {
        let cell = HexCell { q: -3, r: -4 };
        assert_eq!(cell.to_string(), "-3_-4");
        assert_eq!("-3_-4".parse::<HexCell>().unwrap(), cell);
        assert_eq!("12_7".parse::<HexCell>().unwrap(), HexCell { q: 12, r: 7 });
        assert!("12".parse::<HexCell>().is_err());
        assert!("a_b".parse::<HexCell>().is_err());
    }
}
