//! Named mountain-range polygons and point-in-polygon lookup.

use crate::{GeoError, Result};
use geo::{BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

// ============================================================================
// Layer configuration
// ============================================================================

/// Which attributes name a range and which features to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangeLayerConfig {
    /// Property holding the range name.
    pub name_field: String,
    /// Property holding the country list.
    pub country_field: String,
    /// Property holding the hierarchy level.
    pub hierarchy_field: String,
    /// Keep features whose country property contains this value.
    pub country: Option<String>,
    /// Keep features whose hierarchy property equals this value.
    pub hierarchy: Option<String>,
}

impl Default for RangeLayerConfig {
    fn default() -> Self {
        Self {
            name_field: "MapName".to_string(),
            country_field: "Countries".to_string(),
            hierarchy_field: "Level_03".to_string(),
            country: None,
            hierarchy: None,
        }
    }
}

// ============================================================================
// GeoJSON input
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    GeometryCollection { geometries: Vec<Geometry> },
    #[serde(other)]
    Unsupported,
}

fn property_string(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn ring(index: usize, positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords = positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(GeoError::InvalidGeometry {
                index,
                reason: "position has fewer than two coordinates".to_string(),
            }),
        })
        .collect::<Result<Vec<_>>>()?;
    if coords.len() < 4 {
        return Err(GeoError::InvalidGeometry {
            index,
            reason: format!("ring has {} positions, need at least 4", coords.len()),
        });
    }
    Ok(LineString::new(coords))
}

fn polygon(index: usize, rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first().ok_or_else(|| GeoError::InvalidGeometry {
        index,
        reason: "polygon has no rings".to_string(),
    })?;
    let interiors = interiors
        .iter()
        .map(|r| ring(index, r))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(ring(index, exterior)?, interiors))
}

/// Append every polygon of `geometry` to `out`, descending into collections.
fn collect_polygons(index: usize, geometry: &Geometry, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    match geometry {
        Geometry::Polygon { coordinates } => out.push(polygon(index, coordinates)?),
        Geometry::MultiPolygon { coordinates } => {
            for p in coordinates {
                out.push(polygon(index, p)?);
            }
        }
        Geometry::GeometryCollection { geometries } => {
            for g in geometries {
                collect_polygons(index, g, out)?;
            }
        }
        Geometry::Unsupported => {}
    }
    Ok(())
}

// ============================================================================
// Ranges
// ============================================================================

/// A named mountain range.
#[derive(Debug, Clone)]
pub struct MountainRange {
    pub name: String,
    pub country: Option<String>,
    pub hierarchy: Option<String>,
    geometry: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl MountainRange {
    pub fn new(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let bbox = geometry.bounding_rect();
        Self {
            name: name.into(),
            country: None,
            hierarchy: None,
            geometry,
            bbox,
        }
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Whether the point lies strictly inside the range.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let Some(bbox) = self.bbox else {
            return false;
        };
        let (min, max) = (bbox.min(), bbox.max());
        if lon < min.x || lon > max.x || lat < min.y || lat > max.y {
            return false;
        }
        self.geometry.contains(&Point::new(lon, lat))
    }
}

/// An ordered set of mountain ranges.
///
/// A point belongs to at most one range: the first, in layer order, whose
/// interior contains it.
#[derive(Debug, Clone, Default)]
pub struct MountainRanges {
    ranges: Vec<MountainRange>,
}

impl MountainRanges {
    pub fn from_ranges(ranges: Vec<MountainRange>) -> Self {
        Self { ranges }
    }

    /// Parse a GeoJSON FeatureCollection.
    ///
    /// Features without geometry, with a non-polygon geometry, without a
    /// name, or rejected by the layer filters are skipped.
    pub fn from_geojson_str(json: &str, config: &RangeLayerConfig) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(json)?;
        let total = collection.features.len();
        let mut ranges = Vec::new();

        for (index, feature) in collection.features.into_iter().enumerate() {
            let properties = feature.properties.unwrap_or_default();
            let Some(name) = property_string(&properties, &config.name_field) else {
                tracing::debug!(index, "Skipping feature without a name");
                continue;
            };
            let country = property_string(&properties, &config.country_field);
            let hierarchy = property_string(&properties, &config.hierarchy_field);

            if let Some(wanted) = &config.country {
                if !country.as_deref().is_some_and(|c| c.contains(wanted.as_str())) {
                    continue;
                }
            }
            if let Some(wanted) = &config.hierarchy {
                if hierarchy.as_deref() != Some(wanted.as_str()) {
                    continue;
                }
            }

            let mut polygons = Vec::new();
            if let Some(geometry) = &feature.geometry {
                collect_polygons(index, geometry, &mut polygons)?;
            }
            if polygons.is_empty() {
                tracing::debug!(index, name = %name, "Skipping feature without polygon geometry");
                continue;
            }
            let geometry = MultiPolygon::new(polygons);

            let mut range = MountainRange::new(name, geometry);
            range.country = country;
            range.hierarchy = hierarchy;
            ranges.push(range);
        }

        tracing::info!(features = total, kept = ranges.len(), "Loaded mountain ranges");
        Ok(Self { ranges })
    }

    pub fn from_geojson_path<P: AsRef<Path>>(path: P, config: &RangeLayerConfig) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&json, config)
    }

    /// The range containing a point, if any.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&MountainRange> {
        self.ranges.iter().find(|r| r.contains(lon, lat))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountainRange> {
        self.ranges.iter()
    }
}
