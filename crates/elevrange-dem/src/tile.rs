//! Single-band raster representation.

use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

/// GeoTIFF `ModelPixelScaleTag`.
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
/// GeoTIFF `ModelTiepointTag`.
const TAG_MODEL_TIEPOINT: u16 = 33922;
/// GDAL no-data tag, stored as an ASCII string.
const TAG_GDAL_NODATA: u16 = 42113;

/// Geographic bounds of a raster (outer cell edges).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl TileBounds {
    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Overlap of two bounding boxes, if any.
    pub fn intersection(&self, other: &TileBounds) -> Option<TileBounds> {
        let bounds = TileBounds {
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
            min_lon: self.min_lon.max(other.min_lon),
            max_lon: self.max_lon.min(other.max_lon),
        };
        (bounds.min_lat < bounds.max_lat && bounds.min_lon < bounds.max_lon).then_some(bounds)
    }
}

/// How a raster value is read at an arbitrary coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Bilinear interpolation between the four surrounding cell centers.
    #[default]
    Bilinear,
    /// Value of the cell containing the coordinate.
    Nearest,
}

/// A single-band raster grid in geographic coordinates.
///
/// Cells are areas: cell `(row, col)` spans one pixel-scale step east and
/// south of `(max_lat - row * dy, min_lon + col * dx)`. Row 0 is the
/// northern edge.
#[derive(Debug, Clone)]
pub struct RasterTile {
    /// Values in row-major order (north to south, west to east).
    data: Vec<f32>,
    /// Width of the raster in cells.
    width: u32,
    /// Height of the raster in cells.
    height: u32,
    /// Geographic bounds.
    bounds: TileBounds,
    /// No-data value (cells equal to this are treated as missing).
    no_data_value: Option<f32>,
}

impl RasterTile {
    /// Build a raster from values already in memory.
    pub fn from_grid(
        width: u32,
        height: u32,
        bounds: TileBounds,
        data: Vec<f32>,
        no_data_value: Option<f32>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(DemError::DimensionMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            bounds,
            no_data_value,
        })
    }

    /// Load a raster from a GeoTIFF file.
    ///
    /// The file must carry `ModelTiepoint` and `ModelPixelScale` tags in
    /// geographic (longitude/latitude) units.
    pub fn from_geotiff<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut decoder = Decoder::new(std::io::BufReader::new(file))?;

        // Regional elevation rasters easily exceed the decoder's default limits.
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let bounds = Self::read_geotransform(&mut decoder, path)?;
        let no_data_value = Self::read_nodata_value(&mut decoder);
        let data = Self::decode_values(&mut decoder)?;

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            ?no_data_value,
            "Loaded GeoTIFF raster"
        );

        Self::from_grid(width, height, bounds, data, no_data_value)
    }

    /// Read the geographic bounds from GeoTIFF tags.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
        path: &Path,
    ) -> Result<TileBounds> {
        let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT));
        let pixel_scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE));

        let (tiepoint, scale) = match (tiepoint, pixel_scale) {
            (Ok(t), Ok(s)) if t.len() >= 6 && s.len() >= 2 => (t, s),
            _ => {
                return Err(DemError::InvalidGeoTiff(format!(
                    "{} has no ModelTiepoint/ModelPixelScale tags",
                    path.display()
                )))
            }
        };

        // Tiepoint: [i, j, k, x, y, z] maps raster (i, j) to model (x, y).
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let (scale_x, scale_y) = (scale[0], scale[1]);
        if scale_x <= 0.0 || scale_y <= 0.0 {
            return Err(DemError::InvalidGeoTiff(format!(
                "{} has non-positive pixel scale",
                path.display()
            )));
        }

        let (width, height) = decoder.dimensions()?;
        let min_lon = tiepoint[3] - i * scale_x;
        let max_lat = tiepoint[4] + j * scale_y;

        Ok(TileBounds {
            min_lat: max_lat - height as f64 * scale_y,
            max_lat,
            min_lon,
            max_lon: min_lon + width as f64 * scale_x,
        })
    }

    /// Decode cell values from the TIFF decoder.
    fn decode_values<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Vec<f32>> {
        let values = match decoder.read_image()? {
            DecodingResult::F32(data) => data,
            DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
        };
        Ok(values)
    }

    /// Read the no-data value from the GDAL_NODATA tag, if present.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok())
    }

    /// Cell size in degrees `(lon, lat)`.
    pub fn resolution(&self) -> (f64, f64) {
        let lat_range = self.bounds.max_lat - self.bounds.min_lat;
        let lon_range = self.bounds.max_lon - self.bounds.min_lon;
        (lon_range / self.width as f64, lat_range / self.height as f64)
    }

    /// Value at a cell, or `None` for no-data and NaN cells.
    pub fn value(&self, row: u32, col: u32) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let value = self.data[(row * self.width + col) as usize];
        if value.is_nan() {
            return None;
        }
        match self.no_data_value {
            Some(nodata) if (value - nodata).abs() < 0.001 => None,
            _ => Some(value),
        }
    }

    /// Latitude and longitude of a cell center.
    pub fn cell_center(&self, row: u32, col: u32) -> (f64, f64) {
        let (dx, dy) = self.resolution();
        (
            self.bounds.max_lat - (row as f64 + 0.5) * dy,
            self.bounds.min_lon + (col as f64 + 0.5) * dx,
        )
    }

    fn check_bounds(&self, lat: f64, lon: f64) -> Result<()> {
        if self.bounds.contains(lat, lon) {
            return Ok(());
        }
        Err(DemError::OutOfBounds {
            lat,
            lon,
            min_lat: self.bounds.min_lat,
            max_lat: self.bounds.max_lat,
            min_lon: self.bounds.min_lon,
            max_lon: self.bounds.max_lon,
        })
    }

    /// Read the raster at a coordinate.
    pub fn sample(&self, lat: f64, lon: f64, sampling: Sampling) -> Result<f32> {
        match sampling {
            Sampling::Bilinear => self.sample_bilinear(lat, lon),
            Sampling::Nearest => self.sample_nearest(lat, lon),
        }
    }

    /// Bilinear interpolation between the four surrounding cell centers.
    ///
    /// Coordinates within half a cell of the edge are clamped to the edge
    /// cells. Any no-data neighbour makes the result no-data.
    pub fn sample_bilinear(&self, lat: f64, lon: f64) -> Result<f32> {
        self.check_bounds(lat, lon)?;
        let (dx, dy) = self.resolution();

        let x = ((lon - self.bounds.min_lon) / dx - 0.5).clamp(0.0, (self.width - 1) as f64);
        let y = ((self.bounds.max_lat - lat) / dy - 0.5).clamp(0.0, (self.height - 1) as f64);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let no_data = || DemError::NoData { lat, lon };
        let v00 = self.value(y0, x0).ok_or_else(no_data)? as f64;
        let v10 = self.value(y0, x1).ok_or_else(no_data)? as f64;
        let v01 = self.value(y1, x0).ok_or_else(no_data)? as f64;
        let v11 = self.value(y1, x1).ok_or_else(no_data)? as f64;

        let value = v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy;

        Ok(value as f32)
    }

    /// Value of the cell containing the coordinate.
    pub fn sample_nearest(&self, lat: f64, lon: f64) -> Result<f32> {
        let (row, col) = self.cell_index(lat, lon)?;
        self.value(row, col).ok_or(DemError::NoData { lat, lon })
    }

    /// Row and column of the cell containing a coordinate.
    pub fn cell_index(&self, lat: f64, lon: f64) -> Result<(u32, u32)> {
        self.check_bounds(lat, lon)?;
        let (dx, dy) = self.resolution();
        let col = (((lon - self.bounds.min_lon) / dx).floor() as u32).min(self.width - 1);
        let row = (((self.bounds.max_lat - lat) / dy).floor() as u32).min(self.height - 1);
        Ok((row, col))
    }

    /// Copy out the cells overlapping `region`.
    ///
    /// The result is snapped outward to whole cells.
    pub fn crop(&self, region: &TileBounds) -> Result<RasterTile> {
        let overlap = self.bounds.intersection(region).ok_or(DemError::EmptyCrop)?;
        let (dx, dy) = self.resolution();

        let col0 = ((overlap.min_lon - self.bounds.min_lon) / dx).floor().max(0.0) as u32;
        let col1 = (((overlap.max_lon - self.bounds.min_lon) / dx).ceil() as u32).min(self.width);
        let row0 = ((self.bounds.max_lat - overlap.max_lat) / dy).floor().max(0.0) as u32;
        let row1 = (((self.bounds.max_lat - overlap.min_lat) / dy).ceil() as u32).min(self.height);
        if col1 <= col0 || row1 <= row0 {
            return Err(DemError::EmptyCrop);
        }

        let width = col1 - col0;
        let height = row1 - row0;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in row0..row1 {
            let start = (row * self.width + col0) as usize;
            data.extend_from_slice(&self.data[start..start + width as usize]);
        }

        let bounds = TileBounds {
            min_lat: self.bounds.max_lat - row1 as f64 * dy,
            max_lat: self.bounds.max_lat - row0 as f64 * dy,
            min_lon: self.bounds.min_lon + col0 as f64 * dx,
            max_lon: self.bounds.min_lon + col1 as f64 * dx,
        };

        tracing::debug!(width, height, "Cropped raster");
        Self::from_grid(width, height, bounds, data, self.no_data_value)
    }

    /// Get the geographic bounds of this raster.
    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    /// Get the dimensions of this raster in cells.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// No-data marker, if any.
    pub fn no_data_value(&self) -> Option<f32> {
        self.no_data_value
    }

    /// Approximate cell size in metres at a given latitude.
    pub fn resolution_meters_at(&self, lat: f64) -> (f64, f64) {
        let (lon_deg, lat_deg) = self.resolution();
        (
            lon_deg * crate::METERS_PER_DEGREE * lat.to_radians().cos(),
            lat_deg * crate::METERS_PER_DEGREE,
        )
    }
}
