//! Integration tests for elevrange-dem using GeoTIFF files written to a
//! temporary directory.

use approx::assert_relative_eq;
use elevrange_dem::{DemError, RasterTile, Sampling, TerrainModel, TileBounds};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const WIDTH: u32 = 20;
const HEIGHT: u32 = 10;
const CELL_DEG: f64 = 0.01;
const WEST: f64 = -106.0;
const NORTH: f64 = 40.0;

/// Write a GeoTIFF whose elevation drops 5 m per cell eastwards.
fn write_ramp(path: &Path, nodata_cell: Option<usize>) {
    let mut data: Vec<f32> = (0..WIDTH * HEIGHT)
        .map(|i| 3000.0 - 5.0 * (i % WIDTH) as f32)
        .collect();
    if let Some(cell) = nodata_cell {
        data[cell] = -9999.0;
    }

    let file = std::fs::File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(WIDTH, HEIGHT)
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), &[CELL_DEG, CELL_DEG, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), &[0.0, 0.0, 0.0, WEST, NORTH, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(42113), "-9999")
        .unwrap();
    image.write_data(&data).unwrap();
}

#[test]
fn test_geotiff_bounds_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.tif");
    write_ramp(&path, None);

    let tile = RasterTile::from_geotiff(&path).unwrap();
    assert_eq!(tile.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(tile.no_data_value(), Some(-9999.0));

    let bounds = tile.bounds();
    assert_relative_eq!(bounds.min_lon, WEST, epsilon = 1e-9);
    assert_relative_eq!(bounds.max_lon, WEST + WIDTH as f64 * CELL_DEG, epsilon = 1e-9);
    assert_relative_eq!(bounds.max_lat, NORTH, epsilon = 1e-9);
    assert_relative_eq!(bounds.min_lat, NORTH - HEIGHT as f64 * CELL_DEG, epsilon = 1e-9);

    assert_eq!(tile.value(0, 0), Some(3000.0));
    assert_eq!(tile.value(3, 4), Some(2980.0));

    let (lat, lon) = tile.cell_center(5, 10);
    let nearest = tile.sample(lat, lon, Sampling::Nearest).unwrap();
    assert_eq!(nearest, 2950.0);
}

#[test]
fn test_geotiff_nodata_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holes.tif");
    write_ramp(&path, Some((2 * WIDTH + 3) as usize));

    let tile = RasterTile::from_geotiff(&path).unwrap();
    let (lat, lon) = tile.cell_center(2, 3);
    assert!(matches!(
        tile.sample(lat, lon, Sampling::Nearest),
        Err(DemError::NoData { .. })
    ));
}

#[test]
fn test_missing_geotiff_tags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.tif");
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<colortype::Gray32Float>(2, 2, &[1.0, 2.0, 3.0, 4.0])
        .unwrap();

    assert!(matches!(
        RasterTile::from_geotiff(&path),
        Err(DemError::InvalidGeoTiff(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        RasterTile::from_geotiff("does/not/exist.tif"),
        Err(DemError::Io(_))
    ));
}

#[test]
fn test_cropped_terrain_from_geotiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.tif");
    write_ramp(&path, None);

    let tile = RasterTile::from_geotiff(&path).unwrap();
    let region = TileBounds {
        min_lat: 39.93,
        max_lat: 39.97,
        min_lon: -105.95,
        max_lon: -105.87,
    };
    let terrain = TerrainModel::new(tile.crop(&region).unwrap()).unwrap();
    let (width, height) = terrain.elevation().dimensions();
    assert!(width < WIDTH && height < HEIGHT);

    let sample = terrain.sample(39.95, -105.91).unwrap();
    assert_relative_eq!(sample.aspect_deg.unwrap(), 90.0, epsilon = 1e-3);
    assert!(sample.slope_deg > 0.0);

    assert!(matches!(
        terrain.sample(39.5, -105.91),
        Err(DemError::OutOfBounds { .. })
    ));
}
