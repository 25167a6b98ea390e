//! End-to-end runs over small input files in a temporary directory.

use elevrange_runner::output::{self, read_analysis};
use elevrange_runner::{run_pipeline, summarize_table, PipelineConfig, RunOptions};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const SPECIES: &str = "Perisoreus canadensis";

const SAMPLING: &str = "\
SAMPLING EVENT IDENTIFIER\tGROUP IDENTIFIER\tOBSERVER ID\tSTATE CODE\tLATITUDE\tLONGITUDE\tOBSERVATION DATE\tTIME OBSERVATIONS STARTED\tPROTOCOL TYPE\tDURATION MINUTES\tEFFORT DISTANCE KM\tNUMBER OBSERVERS\tALL SPECIES REPORTED
C01\t\tobsr1\tUS-CO\t39.12\t-105.88\t2019-06-10\t07:00:00\tStationary\t20\t\t1\t1
C02\t\tobsr2\tUS-CO\t39.13\t-105.87\t2019-06-11\t07:30:00\tStationary\t20\t\t1\t1
C03\t\tobsr3\tUS-WY\t41.50\t-105.50\t2019-06-11\t08:00:00\tStationary\t20\t\t1\t1
C04\t\tobsr4\tUS-CO\t39.40\t-105.40\t2019-06-12\t08:00:00\tStationary\t20\t\t1\t0
C05\t\tobsr5\tUS-CO\t\t-105.40\t2019-06-12\t08:00:00\tStationary\t20\t\t1\t1
C06\t\tobsr6\tUS-CO\t39.50\t-105.30\t2019-06-12\t09:00:00\tStationary\t20\t\t1\t1
C07\t\tobsr7\tUS-CO\t39.80\t-105.20\t2019-06-13\t09:00:00\tStationary\t20\t\t1\t1
C08\t\tobsr8\tUS-CO\t39.30\t-105.70\t2019-06-13\t10:00:00\tStationary\t20\t\t1\t1
C09\t\tobsr9\tUS-CO\t39.60\t-105.60\t2019-06-14\t06:15:00\tStationary\t20\t\t1\t1
C10\t\tobsr10\tUS-CO\t39.90\t-105.90\t2019-06-14\t06:45:00\tStationary\t20\t\t1\t1
";

const OBSERVATIONS: &str = "\
SAMPLING EVENT IDENTIFIER\tSCIENTIFIC NAME\tCOMMON NAME\tOBSERVATION COUNT
C01\tPerisoreus canadensis\tCanada Jay\t2
C02\tPerisoreus canadensis\tCanada Jay\t1
C04\tPerisoreus canadensis\tCanada Jay\t1
C08\tPerisoreus canadensis\tCanada Jay\tX
C10\tPerisoreus canadensis\tCanada Jay\t3
C07\tCinclus mexicanus\tAmerican Dipper\t1
";

const RANGES: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "properties": {"MapName": "Test Range", "Countries": "United States", "Level_03": "Test Range"},
     "geometry": {"type": "Polygon",
                  "coordinates": [[[-106.0, 39.0], [-105.5, 39.0], [-105.5, 40.0], [-106.0, 40.0], [-106.0, 39.0]]]}}
]}"#;

const CONFIG: &str = "\
species: Perisoreus canadensis
seed: 5
output_dir: out
inputs:
  observations: observations.txt
  sampling: sampling.txt
  elevation: elevation.tif
  mountain_ranges: ranges.geojson
  covariates:
    - name: forest
      path: forest.tif
model:
  k: 2
  sample_sizes: [4]
  replicates: 2
  grid_steps: 5
simulation:
  shift_sample_size: 50
  sample_sizes: [10]
  replicates: 5
  grid: { min_m: 0, max_m: 3000, steps: 11 }
";

const SIZE: u32 = 20;
const CELL_DEG: f64 = 0.05;

/// Write a 1-degree GeoTIFF with its north-west corner at 40N 106W.
fn write_geotiff(path: &Path, value: impl Fn(u32, u32) -> f32) {
    let data: Vec<f32> = (0..SIZE * SIZE).map(|i| value(i / SIZE, i % SIZE)).collect();
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder.new_image::<colortype::Gray32Float>(SIZE, SIZE).unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), &[CELL_DEG, CELL_DEG, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), &[0.0, 0.0, 0.0, -106.0, 40.0, 0.0][..])
        .unwrap();
    image.write_data(&data).unwrap();
}

/// Write every input file and return the loaded configuration.
fn setup(dir: &Path) -> PipelineConfig {
    std::fs::write(dir.join("sampling.txt"), SAMPLING).unwrap();
    std::fs::write(dir.join("observations.txt"), OBSERVATIONS).unwrap();
    std::fs::write(dir.join("ranges.geojson"), RANGES).unwrap();
    // Rising towards the north-west.
    write_geotiff(&dir.join("elevation.tif"), |row, col| {
        3000.0 - 40.0 * col as f32 - 20.0 * row as f32
    });
    write_geotiff(&dir.join("forest.tif"), |_, _| 0.4);
    let config_path = dir.join("config.yaml");
    std::fs::write(&config_path, CONFIG).unwrap();
    PipelineConfig::from_yaml_file(&config_path).unwrap()
}

#[test]
fn test_full_run_writes_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let run = run_pipeline(&config, RunOptions::default()).unwrap();

    assert_eq!(run.species, SPECIES);
    assert_eq!(run.seed, 5);

    let counts = run.records.as_ref().expect("records were built");
    assert_eq!(counts.sampling.accepted, 9);
    assert_eq!(counts.sampling.rejected_total(), 1);
    assert_eq!(counts.filter.excluded.get("incomplete"), Some(&1));

    // C04 is incomplete, so its detection is not zero-filled.
    assert_eq!(run.zero_filled, 8);
    assert_eq!(run.detections, 4);
    assert!(run.subsampled <= run.zero_filled);
    assert_eq!(
        run.join.joined + run.join.outside_raster + run.join.no_elevation,
        run.subsampled
    );
    assert_eq!(run.join.outside_raster, 1);
    assert_eq!(run.join.outside_ranges, 2);

    for name in [
        output::ZERO_FILLED_CSV,
        output::ANALYSIS_CSV,
        output::SUMMARY_CSV,
        output::SUMMARY_BY_RANGE_CSV,
        output::ENCOUNTER_RATE_CSV,
        output::PARTIAL_DEPENDENCE_CSV,
        output::RANGE_SHIFT_CSV,
        output::SAMPLE_SIZE_EFFECT_CSV,
        output::DENSITIES_CSV,
        output::RUN_SUMMARY_JSON,
    ] {
        let path = config.output_dir.join(name);
        assert!(path.exists(), "missing {}", path.display());
        assert!(run.outputs.contains(&path), "unlisted {}", path.display());
    }

    let elevation = run.summary.overall.elevation.expect("detections have elevations");
    assert!(elevation.min <= elevation.p05);
    assert!(elevation.p05 <= elevation.median);
    assert!(elevation.median <= elevation.p95);
    assert!(elevation.p95 <= elevation.max);
    assert_eq!(run.summary.by_range.len(), 1);
    assert_eq!(run.summary.by_range[0].scope, "Test Range");

    let model = run.model.as_ref().expect("model was fitted");
    assert_eq!(model.features, vec!["elevation_m", "slope_deg", "forest"]);
    assert_eq!(model.curves, 2);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.output_dir.join(output::RUN_SUMMARY_JSON)).unwrap())
            .unwrap();
    assert_eq!(json["species"], SPECIES);
    assert_eq!(json["zero_filled"], 8);
}

#[test]
fn test_analysis_table_resummarizes() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let run = run_pipeline(&config, RunOptions::default()).unwrap();

    let table = read_analysis(&config.output_dir.join(output::ANALYSIS_CSV)).unwrap();
    assert_eq!(table.records.len(), run.join.joined);
    assert_eq!(table.covariate_names, vec!["forest".to_string()]);
    assert!(table
        .records
        .iter()
        .all(|r| (r.covariates[0].unwrap() - 0.4).abs() < 1e-6));

    let summary = summarize_table(&table, config.analysis.bin_width_m).unwrap();
    assert_eq!(summary, run.summary);
}

#[test]
fn test_rerun_reuses_cache_and_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let analysis = config.output_dir.join(output::ANALYSIS_CSV);

    let first = run_pipeline(&config, RunOptions::default()).unwrap();
    let first_table = std::fs::read_to_string(&analysis).unwrap();
    let first_shifts = std::fs::read_to_string(config.output_dir.join(output::RANGE_SHIFT_CSV)).unwrap();

    let second = run_pipeline(&config, RunOptions::default()).unwrap();
    assert!(second.records.is_none(), "zero-filled records should be reused");
    assert_eq!(second.zero_filled, first.zero_filled);
    assert_eq!(std::fs::read_to_string(&analysis).unwrap(), first_table);
    assert_eq!(
        std::fs::read_to_string(config.output_dir.join(output::RANGE_SHIFT_CSV)).unwrap(),
        first_shifts
    );

    let forced = run_pipeline(
        &config,
        RunOptions {
            force: true,
            seed_override: Some(99),
        },
    )
    .unwrap();
    assert!(forced.records.is_some());
    assert_eq!(forced.seed, 99);
    // Subsampling picks different members but keeps one per group.
    assert_eq!(forced.subsampled, first.subsampled);
}

#[test]
fn test_empty_cache_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let cache = config.output_dir.join(output::ZERO_FILLED_CSV);

    // A run for a species without complete checklists leaves an empty cache.
    std::fs::create_dir_all(&config.output_dir).unwrap();
    elevrange_records::write_zero_filled(&cache, &[]).unwrap();
    assert!(elevrange_records::read_zero_filled(&cache).unwrap().is_empty());

    let run = run_pipeline(&config, RunOptions::default()).unwrap();
    assert!(run.records.is_some(), "empty cache should be rebuilt");
    assert_eq!(run.zero_filled, 8);
    assert_eq!(run.detections, 4);
    assert_eq!(elevrange_records::read_zero_filled(&cache).unwrap().len(), 8);
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    std::fs::remove_file(dir.path().join("elevation.tif")).unwrap();
    let result = run_pipeline(
        &config,
        RunOptions {
            force: true,
            seed_override: None,
        },
    );
    assert!(result.is_err());
}
