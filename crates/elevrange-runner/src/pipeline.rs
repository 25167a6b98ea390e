//! The full analysis run, from raw records to summary tables.
//!
//! Stages run in order and each one reads only the output of the previous
//! one:
//!
//! 1. zero-filled records (read from `zero_filled.csv` unless forced)
//! 2. spatial-temporal subsampling on a hexagonal grid
//! 3. terrain, mountain range and covariate join
//! 4. elevation summaries and encounter rates
//! 5. partial-dependence sample-size sensitivity
//! 6. range-shift simulations
//!
//! Every stage records its wall time in
//! [`STAGE_DURATION`](elevrange_metrics::metric_defs::STAGE_DURATION).

use crate::config::{InputPaths, ModelConfig, PipelineConfig};
use crate::join::{AnalysisTable, CovariateLayer, JoinLayers, JoinReport};
use crate::output::{self, OutputFiles};
use crate::simulate::run_simulation;
use crate::summary::{summarize_table, TableSummary};
use crate::PipelineError;
use chrono::{DateTime, Utc};
use elevrange_dem::{RasterTile, TerrainModel};
use elevrange_geo::{HexGrid, MountainRanges};
use elevrange_metrics::{metric_defs, StageLabels};
use elevrange_records::{
    collapse_shared_checklists, read_checklists, read_observations, read_zero_filled,
    write_zero_filled, zero_fill, FilterReport, ValidationReport, ZeroFilledRecord,
};
use elevrange_stats::{
    elevation_grid, sample_size_sensitivity, subsample, FeatureMatrix, KnnRegressor,
    SensitivityCurve, ShiftEstimate, SubsampleKey,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line overrides of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Rebuild `zero_filled.csv` even if it exists.
    pub force: bool,
    pub seed_override: Option<u64>,
}

/// Row counts from reading, validating and filtering the raw files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordCounts {
    pub sampling: ValidationReport,
    pub observations: ValidationReport,
    pub filter: FilterReport,
    /// Group checklists removed as duplicates.
    pub shared_removed: usize,
}

/// What the model stage fitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub features: Vec<String>,
    pub rows: usize,
    /// Rows left out for a missing covariate.
    pub skipped_rows: usize,
    pub grid_min_m: f64,
    pub grid_max_m: f64,
    pub curves: usize,
}

/// Everything a run produced, written to `run_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub species: String,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when zero-filled records were reused.
    pub records: Option<RecordCounts>,
    pub zero_filled: usize,
    pub detections: usize,
    pub subsampled: usize,
    pub join: JoinReport,
    pub summary: TableSummary,
    pub model: Option<ModelSummary>,
    pub shifts: Vec<ShiftEstimate>,
    pub outputs: Vec<PathBuf>,
}

/// Run `f` as a named stage, recording its wall time.
fn stage<T>(
    labels: &StageLabels,
    name: &str,
    f: impl FnOnce(&StageLabels) -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let labels = labels.stage(name);
    let start = Instant::now();
    tracing::debug!(stage = name, "Starting stage");
    let result = f(&labels);
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!(metric_defs::STAGE_DURATION.name, &labels.to_labels()).record(elapsed_ms);
    tracing::debug!(stage = name, elapsed_ms, ok = result.is_ok(), "Finished stage");
    result
}

fn record_dropped<'a, I>(labels: &StageLabels, reasons: I)
where
    I: IntoIterator<Item = (&'a str, usize)>,
{
    for (reason, count) in reasons {
        metrics::counter!(
            metric_defs::RECORDS_DROPPED.name,
            &labels.with(&[("reason", reason.to_string())])
        )
        .increment(count as u64);
    }
}

/// Whether cached records belong to `species`. An empty cache carries no
/// species and is never reused.
fn matches_species(records: &[ZeroFilledRecord], species: &str) -> bool {
    !records.is_empty()
        && records
            .iter()
            .all(|r| r.scientific_name.eq_ignore_ascii_case(species.trim()))
}

/// Read, validate, filter and zero-fill the raw records.
fn build_zero_filled(
    config: &PipelineConfig,
    inputs: &InputPaths,
    labels: &StageLabels,
) -> Result<(Vec<ZeroFilledRecord>, RecordCounts), PipelineError> {
    let (checklists, sampling) = read_checklists(&inputs.sampling)?;
    let (observations, observation_report) =
        read_observations(&inputs.observations, Some(config.species.as_str()))?;

    let read = labels.stage("read");
    metrics::counter!(metric_defs::RECORDS_READ.name, &read.stage("sampling").to_labels())
        .increment(sampling.total() as u64);
    metrics::counter!(metric_defs::RECORDS_READ.name, &read.stage("observations").to_labels())
        .increment(observation_report.total() as u64);
    let validate = labels.stage("validate");
    record_dropped(&validate, sampling.rejected.iter().map(|(k, v)| (*k, *v)));
    record_dropped(&validate, observation_report.rejected.iter().map(|(k, v)| (*k, *v)));

    let (checklists, filter) = config.filter.apply(checklists);
    record_dropped(&labels.stage("filter"), filter.excluded.iter().map(|(k, v)| (*k, *v)));

    let checklists = collapse_shared_checklists(checklists);
    let shared_removed = checklists.removed();
    record_dropped(&labels.stage("collapse"), [("shared_checklist", shared_removed)]);

    let records = zero_fill(&checklists, &observations, &config.species)?;
    Ok((
        records,
        RecordCounts {
            sampling,
            observations: observation_report,
            filter,
            shared_removed,
        },
    ))
}

/// Zero-filled records, reused from `path` unless `force` is set.
fn zero_filled_records(
    config: &PipelineConfig,
    inputs: &InputPaths,
    path: &Path,
    force: bool,
    labels: &StageLabels,
) -> Result<(Vec<ZeroFilledRecord>, Option<RecordCounts>), PipelineError> {
    if !force && path.exists() {
        let records = read_zero_filled(path)?;
        if matches_species(&records, &config.species) {
            tracing::info!(path = %path.display(), records = records.len(), "Reusing zero-filled records");
            return Ok((records, None));
        }
        tracing::warn!(path = %path.display(), "Cached records are empty or for another species; rebuilding");
    }

    let (records, counts) = build_zero_filled(config, inputs, labels)?;
    write_zero_filled(path, &records)?;
    Ok((records, Some(counts)))
}

/// Load the elevation raster, optionally cropped, and derive terrain.
fn load_terrain(config: &PipelineConfig, inputs: &InputPaths) -> Result<TerrainModel, PipelineError> {
    let mut elevation = RasterTile::from_geotiff(&inputs.elevation)?;
    if let Some(region) = &config.analysis.crop {
        elevation = elevation.crop(region)?;
        tracing::info!(dimensions = ?elevation.dimensions(), "Cropped elevation raster");
    }
    Ok(TerrainModel::new(elevation)?.with_sampling(config.analysis.sampling))
}

fn load_covariates(inputs: &InputPaths) -> Result<Vec<CovariateLayer>, PipelineError> {
    inputs
        .covariates
        .iter()
        .map(|c| {
            Ok::<_, PipelineError>(CovariateLayer {
                name: c.name.clone(),
                raster: RasterTile::from_geotiff(&c.path)?,
            })
        })
        .collect()
}

/// Fit the partial-dependence curves of encounter rate on elevation.
///
/// Features are elevation, slope and every covariate. Rows with a missing
/// covariate are left out. Returns `None` when no row is usable.
pub fn model_curves<R: Rng + ?Sized>(
    config: &ModelConfig,
    table: &AnalysisTable,
    rng: &mut R,
) -> Result<Option<(ModelSummary, Vec<SensitivityCurve>)>, PipelineError> {
    let mut names = vec!["elevation_m".to_string(), "slope_deg".to_string()];
    names.extend(table.covariate_names.iter().cloned());
    let mut features = FeatureMatrix::new(names);
    let mut response = Vec::with_capacity(table.records.len());
    let mut skipped_rows = 0;

    for record in &table.records {
        let Some(covariates) = record.covariates.iter().copied().collect::<Option<Vec<f64>>>() else {
            skipped_rows += 1;
            continue;
        };
        let mut row = vec![record.elevation_m, record.slope_deg];
        row.extend(covariates);
        features.push_row(row)?;
        response.push(if record.species_detected { 1.0 } else { 0.0 });
    }

    if features.n_rows() == 0 {
        tracing::warn!(skipped_rows, "No complete rows for the model");
        return Ok(None);
    }

    let elevation = features.column_index("elevation_m")?;
    let (grid_min_m, grid_max_m) = features
        .rows()
        .map(|r| r[elevation])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| (lo.min(e), hi.max(e)));
    let grid = elevation_grid(grid_min_m, grid_max_m, config.grid_steps);

    let curves = sample_size_sensitivity(
        &KnnRegressor { k: config.k },
        &features,
        &response,
        elevation,
        &grid,
        &config.sample_sizes,
        config.replicates,
        rng,
    )?;

    tracing::info!(
        rows = features.n_rows(),
        skipped_rows,
        curves = curves.len(),
        "Fitted partial-dependence curves"
    );

    Ok(Some((
        ModelSummary {
            features: features.names().to_vec(),
            rows: features.n_rows(),
            skipped_rows,
            grid_min_m,
            grid_max_m,
            curves: curves.len(),
        },
        curves,
    )))
}

/// Write the summary tables of an analysis table.
pub fn write_table_summary(summary: &TableSummary, files: &mut OutputFiles) -> Result<(), PipelineError> {
    output::write_summaries(&files.record(output::SUMMARY_CSV), [&summary.overall])?;
    output::write_summaries(&files.record(output::SUMMARY_BY_RANGE_CSV), summary.range_rows())?;
    output::write_rows(&files.record(output::ENCOUNTER_RATE_CSV), &summary.encounter_rates)?;
    Ok(())
}

/// Run the whole analysis for one species.
pub fn run_pipeline(config: &PipelineConfig, options: RunOptions) -> Result<RunSummary, PipelineError> {
    let started_at = Utc::now();
    let inputs = config.require_inputs()?;
    let seed = options.seed_override.unwrap_or(config.seed);
    let labels = StageLabels::new(config.species.as_str(), "run");
    let mut files = OutputFiles::new(&config.output_dir);

    tracing::info!(
        species = %config.species,
        seed,
        output_dir = %config.output_dir.display(),
        "Starting run"
    );

    let zero_filled_path = files.record(output::ZERO_FILLED_CSV);
    let (records, counts) = stage(&labels, "zero_fill", |l| {
        zero_filled_records(config, inputs, &zero_filled_path, options.force, l)
    })?;
    let zero_filled = records.len();
    let detections = records.iter().filter(|r| r.species_detected).count();
    metrics::gauge!(metric_defs::ZERO_FILLED.name, &labels.stage("zero_fill").to_labels())
        .set(zero_filled as f64);
    tracing::info!(zero_filled, detections, "Zero-filled records ready");

    let grid = HexGrid::new(config.analysis.hex_spacing_km)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let records = stage(&labels, "dedup", |l| {
        let kept = subsample(
            records,
            |r: &ZeroFilledRecord| SubsampleKey {
                detected: r.species_detected,
                year: r.year,
                week: r.week,
                cell: grid.cell(r.longitude, r.latitude),
            },
            &mut rng,
        );
        metrics::gauge!(metric_defs::DEDUP_KEPT.name, &l.to_labels()).set(kept.len() as f64);
        Ok(kept)
    })?;
    let subsampled = records.len();

    let (table, join) = stage(&labels, "join", |l| {
        let terrain = load_terrain(config, inputs)?;
        let ranges = inputs
            .mountain_ranges
            .as_ref()
            .map(|path| MountainRanges::from_geojson_path(path, &config.ranges))
            .transpose()?;
        let covariates = load_covariates(inputs)?;
        let layers = JoinLayers {
            terrain: &terrain,
            ranges: ranges.as_ref(),
            covariates: &covariates,
        };
        let (table, report) = layers.join_all(records, |r| grid.cell(r.longitude, r.latitude))?;

        record_dropped(
            l,
            [
                ("outside_raster", report.outside_raster),
                ("no_elevation", report.no_elevation),
            ],
        );
        metrics::counter!(metric_defs::RANGE_MISSES.name, &l.to_labels())
            .increment(report.outside_ranges as u64);
        metrics::gauge!(metric_defs::ANALYSIS_ROWS.name, &l.to_labels()).set(table.records.len() as f64);
        Ok((table, report))
    })?;
    output::write_analysis(&files.record(output::ANALYSIS_CSV), &table)?;

    let summary = stage(&labels, "summarize", |_| {
        let summary = summarize_table(&table, config.analysis.bin_width_m)?;
        write_table_summary(&summary, &mut files)?;
        Ok(summary)
    })?;

    let model = if config.model.enabled {
        stage(&labels, "model", |_| {
            let fitted = model_curves(&config.model, &table, &mut rng)?;
            if let Some((_, curves)) = &fitted {
                output::write_partial_dependence(&files.record(output::PARTIAL_DEPENDENCE_CSV), curves)?;
            }
            Ok(fitted.map(|(summary, _)| summary))
        })?
    } else {
        tracing::info!("Model stage disabled");
        None
    };

    let simulation = stage(&labels, "simulate", |_| run_simulation(&config.simulation, seed, &mut files))?;

    let summary_path = files.record(output::RUN_SUMMARY_JSON);
    let run = RunSummary {
        species: config.species.clone(),
        seed,
        started_at,
        finished_at: Utc::now(),
        records: counts,
        zero_filled,
        detections,
        subsampled,
        join,
        summary,
        model,
        shifts: simulation.shifts,
        outputs: files.written().to_vec(),
    };
    output::write_json(&summary_path, &run)?;

    tracing::info!(
        outputs = run.outputs.len(),
        elapsed_s = (run.finished_at - started_at).num_milliseconds() as f64 / 1000.0,
        "Run complete"
    );
    Ok(run)
}
