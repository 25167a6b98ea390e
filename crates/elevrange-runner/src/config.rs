//! Pipeline configuration loaded from YAML.
//!
//! Every analysis parameter has a default, so a minimal file only names the
//! species and input files. Relative paths are resolved against the
//! directory containing the configuration file.

use crate::PipelineError;
use elevrange_dem::{Sampling, TileBounds};
use elevrange_geo::RangeLayerConfig;
use elevrange_records::ChecklistFilter;
use elevrange_stats::{RangeDistribution, ShiftScenario};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default seed for every random draw in a run.
pub const DEFAULT_SEED: u64 = 1;
/// Default hexagon center spacing for subsampling.
pub const DEFAULT_HEX_SPACING_KM: f64 = 3.0;
/// Default elevation bin width for encounter rates.
pub const DEFAULT_BIN_WIDTH_M: f64 = 50.0;

/// Top-level configuration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Scientific name of the target species.
    #[serde(default)]
    pub species: String,
    /// Input files. Not needed for simulation-only runs.
    #[serde(default)]
    pub inputs: Option<InputPaths>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub filter: ChecklistFilter,
    #[serde(default)]
    pub ranges: RangeLayerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Locations of the input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    /// Tab-delimited observation (detection) records.
    pub observations: PathBuf,
    /// Tab-delimited sampling-event (checklist) records.
    pub sampling: PathBuf,
    /// Elevation GeoTIFF.
    pub elevation: PathBuf,
    /// GeoJSON FeatureCollection of mountain ranges.
    #[serde(default)]
    pub mountain_ranges: Option<PathBuf>,
    /// Additional rasters sampled at every record, such as land cover.
    #[serde(default)]
    pub covariates: Vec<CovariateInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CovariateInput {
    /// Column name in the analysis table.
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub hex_spacing_km: f64,
    pub bin_width_m: f64,
    /// Crop the elevation raster to this region before deriving terrain.
    pub crop: Option<TileBounds>,
    /// Elevation sampling method.
    pub sampling: Sampling,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hex_spacing_km: DEFAULT_HEX_SPACING_KM,
            bin_width_m: DEFAULT_BIN_WIDTH_M,
            crop: None,
            sampling: Sampling::default(),
        }
    }
}

/// Sample-size sensitivity of the partial-dependence curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub enabled: bool,
    /// Neighbours used by the built-in model.
    pub k: usize,
    pub sample_sizes: Vec<usize>,
    pub replicates: usize,
    /// Points on the elevation grid.
    pub grid_steps: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            k: 15,
            sample_sizes: vec![50, 100, 250, 500, 1000],
            replicates: 10,
            grid_steps: 50,
        }
    }
}

/// Elevations at which simulated densities are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub min_m: f64,
    pub max_m: f64,
    pub steps: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_m: 0.0,
            max_m: 3000.0,
            steps: 301,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Before/after pairs used for range-shift estimates.
    pub scenarios: Vec<ShiftScenario>,
    /// Elevations drawn per period in each scenario.
    pub shift_sample_size: usize,
    /// Sample sizes for the range-extent experiment.
    pub sample_sizes: Vec<usize>,
    pub replicates: usize,
    /// Distribution sampled in the range-extent experiment.
    pub reference: RangeDistribution,
    pub grid: GridConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let baseline = RangeDistribution::Normal { mean: 1500.0, sd: 300.0 };
        Self {
            scenarios: vec![
                ShiftScenario {
                    name: "shift_upslope".to_string(),
                    before: baseline,
                    after: RangeDistribution::Normal { mean: 1700.0, sd: 300.0 },
                },
                ShiftScenario {
                    name: "expand_upper_edge".to_string(),
                    before: baseline,
                    after: RangeDistribution::SkewNormal {
                        location: 1300.0,
                        scale: 450.0,
                        shape: 3.0,
                    },
                },
                ShiftScenario {
                    name: "contract_lower_edge".to_string(),
                    before: baseline,
                    after: RangeDistribution::SkewNormal {
                        location: 1900.0,
                        scale: 400.0,
                        shape: -3.0,
                    },
                },
            ],
            shift_sample_size: 200,
            sample_sizes: vec![10, 25, 50, 100, 250, 500, 1000],
            replicates: 100,
            reference: baseline,
            grid: GridConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from YAML text. Paths are left as written.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and resolve its relative paths.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&yaml)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output_dir);
        if let Some(inputs) = &mut self.inputs {
            resolve(&mut inputs.observations);
            resolve(&mut inputs.sampling);
            resolve(&mut inputs.elevation);
            if let Some(ranges) = &mut inputs.mountain_ranges {
                resolve(ranges);
            }
            for covariate in &mut inputs.covariates {
                resolve(&mut covariate.path);
            }
        }
    }

    /// Check parameter ranges shared by every command.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let err = |msg: String| Err(PipelineError::ConfigError(msg));

        if !(self.analysis.hex_spacing_km.is_finite() && self.analysis.hex_spacing_km > 0.0) {
            return err(format!("hex_spacing_km must be positive, got {}", self.analysis.hex_spacing_km));
        }
        if !(self.analysis.bin_width_m.is_finite() && self.analysis.bin_width_m > 0.0) {
            return err(format!("bin_width_m must be positive, got {}", self.analysis.bin_width_m));
        }
        if self.model.enabled && (self.model.k == 0 || self.model.grid_steps < 2) {
            return err("model.k must be >= 1 and model.grid_steps >= 2".to_string());
        }
        if self.simulation.replicates == 0 || self.simulation.shift_sample_size == 0 {
            return err("simulation replicates and shift_sample_size must be >= 1".to_string());
        }
        let grid = &self.simulation.grid;
        if grid.steps < 2 || grid.max_m <= grid.min_m {
            return err("simulation.grid needs steps >= 2 and max_m > min_m".to_string());
        }
        for month in &self.filter.months {
            if !(1..=12).contains(month) {
                return err(format!("filter month {} is not in 1..=12", month));
            }
        }
        for scenario in &self.simulation.scenarios {
            scenario.before.validate()?;
            scenario.after.validate()?;
        }
        self.simulation.reference.validate()?;
        Ok(())
    }

    /// Inputs needed by a full run, with the species checked.
    pub fn require_inputs(&self) -> Result<&InputPaths, PipelineError> {
        if self.species.trim().is_empty() {
            return Err(PipelineError::ConfigError("species is required".to_string()));
        }
        self.inputs
            .as_ref()
            .ok_or_else(|| PipelineError::ConfigError("inputs are required for a full run".to_string()))
    }
}
