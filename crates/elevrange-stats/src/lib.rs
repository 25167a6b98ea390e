//! # elevrange-stats
//!
//! Statistics over the analysis table:
//!
//! - [`subsample`]: one record per (detected, year, week, cell) group,
//!   chosen with a caller-supplied RNG.
//! - [`ElevationSummary`] and [`encounter_rate_bins`]: descriptive
//!   statistics of detected elevations and binned encounter rates.
//! - [`partial_dependence`] and [`sample_size_sensitivity`]: model-based
//!   response curves behind the [`Predictor`] / [`Fitter`] seam.
//! - [`simulate_shift`] and [`sample_size_effect`]: synthetic range shifts
//!   from normal and skew-normal distributions.
//!
//! Missing results are `None`, never zero.

mod dedup;
mod error;
mod model;
mod simulate;
mod summary;

pub use dedup::{subsample, SubsampleKey};
pub use error::StatsError;
pub use model::{
    elevation_grid, partial_dependence, sample_size_sensitivity, FeatureMatrix, Fitter, KnnModel,
    KnnRegressor, Predictor, SensitivityCurve,
};
pub use simulate::{
    density_curve, sample_size_effect, simulate_shift, RangeDefinition, RangeDistribution,
    SampleSizeEffect, ShiftEstimate, ShiftScenario,
};
pub use summary::{
    circular_mean_deg, encounter_rate_bins, quantile, ElevationRecord,
    ElevationSummary, EncounterRateBin,
};

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;
