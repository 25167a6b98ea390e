//! Errors that abort a pipeline run.

use elevrange_dem::DemError;
use elevrange_geo::GeoError;
use elevrange_records::RecordsError;
use elevrange_stats::StatsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Record error: {0}")]
    Records(#[from] RecordsError),

    #[error("Raster error: {0}")]
    Dem(#[from] DemError),

    #[error("Mountain range error: {0}")]
    Geo(#[from] GeoError),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed analysis table {path}: {reason}")]
    MalformedTable { path: String, reason: String },
}
