//! # elevrange-runner
//!
//! Runs the elevational range analysis end to end and writes the tables
//! behind each figure:
//!
//! - [`run_pipeline`] zero-fills, subsamples and joins the records, then
//!   summarizes them, fits the partial-dependence curves and runs the
//!   simulations.
//! - [`run_simulation`] runs only the simulations.
//! - [`summarize_table`] recomputes statistics from an existing
//!   `analysis.csv` (see [`output::read_analysis`]).
//!
//! Runs are configured with a YAML [`PipelineConfig`]. All randomness comes
//! from `ChaCha8Rng` generators seeded from the configured seed.

pub mod config;
mod error;
pub mod join;
pub mod output;
pub mod pipeline;
pub mod simulate;
pub mod summary;

pub use config::{PipelineConfig, DEFAULT_BIN_WIDTH_M, DEFAULT_HEX_SPACING_KM, DEFAULT_SEED};
pub use error::PipelineError;
pub use join::{AnalysisRecord, AnalysisTable, JoinReport};
pub use output::OutputFiles;
pub use pipeline::{run_pipeline, RunOptions, RunSummary};
pub use simulate::{run_simulation, SimulationResults};
pub use summary::{summarize_table, TableSummary};
