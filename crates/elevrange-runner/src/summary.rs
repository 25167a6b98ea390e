//! Elevational summaries of an analysis table, overall and per mountain range.

use crate::join::{AnalysisRecord, AnalysisTable};
use crate::PipelineError;
use elevrange_stats::{circular_mean_deg, encounter_rate_bins, ElevationSummary, EncounterRateBin};
use serde::Serialize;
use std::collections::BTreeMap;

/// Scope label for records that fall outside every mountain range.
pub const OUTSIDE_RANGES: &str = "outside_ranges";

/// Summary of one group of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeSummary {
    /// `all`, a range name, or [`OUTSIDE_RANGES`].
    pub scope: String,
    pub records: usize,
    pub detections: usize,
    /// Detected elevations; `None` when nothing was detected.
    pub elevation: Option<ElevationSummary>,
    /// Circular mean aspect of detections on sloped cells.
    pub aspect_mean_deg: Option<f64>,
}

impl ScopeSummary {
    fn from_records(scope: impl Into<String>, records: &[&AnalysisRecord]) -> Self {
        Self {
            scope: scope.into(),
            records: records.len(),
            detections: records.iter().filter(|r| r.species_detected).count(),
            elevation: ElevationSummary::from_records(records),
            aspect_mean_deg: circular_mean_deg(
                records
                    .iter()
                    .filter(|r| r.species_detected)
                    .filter_map(|r| r.aspect_deg),
            ),
        }
    }
}

/// Everything computed from an analysis table without a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub overall: ScopeSummary,
    /// Named ranges in name order.
    pub by_range: Vec<ScopeSummary>,
    /// Records outside every range, if any.
    pub outside_ranges: Option<ScopeSummary>,
    pub encounter_rates: Vec<EncounterRateBin>,
}

impl TableSummary {
    /// Per-range rows followed by the outside-ranges row.
    pub fn range_rows(&self) -> impl Iterator<Item = &ScopeSummary> {
        self.by_range.iter().chain(self.outside_ranges.iter())
    }
}

/// Summarize detected elevations and encounter rates of a table.
pub fn summarize_table(table: &AnalysisTable, bin_width_m: f64) -> Result<TableSummary, PipelineError> {
    let all: Vec<&AnalysisRecord> = table.records.iter().collect();
    let overall = ScopeSummary::from_records("all", &all);

    let mut groups: BTreeMap<Option<&str>, Vec<&AnalysisRecord>> = BTreeMap::new();
    for record in &table.records {
        groups.entry(record.mountain_range.as_deref()).or_default().push(record);
    }
    let outside_ranges = groups
        .remove(&None)
        .map(|records| ScopeSummary::from_records(OUTSIDE_RANGES, &records));
    let by_range = groups
        .into_iter()
        .filter_map(|(name, records)| name.map(|n| ScopeSummary::from_records(n, &records)))
        .collect();

    let encounter_rates = encounter_rate_bins(&table.records, bin_width_m)?;

    match &overall.elevation {
        Some(summary) => tracing::info!(
            records = overall.records,
            detections = overall.detections,
            median_m = summary.median,
            p05_m = summary.p05,
            p95_m = summary.p95,
            "Summarized detected elevations"
        ),
        None => tracing::warn!(records = overall.records, "No detections to summarize"),
    }

    Ok(TableSummary {
        overall,
        by_range,
        outside_ranges,
        encounter_rates,
    })
}
