//! Metric declarations for the elevrange pipeline.
//!
//! Every metric the pipeline records is declared once as a structured
//! [`Metric`] constant in [`metric_defs`], so names cannot drift between the
//! recording site and the description registered at startup.
//!
//! # Example
//!
//! ```rust
//! use elevrange_metrics::{describe_metrics, metric_defs, StageLabels};
//!
//! describe_metrics();
//!
//! let labels = StageLabels::new("Perisoreus canadensis", "filter");
//! metrics::counter!(
//!     metric_defs::RECORDS_DROPPED.name,
//!     &labels.with(&[("reason", "duration".to_string())])
//! )
//! .increment(3);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use elevrange_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const ROWS: Metric = Metric::counter("elevrange.rows")
///     .with_description("Rows seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["stage"]);
///
/// assert_eq!(ROWS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metrics recorded by the pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every pipeline metric.
    pub const STAGE_LABELS: &[&str] = &["species", "stage"];

    // ========================================================================
    // Records
    // ========================================================================

    /// Rows read from an input file.
    ///
    /// Labels: species, stage (`sampling` or `observations`)
    pub const RECORDS_READ: Metric = Metric::counter("elevrange.records.read")
        .with_description("Rows read from input files")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Rows or records removed, by reason.
    ///
    /// Labels: species, stage, reason
    pub const RECORDS_DROPPED: Metric = Metric::counter("elevrange.records.dropped")
        .with_description("Rows or records removed by validation, filtering or joins")
        .with_unit(Unit::Count)
        .with_labels(&["species", "stage", "reason"]);

    /// Zero-filled checklists produced.
    pub const ZERO_FILLED: Metric = Metric::gauge("elevrange.records.zero_filled")
        .with_description("Checklists in the zero-filled table")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Records kept after spatial subsampling.
    pub const DEDUP_KEPT: Metric = Metric::gauge("elevrange.dedup.kept")
        .with_description("Records kept after spatial-temporal subsampling")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Rows in the analysis table.
    pub const ANALYSIS_ROWS: Metric = Metric::gauge("elevrange.analysis.rows")
        .with_description("Rows in the analysis table")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Records outside every mountain range.
    pub const RANGE_MISSES: Metric = Metric::counter("elevrange.join.range_misses")
        .with_description("Records not within any mountain range")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Wall time of a pipeline stage.
    pub const STAGE_DURATION: Metric = Metric::histogram("elevrange.stage.duration_ms")
        .with_description("Wall time of a pipeline stage")
        .with_unit(Unit::Milliseconds)
        .with_labels(STAGE_LABELS);

    /// Every metric above, for registration at startup.
    pub const ALL: &[&Metric] = &[
        &RECORDS_READ,
        &RECORDS_DROPPED,
        &ZERO_FILLED,
        &DEDUP_KEPT,
        &ANALYSIS_ROWS,
        &RANGE_MISSES,
        &STAGE_DURATION,
    ];
}

/// Labels identifying the species and pipeline stage a metric belongs to.
#[derive(Debug, Clone)]
pub struct StageLabels {
    pub species: String,
    pub stage: String,
}

impl StageLabels {
    pub fn new(species: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            stage: stage.into(),
        }
    }

    /// Same species, different stage.
    pub fn stage(&self, stage: impl Into<String>) -> Self {
        Self {
            species: self.species.clone(),
            stage: stage.into(),
        }
    }

    /// Label pairs in the form the `metrics` macros accept.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("species", self.species.clone()), ("stage", self.stage.clone())]
    }

    /// Labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        self.to_labels().into_iter().chain(extra.iter().cloned()).collect()
    }
}

/// Describes all pipeline metrics. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
