//! Checklist filtering by season, protocol, region and effort.

use crate::checklist::{Checklist, Protocol};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default maximum checklist duration in minutes.
pub const DEFAULT_MAX_DURATION_MINUTES: f64 = 300.0;
/// Default maximum travelled distance in kilometres.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 5.0;
/// Default maximum party size.
pub const DEFAULT_MAX_OBSERVERS: u32 = 10;

/// Criteria a checklist must meet to enter the analysis.
///
/// Empty lists mean "no restriction".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecklistFilter {
    /// Calendar months (1-12) to keep.
    pub months: Vec<u32>,
    /// First year to keep (inclusive).
    pub start_year: Option<i32>,
    /// Last year to keep (inclusive).
    pub end_year: Option<i32>,
    /// Protocols to keep.
    pub protocols: Vec<Protocol>,
    /// State or province codes to keep.
    pub state_codes: Vec<String>,
    /// Maximum duration in minutes.
    pub max_duration_minutes: Option<f64>,
    /// Maximum travelled distance in kilometres.
    pub max_distance_km: Option<f64>,
    /// Maximum number of observers.
    pub max_observers: Option<u32>,
    /// Keep only checklists reporting all species detected.
    pub complete_only: bool,
}

impl Default for ChecklistFilter {
    fn default() -> Self {
        Self {
            months: Vec::new(),
            start_year: None,
            end_year: None,
            protocols: vec![Protocol::Stationary, Protocol::Traveling],
            state_codes: Vec::new(),
            max_duration_minutes: Some(DEFAULT_MAX_DURATION_MINUTES),
            max_distance_km: Some(DEFAULT_MAX_DISTANCE_KM),
            max_observers: Some(DEFAULT_MAX_OBSERVERS),
            complete_only: true,
        }
    }
}

/// Reason a checklist was excluded by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterReason {
    Incomplete,
    OutOfSeason,
    OutOfYearRange,
    Protocol,
    Region,
    Duration,
    Distance,
    Observers,
}

impl FilterReason {
    /// Short machine-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterReason::Incomplete => "incomplete",
            FilterReason::OutOfSeason => "out_of_season",
            FilterReason::OutOfYearRange => "out_of_year_range",
            FilterReason::Protocol => "protocol",
            FilterReason::Region => "region",
            FilterReason::Duration => "duration",
            FilterReason::Distance => "distance",
            FilterReason::Observers => "observers",
        }
    }
}

/// Tally of kept and excluded checklists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub kept: usize,
    pub excluded: BTreeMap<&'static str, usize>,
}

impl FilterReport {
    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

impl ChecklistFilter {
    /// Check a single checklist, returning the first failed criterion.
    pub fn check(&self, checklist: &Checklist) -> Result<(), FilterReason> {
        if self.complete_only && !checklist.all_species_reported {
            return Err(FilterReason::Incomplete);
        }

        let date = checklist.observation_date;
        if !self.months.is_empty() && !self.months.contains(&date.month()) {
            return Err(FilterReason::OutOfSeason);
        }
        if self.start_year.is_some_and(|y| date.year() < y)
            || self.end_year.is_some_and(|y| date.year() > y)
        {
            return Err(FilterReason::OutOfYearRange);
        }

        if !self.protocols.is_empty() && !self.protocols.contains(&checklist.protocol) {
            return Err(FilterReason::Protocol);
        }

        if !self.state_codes.is_empty() {
            let in_region = checklist
                .state_code
                .as_deref()
                .is_some_and(|code| self.state_codes.iter().any(|s| s.eq_ignore_ascii_case(code)));
            if !in_region {
                return Err(FilterReason::Region);
            }
        }

        // Missing effort values fail any configured limit.
        if let Some(max) = self.max_duration_minutes {
            if !checklist.duration_minutes.is_some_and(|d| d <= max) {
                return Err(FilterReason::Duration);
            }
        }
        if let Some(max) = self.max_distance_km {
            if !checklist.effective_distance_km().is_some_and(|d| d <= max) {
                return Err(FilterReason::Distance);
            }
        }
        if let Some(max) = self.max_observers {
            if !checklist.number_observers.is_some_and(|n| n <= max) {
                return Err(FilterReason::Observers);
            }
        }

        Ok(())
    }

    /// Apply the filter to a set of checklists.
    pub fn apply(&self, checklists: Vec<Checklist>) -> (Vec<Checklist>, FilterReport) {
        let mut report = FilterReport::default();
        let kept: Vec<Checklist> = checklists
            .into_iter()
            .filter(|c| match self.check(c) {
                Ok(()) => {
                    report.kept += 1;
                    true
                }
                Err(reason) => {
                    *report.excluded.entry(reason.as_str()).or_default() += 1;
                    false
                }
            })
            .collect();

        tracing::debug!(
            kept = report.kept,
            excluded = report.excluded_total(),
            "Applied checklist filter"
        );
        (kept, report)
    }
}
