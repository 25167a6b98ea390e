//! Zero-filling detection records against checklists.
//!
//! Observation files only contain detections. Pairing them with the complete
//! set of checklists yields a detection/non-detection table: every complete
//! checklist becomes one [`ZeroFilledRecord`] with `species_detected` set if
//! the target species was reported on it.

use crate::checklist::{Checklist, Observation, ObservationCount, Protocol};
use crate::{RecordsError, Result};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One checklist with the target species' detection status and derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroFilledRecord {
    pub checklist_id: String,
    pub observer_id: Option<String>,
    pub state_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub observation_date: NaiveDate,
    pub protocol: Protocol,
    pub duration_minutes: Option<f64>,
    pub effort_distance_km: Option<f64>,
    pub number_observers: Option<u32>,
    pub scientific_name: String,
    pub species_detected: bool,
    /// Individuals counted; empty when not detected or only marked present.
    pub observation_count: Option<u32>,
    pub year: i32,
    pub day_of_year: u32,
    /// Calendar week, `(day_of_year - 1) / 7 + 1`.
    pub week: u32,
    /// Start time as decimal hours since midnight.
    pub hours_of_day: Option<f64>,
}

/// Calendar week of a day of year (1..=53).
pub fn calendar_week(day_of_year: u32) -> u32 {
    (day_of_year.max(1) - 1) / 7 + 1
}

/// Convert a time of day to decimal hours.
pub fn decimal_hours(time: NaiveTime) -> f64 {
    time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0
}

/// Shared checklists reduced to one checklist per birding party.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollapsedChecklists {
    /// Kept checklists, ordered by checklist identifier.
    pub checklists: Vec<Checklist>,
    /// Identifier of each removed group member mapped to the kept one.
    pub merged_into: HashMap<String, String>,
}

impl CollapsedChecklists {
    /// Group members removed as duplicates.
    pub fn removed(&self) -> usize {
        self.merged_into.len()
    }

    /// Identifier of the checklist that stands for `checklist_id`.
    pub fn kept_id<'a>(&'a self, checklist_id: &'a str) -> &'a str {
        self.merged_into
            .get(checklist_id)
            .map(String::as_str)
            .unwrap_or(checklist_id)
    }
}

/// Collapse shared checklists so each birding party contributes once.
///
/// Checklists with the same group identifier are duplicates of one another.
/// The complete member with the lowest checklist identifier is kept (the
/// lowest identifier overall if none is complete), and the others are
/// recorded in [`CollapsedChecklists::merged_into`] so their observations
/// still count. Checklists without a group identifier pass through.
pub fn collapse_shared_checklists(checklists: Vec<Checklist>) -> CollapsedChecklists {
    let before = checklists.len();
    let mut groups: BTreeMap<String, Vec<Checklist>> = BTreeMap::new();
    let mut kept = Vec::new();

    for checklist in checklists {
        match checklist.group_id.clone() {
            None => kept.push(checklist),
            Some(group) => groups.entry(group).or_default().push(checklist),
        }
    }

    let mut merged_into = HashMap::new();
    for (_, mut members) in groups {
        members.sort_by(|a, b| {
            (!a.all_species_reported, &a.checklist_id).cmp(&(!b.all_species_reported, &b.checklist_id))
        });
        let mut members = members.into_iter();
        if let Some(first) = members.next() {
            for member in members {
                merged_into.insert(member.checklist_id, first.checklist_id.clone());
            }
            kept.push(first);
        }
    }
    kept.sort_by(|a, b| a.checklist_id.cmp(&b.checklist_id));

    if !merged_into.is_empty() {
        tracing::debug!(before, after = kept.len(), "Collapsed shared checklists");
    }
    CollapsedChecklists {
        checklists: kept,
        merged_into,
    }
}

/// Aggregated detection of the target species on one checklist.
#[derive(Debug, Clone, Copy)]
struct Detection {
    count: Option<u32>,
}

impl Detection {
    /// Add another report on the same checklist.
    fn add(self, count: ObservationCount) -> Self {
        Detection {
            count: match (self.count, count) {
                (Some(total), ObservationCount::Count(n)) => Some(total.saturating_add(n)),
                _ => None,
            },
        }
    }

    /// Combine with the detection of another member of the same group. The
    /// members saw the same birds, so counts are not summed.
    fn merge(self, other: Detection) -> Self {
        Detection {
            count: match (self.count, other.count) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

/// Build the detection/non-detection table for `species`.
///
/// Only complete checklists are zero-filled; a non-report on an incomplete
/// checklist is not evidence of absence. A report on any member of a shared
/// checklist counts as a detection on the kept member, with the largest
/// member count. Observations referencing unknown checklists are ignored.
/// Multiple reports of the species on one checklist (e.g. subspecies) are
/// summed; any uncounted report makes that checklist's count unknown.
pub fn zero_fill(
    collapsed: &CollapsedChecklists,
    observations: &[Observation],
    species: &str,
) -> Result<Vec<ZeroFilledRecord>> {
    let species = species.trim();
    if species.is_empty() {
        return Err(RecordsError::EmptySpecies);
    }

    let mut per_checklist: HashMap<&str, Detection> = HashMap::new();
    for obs in observations {
        if !obs.scientific_name.eq_ignore_ascii_case(species) {
            continue;
        }
        let entry = per_checklist
            .entry(obs.checklist_id.as_str())
            .or_insert(Detection { count: Some(0) });
        *entry = entry.add(obs.count);
    }

    let mut detections: HashMap<&str, Detection> = HashMap::new();
    for (checklist_id, detection) in per_checklist {
        detections
            .entry(collapsed.kept_id(checklist_id))
            .and_modify(|d| *d = d.merge(detection))
            .or_insert(detection);
    }

    let mut skipped_incomplete = 0usize;
    let records: Vec<ZeroFilledRecord> = collapsed
        .checklists
        .iter()
        .filter(|c| {
            if !c.all_species_reported {
                skipped_incomplete += 1;
            }
            c.all_species_reported
        })
        .map(|c| {
            let detection = detections.get(c.checklist_id.as_str());
            let day_of_year = c.observation_date.ordinal();
            ZeroFilledRecord {
                checklist_id: c.checklist_id.clone(),
                observer_id: c.observer_id.clone(),
                state_code: c.state_code.clone(),
                latitude: c.latitude,
                longitude: c.longitude,
                observation_date: c.observation_date,
                protocol: c.protocol.clone(),
                duration_minutes: c.duration_minutes,
                effort_distance_km: c.effective_distance_km(),
                number_observers: c.number_observers,
                scientific_name: species.to_string(),
                species_detected: detection.is_some(),
                observation_count: detection.and_then(|d| d.count),
                year: c.observation_date.year(),
                day_of_year,
                week: calendar_week(day_of_year),
                hours_of_day: c.time_started.map(decimal_hours),
            }
        })
        .collect();

    let detected = records.iter().filter(|r| r.species_detected).count();
    tracing::info!(
        species,
        checklists = records.len(),
        detected,
        skipped_incomplete,
        "Zero-filled detection records"
    );

    Ok(records)
}
