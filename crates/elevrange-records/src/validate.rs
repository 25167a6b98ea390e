//! Explicit validation of raw rows.
//!
//! Every raw row passes through [`validate_checklist`] or
//! [`validate_observation`] before any filtering or statistics. A row that
//! lacks a required field is rejected with a [`ValidationIssue`]; callers
//! tally the issues in a [`ValidationReport`] instead of silently skipping.

use crate::checklist::{
    Checklist, Observation, ObservationCount, Protocol, RawChecklistRow, RawObservationRow,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// Reason a raw row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationIssue {
    MissingChecklistId,
    MissingCoordinates,
    CoordinatesOutOfRange,
    MissingDate,
    InvalidDate,
    InvalidTime,
    MissingProtocol,
    InvalidNumber(&'static str),
    MissingSpecies,
    InvalidCount,
}

impl ValidationIssue {
    /// Short machine-readable label, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationIssue::MissingChecklistId => "missing_checklist_id",
            ValidationIssue::MissingCoordinates => "missing_coordinates",
            ValidationIssue::CoordinatesOutOfRange => "coordinates_out_of_range",
            ValidationIssue::MissingDate => "missing_date",
            ValidationIssue::InvalidDate => "invalid_date",
            ValidationIssue::InvalidTime => "invalid_time",
            ValidationIssue::MissingProtocol => "missing_protocol",
            ValidationIssue::InvalidNumber(field) => field,
            ValidationIssue::MissingSpecies => "missing_species",
            ValidationIssue::InvalidCount => "invalid_count",
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::InvalidNumber(field) => write!(f, "invalid number in {}", field),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Tally of accepted and rejected rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Rows that passed validation.
    pub accepted: usize,
    /// Rejected rows keyed by issue label.
    pub rejected: BTreeMap<&'static str, usize>,
}

impl ValidationReport {
    /// Record the outcome of validating one row.
    pub fn record<T>(&mut self, outcome: &Result<T, ValidationIssue>) {
        match outcome {
            Ok(_) => self.accepted += 1,
            Err(issue) => *self.rejected.entry(issue.as_str()).or_default() += 1,
        }
    }

    /// Total number of rejected rows.
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    /// Total number of rows seen.
    pub fn total(&self) -> usize {
        self.accepted + self.rejected_total()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_optional_f64(
    value: &Option<String>,
    field: &'static str,
) -> Result<Option<f64>, ValidationIssue> {
    match non_empty(value) {
        None => Ok(None),
        Some(s) => {
            let v: f64 = s.parse().map_err(|_| ValidationIssue::InvalidNumber(field))?;
            if !v.is_finite() || v < 0.0 {
                return Err(ValidationIssue::InvalidNumber(field));
            }
            Ok(Some(v))
        }
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, ValidationIssue> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| ValidationIssue::InvalidTime)
}

fn parse_flag(value: &Option<String>) -> bool {
    matches!(
        non_empty(value).map(|s| s.to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("t") | Some("yes")
    )
}

/// Validate a sampling-event row.
pub fn validate_checklist(raw: &RawChecklistRow) -> Result<Checklist, ValidationIssue> {
    let checklist_id = non_empty(&raw.checklist_id).ok_or(ValidationIssue::MissingChecklistId)?;

    let (lat, lon) = match (non_empty(&raw.latitude), non_empty(&raw.longitude)) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(ValidationIssue::MissingCoordinates),
    };
    let latitude: f64 = lat
        .parse()
        .map_err(|_| ValidationIssue::InvalidNumber("latitude"))?;
    let longitude: f64 = lon
        .parse()
        .map_err(|_| ValidationIssue::InvalidNumber("longitude"))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationIssue::CoordinatesOutOfRange);
    }

    let date = non_empty(&raw.observation_date).ok_or(ValidationIssue::MissingDate)?;
    let observation_date =
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| ValidationIssue::InvalidDate)?;

    let time_started = non_empty(&raw.time_started).map(parse_time).transpose()?;

    let protocol: Protocol = non_empty(&raw.protocol)
        .ok_or(ValidationIssue::MissingProtocol)?
        .parse()
        .map_err(|_| ValidationIssue::MissingProtocol)?;

    let duration_minutes = parse_optional_f64(&raw.duration_minutes, "duration_minutes")?;
    let effort_distance_km = parse_optional_f64(&raw.effort_distance_km, "effort_distance_km")?;
    let number_observers = match non_empty(&raw.number_observers) {
        None => None,
        Some(s) => Some(
            s.parse::<u32>()
                .map_err(|_| ValidationIssue::InvalidNumber("number_observers"))?,
        ),
    };

    Ok(Checklist {
        checklist_id: checklist_id.to_string(),
        group_id: non_empty(&raw.group_id).map(str::to_string),
        observer_id: non_empty(&raw.observer_id).map(str::to_string),
        state_code: non_empty(&raw.state_code).map(str::to_string),
        latitude,
        longitude,
        observation_date,
        time_started,
        protocol,
        duration_minutes,
        effort_distance_km,
        number_observers,
        all_species_reported: parse_flag(&raw.all_species_reported),
    })
}

/// Validate an observation row.
pub fn validate_observation(raw: &RawObservationRow) -> Result<Observation, ValidationIssue> {
    let checklist_id = non_empty(&raw.checklist_id).ok_or(ValidationIssue::MissingChecklistId)?;
    let scientific_name = non_empty(&raw.scientific_name).ok_or(ValidationIssue::MissingSpecies)?;

    let count = match non_empty(&raw.observation_count) {
        None => ObservationCount::Present,
        Some(s) if s.eq_ignore_ascii_case("x") => ObservationCount::Present,
        Some(s) => ObservationCount::Count(s.parse().map_err(|_| ValidationIssue::InvalidCount)?),
    };

    Ok(Observation {
        checklist_id: checklist_id.to_string(),
        scientific_name: scientific_name.to_string(),
        common_name: non_empty(&raw.common_name).map(str::to_string),
        count,
    })
}
