//! Checklist and observation record types.
//!
//! This module provides:
//! - [`Protocol`] - The sampling protocol of a checklist
//! - [`Checklist`] - A validated sampling event
//! - [`Observation`] - A validated species report on a checklist
//! - [`RawChecklistRow`] / [`RawObservationRow`] - Rows exactly as read from disk
//!
//! Raw rows keep every field as an optional string. Conversion to the
//! validated types happens in [`crate::validate`].

use crate::RecordsError;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ============================================================================
// Protocol
// ============================================================================

/// Sampling protocol of a checklist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Observer stayed at a single location.
    Stationary,
    /// Observer moved along a route.
    Traveling,
    /// Observer searched a defined area.
    Area,
    /// Birds noted while doing something else.
    Incidental,
    /// Historical record without full effort data.
    Historical,
    /// Any other protocol name, kept verbatim.
    Other(String),
}

impl Protocol {
    /// Canonical name as it appears in eBird data files.
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Stationary => "Stationary",
            Protocol::Traveling => "Traveling",
            Protocol::Area => "Area",
            Protocol::Incidental => "Incidental",
            Protocol::Historical => "Historical",
            Protocol::Other(name) => name,
        }
    }

    /// Whether a checklist with this protocol involves no movement.
    pub fn is_stationary(&self) -> bool {
        matches!(self, Protocol::Stationary)
    }
}

impl FromStr for Protocol {
    type Err = RecordsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RecordsError::InvalidProtocol(s.to_string()));
        }
        // eBird uses both "Stationary" and "eBird - Stationary Count" styles.
        let lower = s.to_ascii_lowercase();
        let protocol = if lower.contains("stationary") {
            Protocol::Stationary
        } else if lower.contains("traveling") || lower.contains("travelling") {
            Protocol::Traveling
        } else if lower.contains("area") {
            Protocol::Area
        } else if lower.contains("incidental") || lower.contains("casual") {
            Protocol::Incidental
        } else if lower.contains("historical") {
            Protocol::Historical
        } else {
            Protocol::Other(s.to_string())
        };
        Ok(protocol)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Protocol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Validated Records
// ============================================================================

/// A validated sampling event (one checklist).
#[derive(Debug, Clone, PartialEq)]
pub struct Checklist {
    /// Unique checklist identifier (`S12345678`).
    pub checklist_id: String,
    /// Group identifier shared by checklists submitted by a birding party.
    pub group_id: Option<String>,
    /// Observer identifier.
    pub observer_id: Option<String>,
    /// State or province code (`US-CO`).
    pub state_code: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Local date of the checklist.
    pub observation_date: NaiveDate,
    /// Local start time, if recorded.
    pub time_started: Option<NaiveTime>,
    /// Sampling protocol.
    pub protocol: Protocol,
    /// Checklist duration in minutes.
    pub duration_minutes: Option<f64>,
    /// Distance travelled in kilometres.
    pub effort_distance_km: Option<f64>,
    /// Number of observers in the party.
    pub number_observers: Option<u32>,
    /// Whether the observer reported every species detected.
    pub all_species_reported: bool,
}

impl Checklist {
    /// Effort distance with stationary checklists counted as zero.
    pub fn effective_distance_km(&self) -> Option<f64> {
        if self.protocol.is_stationary() {
            Some(0.0)
        } else {
            self.effort_distance_km
        }
    }
}

/// Number of individuals reported for a species on a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationCount {
    /// Species was present but not counted (`X` in eBird files).
    Present,
    /// Exact count.
    Count(u32),
}

impl ObservationCount {
    /// Numeric count, if one was recorded.
    pub fn count(&self) -> Option<u32> {
        match self {
            ObservationCount::Present => None,
            ObservationCount::Count(n) => Some(*n),
        }
    }
}

/// A validated species report.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Checklist this report belongs to.
    pub checklist_id: String,
    /// Scientific name of the species.
    pub scientific_name: String,
    /// English common name.
    pub common_name: Option<String>,
    /// Reported count.
    pub count: ObservationCount,
}

// ============================================================================
// Raw Rows
// ============================================================================

/// A sampling-event row as read from an eBird-style tab-delimited file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChecklistRow {
    #[serde(rename = "SAMPLING EVENT IDENTIFIER", default)]
    pub checklist_id: Option<String>,
    #[serde(rename = "GROUP IDENTIFIER", default)]
    pub group_id: Option<String>,
    #[serde(rename = "OBSERVER ID", default)]
    pub observer_id: Option<String>,
    #[serde(rename = "STATE CODE", default)]
    pub state_code: Option<String>,
    #[serde(rename = "LATITUDE", default)]
    pub latitude: Option<String>,
    #[serde(rename = "LONGITUDE", default)]
    pub longitude: Option<String>,
    #[serde(rename = "OBSERVATION DATE", default)]
    pub observation_date: Option<String>,
    #[serde(rename = "TIME OBSERVATIONS STARTED", default)]
    pub time_started: Option<String>,
    #[serde(rename = "PROTOCOL TYPE", default)]
    pub protocol: Option<String>,
    #[serde(rename = "DURATION MINUTES", default)]
    pub duration_minutes: Option<String>,
    #[serde(rename = "EFFORT DISTANCE KM", default)]
    pub effort_distance_km: Option<String>,
    #[serde(rename = "NUMBER OBSERVERS", default)]
    pub number_observers: Option<String>,
    #[serde(rename = "ALL SPECIES REPORTED", default)]
    pub all_species_reported: Option<String>,
}

/// An observation row as read from an eBird-style tab-delimited file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObservationRow {
    #[serde(rename = "SAMPLING EVENT IDENTIFIER", default)]
    pub checklist_id: Option<String>,
    #[serde(rename = "SCIENTIFIC NAME", default)]
    pub scientific_name: Option<String>,
    #[serde(rename = "COMMON NAME", default)]
    pub common_name: Option<String>,
    #[serde(rename = "OBSERVATION COUNT", default)]
    pub observation_count: Option<String>,
}
