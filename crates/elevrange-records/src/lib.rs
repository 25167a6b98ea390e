//! # elevrange-records
//!
//! Checklist and observation records for elevational range analysis.
//!
//! The crate turns eBird-style sampling-event and observation files into a
//! detection/non-detection table:
//!
//! 1. [`read_checklists`] / [`read_observations`] read tab-delimited files and
//!    run every row through the explicit validation step ([`validate`]).
//! 2. [`ChecklistFilter`] restricts checklists by season, protocol, region
//!    and effort.
//! 3. [`collapse_shared_checklists`] keeps one checklist per group, remembering
//!    which members were merged into it.
//! 4. [`zero_fill`] pairs detections with checklists, adding year, day of
//!    year, calendar week and decimal start hour.
//!
//! ## Example
//!
//! ```no_run
//! use elevrange_records::{
//!     collapse_shared_checklists, read_checklists, read_observations, zero_fill, ChecklistFilter,
//! };
//!
//! let species = "Perisoreus canadensis";
//! let (checklists, _) = read_checklists("ebd_sampling.txt")?;
//! let (observations, _) = read_observations("ebd_observations.txt", Some(species))?;
//!
//! let (checklists, _) = ChecklistFilter::default().apply(checklists);
//! let checklists = collapse_shared_checklists(checklists);
//! let records = zero_fill(&checklists, &observations, species)?;
//! println!("{} checklists, {} detections", records.len(),
//!     records.iter().filter(|r| r.species_detected).count());
//! # Ok::<(), elevrange_records::RecordsError>(())
//! ```

mod checklist;
mod error;
mod filter;
mod io;
pub mod validate;
mod zerofill;

pub use checklist::{
    Checklist, Observation, ObservationCount, Protocol, RawChecklistRow, RawObservationRow,
};
pub use error::RecordsError;
pub use filter::{
    ChecklistFilter, FilterReason, FilterReport, DEFAULT_MAX_DISTANCE_KM,
    DEFAULT_MAX_DURATION_MINUTES, DEFAULT_MAX_OBSERVERS,
};
pub use io::{
    read_checklists, read_checklists_from, read_observations, read_observations_from,
    read_zero_filled, read_zero_filled_from, write_zero_filled, write_zero_filled_to,
};
pub use validate::{ValidationIssue, ValidationReport};
pub use zerofill::{
    calendar_week, collapse_shared_checklists, decimal_hours, zero_fill, CollapsedChecklists,
    ZeroFilledRecord,
};

/// Result type for record operations.
pub type Result<T> = std::result::Result<T, RecordsError>;
