//! Reading and writing record files.
//!
//! Raw eBird-style inputs are tab-delimited with a header row. The derived
//! zero-filled table is written as comma-separated values so it can be
//! reloaded on later runs instead of regenerating it.

use crate::checklist::{Checklist, Observation, RawChecklistRow, RawObservationRow};
use crate::validate::{validate_checklist, validate_observation, ValidationReport};
use crate::zerofill::ZeroFilledRecord;
use crate::Result;
use std::io::{Read, Write};
use std::path::Path;

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Read and validate sampling-event rows from a reader.
pub fn read_checklists_from<R: Read>(reader: R) -> Result<(Vec<Checklist>, ValidationReport)> {
    let mut rdr = tsv_reader(reader);
    let mut report = ValidationReport::default();
    let mut checklists = Vec::new();

    for row in rdr.deserialize::<RawChecklistRow>() {
        let outcome = validate_checklist(&row?);
        report.record(&outcome);
        if let Ok(checklist) = outcome {
            checklists.push(checklist);
        }
    }

    Ok((checklists, report))
}

/// Read and validate sampling-event rows from a file.
pub fn read_checklists<P: AsRef<Path>>(path: P) -> Result<(Vec<Checklist>, ValidationReport)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let (checklists, report) = read_checklists_from(std::io::BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        accepted = report.accepted,
        rejected = report.rejected_total(),
        "Read sampling events"
    );
    Ok((checklists, report))
}

/// Read and validate observation rows from a reader.
///
/// When `species` is given, rows for other species are skipped before
/// validation so that large multi-species files stay cheap.
pub fn read_observations_from<R: Read>(
    reader: R,
    species: Option<&str>,
) -> Result<(Vec<Observation>, ValidationReport)> {
    let mut rdr = tsv_reader(reader);
    let mut report = ValidationReport::default();
    let mut observations = Vec::new();

    for row in rdr.deserialize::<RawObservationRow>() {
        let row = row?;
        if let (Some(target), Some(name)) = (species, row.scientific_name.as_deref()) {
            if !name.trim().eq_ignore_ascii_case(target.trim()) {
                continue;
            }
        }
        let outcome = validate_observation(&row);
        report.record(&outcome);
        if let Ok(observation) = outcome {
            observations.push(observation);
        }
    }

    Ok((observations, report))
}

/// Read and validate observation rows from a file.
pub fn read_observations<P: AsRef<Path>>(
    path: P,
    species: Option<&str>,
) -> Result<(Vec<Observation>, ValidationReport)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let (observations, report) =
        read_observations_from(std::io::BufReader::new(file), species)?;
    tracing::info!(
        path = %path.display(),
        accepted = report.accepted,
        rejected = report.rejected_total(),
        "Read observations"
    );
    Ok((observations, report))
}

/// Write zero-filled records as CSV.
pub fn write_zero_filled_to<W: Write>(writer: W, records: &[ZeroFilledRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write zero-filled records to a CSV file, creating parent directories.
pub fn write_zero_filled<P: AsRef<Path>>(path: P, records: &[ZeroFilledRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_zero_filled_to(std::io::BufWriter::new(file), records)?;
    tracing::info!(path = %path.display(), records = records.len(), "Wrote zero-filled records");
    Ok(())
}

/// Read zero-filled records previously written by [`write_zero_filled`].
pub fn read_zero_filled_from<R: Read>(reader: R) -> Result<Vec<ZeroFilledRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let records = rdr
        .deserialize::<ZeroFilledRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Read zero-filled records from a CSV file.
pub fn read_zero_filled<P: AsRef<Path>>(path: P) -> Result<Vec<ZeroFilledRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    read_zero_filled_from(std::io::BufReader::new(file))
}
