//! Output tables written to the run's output directory.
//!
//! Most tables are plain `serde` rows. The analysis table has one column per
//! covariate, so it is written and read column by column.

use crate::join::{AnalysisRecord, AnalysisTable};
use crate::summary::ScopeSummary;
use crate::PipelineError;
use chrono::NaiveDate;
use csv::StringRecord;
use elevrange_geo::HexCell;
use elevrange_stats::SensitivityCurve;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ZERO_FILLED_CSV: &str = "zero_filled.csv";
pub const ANALYSIS_CSV: &str = "analysis.csv";
pub const SUMMARY_CSV: &str = "summary.csv";
pub const SUMMARY_BY_RANGE_CSV: &str = "summary_by_range.csv";
pub const ENCOUNTER_RATE_CSV: &str = "encounter_rate.csv";
pub const PARTIAL_DEPENDENCE_CSV: &str = "partial_dependence.csv";
pub const RANGE_SHIFT_CSV: &str = "range_shift.csv";
pub const SAMPLE_SIZE_EFFECT_CSV: &str = "sample_size_effect.csv";
pub const DENSITIES_CSV: &str = "densities.csv";
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";

/// Cell text for a missing summary statistic.
pub const NO_DATA: &str = "no data";

/// Fixed analysis columns, in file order. Covariates follow.
const ANALYSIS_COLUMNS: [&str; 19] = [
    "checklist_id",
    "observer_id",
    "latitude",
    "longitude",
    "observation_date",
    "year",
    "day_of_year",
    "week",
    "hours_of_day",
    "duration_minutes",
    "effort_distance_km",
    "number_observers",
    "species_detected",
    "observation_count",
    "hex_cell",
    "elevation_m",
    "slope_deg",
    "aspect_deg",
    "mountain_range",
];

fn create_file(path: &Path) -> Result<BufWriter<File>, PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

fn opt<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn stat<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| NO_DATA.to_string())
}

/// Write `serde` rows as CSV.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    let mut wtr = csv::Writer::from_writer(create_file(path)?);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Wrote table");
    Ok(())
}

/// Write a value as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let mut file = create_file(path)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

// ============================================================================
// Analysis table
// ============================================================================

/// Write the analysis table. Missing values are empty cells.
pub fn write_analysis_to<W: Write>(writer: W, table: &AnalysisTable) -> Result<(), PipelineError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header: Vec<&str> = ANALYSIS_COLUMNS.to_vec();
    header.extend(table.covariate_names.iter().map(String::as_str));
    wtr.write_record(&header)?;

    for r in &table.records {
        let mut row = vec![
            r.checklist_id.clone(),
            opt(&r.observer_id),
            r.latitude.to_string(),
            r.longitude.to_string(),
            r.observation_date.to_string(),
            r.year.to_string(),
            r.day_of_year.to_string(),
            r.week.to_string(),
            opt(&r.hours_of_day),
            opt(&r.duration_minutes),
            opt(&r.effort_distance_km),
            opt(&r.number_observers),
            r.species_detected.to_string(),
            opt(&r.observation_count),
            r.hex_cell.to_string(),
            r.elevation_m.to_string(),
            r.slope_deg.to_string(),
            opt(&r.aspect_deg),
            opt(&r.mountain_range),
        ];
        row.extend(r.covariates.iter().map(opt));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_analysis(path: &Path, table: &AnalysisTable) -> Result<(), PipelineError> {
    write_analysis_to(create_file(path)?, table)?;
    tracing::info!(path = %path.display(), records = table.records.len(), "Wrote analysis table");
    Ok(())
}

/// Column lookup for one analysis file.
struct AnalysisReader {
    label: String,
    columns: HashMap<String, usize>,
    covariates: Vec<(String, usize)>,
}

impl AnalysisReader {
    fn new(label: String, header: &StringRecord) -> Result<Self, PipelineError> {
        let columns: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        let reader = Self {
            label,
            columns,
            covariates: header
                .iter()
                .enumerate()
                .filter(|(_, name)| !ANALYSIS_COLUMNS.contains(name))
                .map(|(i, name)| (name.to_string(), i))
                .collect(),
        };
        if let Some(missing) = ANALYSIS_COLUMNS.iter().find(|c| !reader.columns.contains_key(**c)) {
            return Err(reader.malformed(format!("missing column '{}'", missing)));
        }
        Ok(reader)
    }

    fn malformed(&self, reason: String) -> PipelineError {
        PipelineError::MalformedTable {
            path: self.label.clone(),
            reason,
        }
    }

    fn cell<'r>(&self, row: &'r StringRecord, column: &str) -> &'r str {
        self.columns
            .get(column)
            .and_then(|&i| row.get(i))
            .map(str::trim)
            .unwrap_or("")
    }

    fn parse_text<T: FromStr>(&self, text: &str, line: usize, column: &str) -> Result<T, PipelineError> {
        text.parse()
            .map_err(|_| self.malformed(format!("line {}: invalid {} '{}'", line, column, text)))
    }

    fn required<T: FromStr>(&self, row: &StringRecord, line: usize, column: &str) -> Result<T, PipelineError> {
        self.parse_text(self.cell(row, column), line, column)
    }

    fn optional<T: FromStr>(
        &self,
        row: &StringRecord,
        line: usize,
        column: &str,
    ) -> Result<Option<T>, PipelineError> {
        match self.cell(row, column) {
            "" => Ok(None),
            text => self.parse_text(text, line, column).map(Some),
        }
    }

    fn record(&self, row: &StringRecord, line: usize) -> Result<AnalysisRecord, PipelineError> {
        let checklist_id = self.cell(row, "checklist_id");
        if checklist_id.is_empty() {
            return Err(self.malformed(format!("line {}: empty checklist_id", line)));
        }
        let text = |column: &str| Some(self.cell(row, column).to_string()).filter(|s| !s.is_empty());

        let mut covariates = Vec::with_capacity(self.covariates.len());
        for (name, index) in &self.covariates {
            covariates.push(match row.get(*index).map(str::trim).unwrap_or("") {
                "" => None,
                value => Some(self.parse_text::<f64>(value, line, name)?),
            });
        }

        Ok(AnalysisRecord {
            checklist_id: checklist_id.to_string(),
            observer_id: text("observer_id"),
            latitude: self.required(row, line, "latitude")?,
            longitude: self.required(row, line, "longitude")?,
            observation_date: self.required::<NaiveDate>(row, line, "observation_date")?,
            year: self.required(row, line, "year")?,
            day_of_year: self.required(row, line, "day_of_year")?,
            week: self.required(row, line, "week")?,
            hours_of_day: self.optional(row, line, "hours_of_day")?,
            duration_minutes: self.optional(row, line, "duration_minutes")?,
            effort_distance_km: self.optional(row, line, "effort_distance_km")?,
            number_observers: self.optional(row, line, "number_observers")?,
            species_detected: self.required(row, line, "species_detected")?,
            observation_count: self.optional(row, line, "observation_count")?,
            hex_cell: self.required::<HexCell>(row, line, "hex_cell")?,
            elevation_m: self.required(row, line, "elevation_m")?,
            slope_deg: self.required(row, line, "slope_deg")?,
            aspect_deg: self.optional(row, line, "aspect_deg")?,
            mountain_range: text("mountain_range"),
            covariates,
        })
    }
}

/// Read an analysis table written by [`write_analysis_to`].
///
/// Columns after the fixed ones are read as covariates. `label` names the
/// source in error messages.
pub fn read_analysis_from<R: Read>(reader: R, label: &str) -> Result<AnalysisTable, PipelineError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let columns = AnalysisReader::new(label.to_string(), rdr.headers()?)?;

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        // Line 1 is the header.
        records.push(columns.record(&row?, i + 2)?);
    }

    Ok(AnalysisTable {
        covariate_names: columns.covariates.into_iter().map(|(name, _)| name).collect(),
        records,
    })
}

pub fn read_analysis(path: &Path) -> Result<AnalysisTable, PipelineError> {
    let file = File::open(path)?;
    let table = read_analysis_from(BufReader::new(file), &path.display().to_string())?;
    tracing::info!(path = %path.display(), records = table.records.len(), "Read analysis table");
    Ok(table)
}

// ============================================================================
// Summary tables
// ============================================================================

/// Write elevation summaries, one row per scope. Missing statistics are
/// written as [`NO_DATA`].
pub fn write_summaries<'a, I>(path: &Path, summaries: I) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = &'a ScopeSummary>,
{
    let mut wtr = csv::Writer::from_writer(create_file(path)?);
    wtr.write_record([
        "scope",
        "records",
        "detections",
        "min_m",
        "p05_m",
        "median_m",
        "mean_m",
        "p95_m",
        "max_m",
        "aspect_mean_deg",
    ])?;
    for s in summaries {
        let e = s.elevation;
        wtr.write_record([
            s.scope.clone(),
            s.records.to_string(),
            s.detections.to_string(),
            stat(e.map(|e| e.min)),
            stat(e.map(|e| e.p05)),
            stat(e.map(|e| e.median)),
            stat(e.map(|e| e.mean)),
            stat(e.map(|e| e.p95)),
            stat(e.map(|e| e.max)),
            stat(s.aspect_mean_deg),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PartialDependenceRow {
    sample_size: usize,
    replicate: usize,
    elevation_m: f64,
    encounter_rate: f64,
}

/// Write partial-dependence curves in long format.
pub fn write_partial_dependence(path: &Path, curves: &[SensitivityCurve]) -> Result<(), PipelineError> {
    let rows: Vec<PartialDependenceRow> = curves
        .iter()
        .flat_map(|c| {
            c.grid.iter().zip(&c.values).map(move |(&elevation_m, &encounter_rate)| {
                PartialDependenceRow {
                    sample_size: c.sample_size,
                    replicate: c.replicate,
                    elevation_m,
                    encounter_rate,
                }
            })
        })
        .collect();
    write_rows(path, &rows)
}

/// Paths of the files written into an output directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputFiles {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl OutputFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `name` in the output directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Note that `name` was written and return its path.
    pub fn record(&mut self, name: &str) -> PathBuf {
        let path = self.path(name);
        if !self.written.contains(&path) {
            self.written.push(path.clone());
        }
        path
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elevrange_stats::ElevationSummary;

    fn table() -> AnalysisTable {
        let record = AnalysisRecord {
            checklist_id: "S100".to_string(),
            observer_id: Some("obsr7".to_string()),
            latitude: 39.612345,
            longitude: -105.98765,
            observation_date: NaiveDate::from_ymd_opt(2020, 6, 14).unwrap(),
            year: 2020,
            day_of_year: 166,
            week: 24,
            hours_of_day: Some(6.5),
            duration_minutes: Some(45.0),
            effort_distance_km: None,
            number_observers: Some(1),
            species_detected: true,
            observation_count: Some(3),
            hex_cell: HexCell { q: -12, r: 40 },
            elevation_m: 3210.25,
            slope_deg: 12.5,
            aspect_deg: None,
            mountain_range: Some("Front Range, North".to_string()),
            covariates: vec![Some(0.75), None],
        };
        let mut second = record.clone();
        second.checklist_id = "S101".to_string();
        second.observer_id = None;
        second.species_detected = false;
        second.observation_count = None;
        second.aspect_deg = Some(271.5);
        second.mountain_range = None;
        second.covariates = vec![None, Some(3.0)];
        AnalysisTable {
            covariate_names: vec!["forest".to_string(), "landcover".to_string()],
            records: vec![record, second],
        }
    }

    #[test]
    fn test_analysis_table_reads_back() {
        let table = table();
        let mut buf = Vec::new();
        write_analysis_to(&mut buf, &table).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("checklist_id,observer_id,"));
        assert!(text.lines().next().unwrap().ends_with("mountain_range,forest,landcover"));
        // Quoted because of the comma.
        assert!(text.contains("\"Front Range, North\""));

        let back = read_analysis_from(buf.as_slice(), "memory").unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_read_analysis_reports_bad_cells() {
        let table = table();
        let mut buf = Vec::new();
        write_analysis_to(&mut buf, &table).unwrap();
        let text = String::from_utf8(buf).unwrap().replace("3210.25", "high");

        let err = read_analysis_from(text.as_bytes(), "bad.csv").unwrap_err();
        match err {
            PipelineError::MalformedTable { path, reason } => {
                assert_eq!(path, "bad.csv");
                assert!(reason.contains("line 2"), "{}", reason);
                assert!(reason.contains("elevation_m"), "{}", reason);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_analysis_requires_columns() {
        let err = read_analysis_from("checklist_id,latitude\nS1,39.0\n".as_bytes(), "short.csv").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedTable { .. }));
    }

    #[test]
    fn test_summary_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SUMMARY_CSV);
        let detected = ScopeSummary {
            scope: "all".to_string(),
            records: 5,
            detections: 5,
            elevation: ElevationSummary::from_elevations([1000.0, 1200.0, 1500.0, 1800.0, 2000.0]),
            aspect_mean_deg: None,
        };
        let empty = ScopeSummary {
            scope: "outside_ranges".to_string(),
            records: 2,
            detections: 0,
            elevation: None,
            aspect_mean_deg: None,
        };
        write_summaries(&path, [&detected, &empty]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "scope,records,detections,min_m,p05_m,median_m,mean_m,p95_m,max_m,aspect_mean_deg");
        assert_eq!(lines[1], "all,5,5,1000,1040,1500,1500,1960,2000,no data");
        assert!(lines[2].starts_with("outside_ranges,2,0,no data,no data"));
    }

    #[test]
    fn test_partial_dependence_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PARTIAL_DEPENDENCE_CSV);
        let curves = vec![SensitivityCurve {
            sample_size: 50,
            replicate: 1,
            grid: vec![1000.0, 2000.0],
            values: vec![0.25, 0.5],
        }];
        write_partial_dependence(&path, &curves).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "sample_size,replicate,elevation_m,encounter_rate\n50,1,1000.0,0.25\n50,1,2000.0,0.5\n"
        );
    }

    #[test]
    fn test_output_files_dedup() {
        let mut files = OutputFiles::new("/tmp/out");
        let a = files.record(SUMMARY_CSV);
        files.record(SUMMARY_CSV);
        assert_eq!(a, PathBuf::from("/tmp/out/summary.csv"));
        assert_eq!(files.written().len(), 1);
    }
}
