//! Attach terrain, mountain ranges and covariates to subsampled records.

use chrono::NaiveDate;
use elevrange_dem::{DemError, RasterTile, Sampling, TerrainModel};
use elevrange_geo::{HexCell, MountainRanges};
use elevrange_records::ZeroFilledRecord;
use elevrange_stats::ElevationRecord;
use serde::Serialize;

/// One row of the analysis table.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub checklist_id: String,
    pub observer_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub observation_date: NaiveDate,
    pub year: i32,
    pub day_of_year: u32,
    pub week: u32,
    pub hours_of_day: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub effort_distance_km: Option<f64>,
    pub number_observers: Option<u32>,
    pub species_detected: bool,
    pub observation_count: Option<u32>,
    pub hex_cell: HexCell,
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub aspect_deg: Option<f64>,
    pub mountain_range: Option<String>,
    /// Covariate values in the order of [`AnalysisTable::covariate_names`].
    pub covariates: Vec<Option<f64>>,
}

impl ElevationRecord for AnalysisRecord {
    fn elevation_m(&self) -> f64 {
        self.elevation_m
    }

    fn detected(&self) -> bool {
        self.species_detected
    }
}

/// The analysis table: records plus the names of their covariate columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisTable {
    pub covariate_names: Vec<String>,
    pub records: Vec<AnalysisRecord>,
}

/// Counts of records dropped or unmatched during the join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub joined: usize,
    /// Outside the elevation raster.
    pub outside_raster: usize,
    /// On a no-data elevation cell.
    pub no_elevation: usize,
    /// Joined but not within any mountain range.
    pub outside_ranges: usize,
}

/// A named covariate raster.
#[derive(Debug, Clone)]
pub struct CovariateLayer {
    pub name: String,
    pub raster: RasterTile,
}

/// Everything a record is joined against.
pub struct JoinLayers<'a> {
    pub terrain: &'a TerrainModel,
    pub ranges: Option<&'a MountainRanges>,
    pub covariates: &'a [CovariateLayer],
}

impl JoinLayers<'_> {
    /// Join one record. Returns `Ok(None)` when the point has no elevation.
    fn join(
        &self,
        record: ZeroFilledRecord,
        hex_cell: HexCell,
        report: &mut JoinReport,
    ) -> Result<Option<AnalysisRecord>, DemError> {
        let terrain = match self.terrain.sample(record.latitude, record.longitude) {
            Ok(sample) => sample,
            Err(DemError::OutOfBounds { .. }) => {
                report.outside_raster += 1;
                return Ok(None);
            }
            Err(DemError::NoData { .. }) => {
                report.no_elevation += 1;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mountain_range = self
            .ranges
            .and_then(|r| r.locate(record.longitude, record.latitude))
            .map(|r| r.name.clone());
        if mountain_range.is_none() {
            report.outside_ranges += 1;
        }

        // Covariates are categorical or coarse; use the containing cell.
        let covariates = self
            .covariates
            .iter()
            .map(|layer| {
                layer
                    .raster
                    .sample(record.latitude, record.longitude, Sampling::Nearest)
                    .ok()
                    .map(f64::from)
            })
            .collect();

        report.joined += 1;
        Ok(Some(AnalysisRecord {
            checklist_id: record.checklist_id,
            observer_id: record.observer_id,
            latitude: record.latitude,
            longitude: record.longitude,
            observation_date: record.observation_date,
            year: record.year,
            day_of_year: record.day_of_year,
            week: record.week,
            hours_of_day: record.hours_of_day,
            duration_minutes: record.duration_minutes,
            effort_distance_km: record.effort_distance_km,
            number_observers: record.number_observers,
            species_detected: record.species_detected,
            observation_count: record.observation_count,
            hex_cell,
            elevation_m: terrain.elevation_m,
            slope_deg: terrain.slope_deg,
            aspect_deg: terrain.aspect_deg,
            mountain_range,
            covariates,
        }))
    }

    /// Join every record, dropping those without elevation.
    pub fn join_all<F>(
        &self,
        records: Vec<ZeroFilledRecord>,
        cell_of: F,
    ) -> Result<(AnalysisTable, JoinReport), DemError>
    where
        F: Fn(&ZeroFilledRecord) -> HexCell,
    {
        let mut report = JoinReport::default();
        let mut joined = Vec::with_capacity(records.len());
        for record in records {
            let cell = cell_of(&record);
            if let Some(row) = self.join(record, cell, &mut report)? {
                joined.push(row);
            }
        }

        tracing::info!(
            joined = report.joined,
            outside_raster = report.outside_raster,
            no_elevation = report.no_elevation,
            outside_ranges = report.outside_ranges,
            "Joined records to terrain"
        );

        Ok((
            AnalysisTable {
                covariate_names: self.covariates.iter().map(|c| c.name.clone()).collect(),
                records: joined,
            },
            report,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elevrange_dem::TileBounds;
    use elevrange_geo::{HexGrid, RangeLayerConfig};
    use elevrange_records::Protocol;

    const FRONT_RANGE: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"MapName": "Front Range"},
         "geometry": {"type": "Polygon",
                      "coordinates": [[[-106.0, 39.5], [-105.5, 39.5], [-105.5, 40.0], [-106.0, 40.0], [-106.0, 39.5]]]}}
    ]}"#;

    fn record(id: &str, lat: f64, lon: f64, detected: bool) -> ZeroFilledRecord {
        ZeroFilledRecord {
            checklist_id: id.to_string(),
            observer_id: Some("obsr1".to_string()),
            state_code: Some("US-CO".to_string()),
            latitude: lat,
            longitude: lon,
            observation_date: NaiveDate::from_ymd_opt(2018, 6, 3).unwrap(),
            protocol: Protocol::Stationary,
            duration_minutes: Some(20.0),
            effort_distance_km: Some(0.0),
            number_observers: Some(1),
            scientific_name: "Perisoreus canadensis".to_string(),
            species_detected: detected,
            observation_count: None,
            year: 2018,
            day_of_year: 154,
            week: 22,
            hours_of_day: Some(5.75),
        }
    }

    fn terrain() -> TerrainModel {
        let bounds = TileBounds {
            min_lat: 39.0,
            max_lat: 40.0,
            min_lon: -106.0,
            max_lon: -105.0,
        };
        let mut data: Vec<f32> = (0..100).map(|i| 2000.0 + 10.0 * (i % 10) as f32).collect();
        data[99] = -9999.0;
        let tile = RasterTile::from_grid(10, 10, bounds, data, Some(-9999.0)).unwrap();
        TerrainModel::new(tile).unwrap().with_sampling(Sampling::Nearest)
    }

    #[test]
    fn test_join_counts() {
        let terrain = terrain();
        let ranges = MountainRanges::from_geojson_str(FRONT_RANGE, &RangeLayerConfig::default()).unwrap();
        let forest = RasterTile::from_grid(
            1,
            1,
            TileBounds {
                min_lat: 39.0,
                max_lat: 39.5,
                min_lon: -106.0,
                max_lon: -105.0,
            },
            vec![0.6],
            None,
        )
        .unwrap();
        let covariates = vec![CovariateLayer {
            name: "forest".to_string(),
            raster: forest,
        }];
        let layers = JoinLayers {
            terrain: &terrain,
            ranges: Some(&ranges),
            covariates: &covariates,
        };

        let records = vec![
            record("S1", 39.74, -105.74, true),
            record("S2", 39.26, -105.26, false),
            record("S3", 41.00, -105.50, true),
            record("S4", 39.05, -105.05, true),
        ];
        let grid = HexGrid::new(3.0).unwrap();
        let (table, report) = layers
            .join_all(records, |r| grid.cell(r.longitude, r.latitude))
            .unwrap();

        assert_eq!(report.joined, 2);
        assert_eq!(report.outside_raster, 1);
        assert_eq!(report.no_elevation, 1);
        assert_eq!(report.outside_ranges, 1);

        assert_eq!(table.covariate_names, vec!["forest".to_string()]);
        let s1 = &table.records[0];
        assert_eq!(s1.mountain_range.as_deref(), Some("Front Range"));
        assert_eq!(s1.covariates, vec![None]);
        assert_eq!(s1.elevation_m, 2020.0);
        assert_eq!(s1.aspect_deg, Some(270.0));

        let s2 = &table.records[1];
        assert_eq!(s2.mountain_range, None);
        assert!((s2.covariates[0].unwrap() - 0.6).abs() < 1e-6);
        assert!(!s2.detected());
    }

    #[test]
    fn test_join_without_ranges() {
        let terrain = terrain();
        let layers = JoinLayers {
            terrain: &terrain,
            ranges: None,
            covariates: &[],
        };
        let (table, report) = layers
            .join_all(vec![record("S1", 39.74, -105.74, true)], |_| HexCell { q: 0, r: 0 })
            .unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(report.outside_ranges, 1);
        assert!(table.covariate_names.is_empty());
    }
}
