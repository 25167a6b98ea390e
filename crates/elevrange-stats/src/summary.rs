//! Elevational summaries and binned encounter rates.

use crate::{Result, StatsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record with an elevation and a detection flag.
pub trait ElevationRecord {
    fn elevation_m(&self) -> f64;
    fn detected(&self) -> bool;
}

impl<T: ElevationRecord + ?Sized> ElevationRecord for &T {
    fn elevation_m(&self) -> f64 {
        (**self).elevation_m()
    }

    fn detected(&self) -> bool {
        (**self).detected()
    }
}

impl ElevationRecord for (f64, bool) {
    fn elevation_m(&self) -> f64 {
        self.0
    }

    fn detected(&self) -> bool {
        self.1
    }
}

/// Quantile of sorted values by linear interpolation between order
/// statistics (`h = (n - 1) p`).
///
/// Returns `None` for an empty slice or `p` outside `[0, 1]`.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Descriptive statistics of detected elevations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSummary {
    pub n: usize,
    pub min: f64,
    pub p05: f64,
    pub median: f64,
    pub mean: f64,
    pub p95: f64,
    pub max: f64,
}

impl ElevationSummary {
    /// Summarize a set of elevations. Non-finite values are ignored.
    ///
    /// Returns `None` when nothing is left to summarize.
    pub fn from_elevations<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        Some(Self {
            n,
            min: sorted[0],
            p05: quantile(&sorted, 0.05)?,
            median: quantile(&sorted, 0.5)?,
            mean,
            p95: quantile(&sorted, 0.95)?,
            max: sorted[n - 1],
        })
    }

    /// Summarize the elevations of detected records only.
    pub fn from_records<R: ElevationRecord>(records: &[R]) -> Option<Self> {
        Self::from_elevations(
            records
                .iter()
                .filter(|r| r.detected())
                .map(ElevationRecord::elevation_m),
        )
    }
}

/// Encounter rate within one elevation bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncounterRateBin {
    /// Lower bin edge, `floor(elevation / width) * width`.
    pub lower_m: f64,
    pub upper_m: f64,
    pub checklists: usize,
    pub detections: usize,
    /// Fraction of checklists in the bin with a detection.
    pub encounter_rate: f64,
}

/// Encounter rate in fixed-width elevation bins.
///
/// Bins without records are omitted. Output is ordered by elevation.
pub fn encounter_rate_bins<R: ElevationRecord>(records: &[R], bin_width_m: f64) -> Result<Vec<EncounterRateBin>> {
    if !bin_width_m.is_finite() || bin_width_m <= 0.0 {
        return Err(StatsError::InvalidBinWidth(bin_width_m));
    }

    let mut bins: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
    for record in records {
        let elevation = record.elevation_m();
        if !elevation.is_finite() {
            continue;
        }
        let entry = bins.entry((elevation / bin_width_m).floor() as i64).or_default();
        entry.0 += 1;
        if record.detected() {
            entry.1 += 1;
        }
    }

    Ok(bins
        .into_iter()
        .map(|(index, (checklists, detections))| {
            let lower_m = index as f64 * bin_width_m;
            EncounterRateBin {
                lower_m,
                upper_m: lower_m + bin_width_m,
                checklists,
                detections,
                encounter_rate: detections as f64 / checklists as f64,
            }
        })
        .collect())
}

/// Circular mean of angles in degrees, in `[0, 360)`.
///
/// Returns `None` for no input or when the angles cancel out.
pub fn circular_mean_deg<I: IntoIterator<Item = f64>>(angles: I) -> Option<f64> {
    let (mut sin, mut cos, mut n) = (0.0, 0.0, 0usize);
    for angle in angles {
        let rad = angle.to_radians();
        sin += rad.sin();
        cos += rad.cos();
        n += 1;
    }
    if n == 0 || (sin.abs() < 1e-9 && cos.abs() < 1e-9) {
        return None;
    }
    // A tiny negative mean wraps to exactly 360.0 in floating point.
    let mean = sin.atan2(cos).to_degrees().rem_euclid(360.0);
    Some(if mean >= 360.0 { 0.0 } else { mean })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_five_detected_elevations() {
        let records: Vec<(f64, bool)> = [1000.0, 1200.0, 1500.0, 1800.0, 2000.0]
            .into_iter()
            .map(|e| (e, true))
            .collect();
        let summary = ElevationSummary::from_records(&records).unwrap();
        assert_eq!(summary.n, 5);
        assert_relative_eq!(summary.median, 1500.0);
        assert_relative_eq!(summary.min, 1000.0);
        assert_relative_eq!(summary.max, 2000.0);
        assert_relative_eq!(summary.mean, 1500.0);
        // h = 4 * 0.05 = 0.2 -> 1000 + 0.2 * 200
        assert_relative_eq!(summary.p05, 1040.0);
        // h = 3.8 -> 1800 + 0.8 * 200
        assert_relative_eq!(summary.p95, 1960.0);
    }

    #[test]
    fn test_no_detections_is_no_data() {
        let records = vec![(1000.0, false), (1200.0, false)];
        assert!(ElevationSummary::from_records(&records).is_none());
        assert!(ElevationSummary::from_records::<(f64, bool)>(&[]).is_none());
    }

    #[test]
    fn test_undetected_records_ignored() {
        let records = vec![(500.0, false), (1000.0, true), (3000.0, false)];
        let summary = ElevationSummary::from_records(&records).unwrap();
        assert_eq!(summary.n, 1);
        assert_relative_eq!(summary.min, 1000.0);
        assert_relative_eq!(summary.p95, 1000.0);
    }

    #[test]
    fn test_quantile_edges() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 1.5), None);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_encounter_rate_bins() {
        let records = vec![
            (1010.0, true),
            (1020.0, false),
            (1049.9, false),
            (1050.0, true),
            (1210.0, false),
        ];
        let bins = encounter_rate_bins(&records, 50.0).unwrap();
        assert_eq!(bins.len(), 3);
        assert_relative_eq!(bins[0].lower_m, 1000.0);
        assert_eq!(bins[0].checklists, 3);
        assert_relative_eq!(bins[0].encounter_rate, 1.0 / 3.0);
        assert_relative_eq!(bins[1].lower_m, 1050.0);
        assert_relative_eq!(bins[1].encounter_rate, 1.0);
        // Empty bins between 1100 and 1200 are omitted.
        assert_relative_eq!(bins[2].lower_m, 1200.0);
        assert_relative_eq!(bins[2].encounter_rate, 0.0);

        assert!(matches!(
            encounter_rate_bins(&records, 0.0),
            Err(StatsError::InvalidBinWidth(_))
        ));
    }

    #[test]
    fn test_negative_elevation_bin() {
        let bins = encounter_rate_bins(&[(-10.0, true)], 50.0).unwrap();
        assert_relative_eq!(bins[0].lower_m, -50.0);
    }

    #[test]
    fn test_borrowed_records() {
        let records = vec![(1000.0, true), (2000.0, true), (3000.0, false)];
        let low: Vec<&(f64, bool)> = records.iter().filter(|r| r.0 < 2500.0).collect();
        let summary = ElevationSummary::from_records(&low).unwrap();
        assert_relative_eq!(summary.median, 1500.0);
    }

    #[test]
    fn test_circular_mean() {
        assert_relative_eq!(circular_mean_deg([350.0, 20.0]).unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(circular_mean_deg([80.0, 100.0]).unwrap(), 90.0, epsilon = 1e-9);
        assert_relative_eq!(circular_mean_deg([260.0, 280.0]).unwrap(), 270.0, epsilon = 1e-9);
        assert_eq!(circular_mean_deg([0.0, 180.0]), None);
        assert_eq!(circular_mean_deg(std::iter::empty()), None);
    }

    #[test]
    fn test_circular_mean_just_below_north() {
        let mean = circular_mean_deg([-1e-14]).unwrap();
        assert!((0.0..360.0).contains(&mean), "mean {} outside [0, 360)", mean);
        assert_eq!(mean, 0.0);
        let mean = circular_mean_deg([359.0, 1.0 - 1e-13]).unwrap();
        assert!((0.0..360.0).contains(&mean));
    }
}
