//! Predictive model seam and partial-dependence estimation.
//!
//! The model itself is a black box behind [`Predictor`] and [`Fitter`].
//! [`KnnRegressor`] is a small built-in implementation so the sample-size
//! sensitivity analysis can run end to end.

use crate::{Result, StatsError};
use rand::seq::index::sample;
use rand::Rng;
use serde::Serialize;

// ============================================================================
// Feature matrix
// ============================================================================

/// Named numeric feature columns, stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            rows: Vec::new(),
        }
    }

    /// Append a row. Its length must match the number of columns.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.names.len() {
            return Err(StatsError::DimensionMismatch {
                expected: self.names.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| StatsError::UnknownFeature(name.to_string()))
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Copy of the selected rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

// ============================================================================
// Model traits
// ============================================================================

/// A fitted model.
pub trait Predictor {
    fn predict(&self, features: &[f64]) -> f64;
}

/// Fits a [`Predictor`] to a feature matrix and response vector.
pub trait Fitter {
    type Model: Predictor;

    fn fit(&self, features: &FeatureMatrix, response: &[f64]) -> Result<Self::Model>;
}

// ============================================================================
// k-nearest-neighbour regression
// ============================================================================

/// Mean response of the `k` nearest rows in standardized feature space.
#[derive(Debug, Clone, Copy)]
pub struct KnnRegressor {
    pub k: usize,
}

impl Default for KnnRegressor {
    fn default() -> Self {
        Self { k: 15 }
    }
}

#[derive(Debug, Clone)]
pub struct KnnModel {
    k: usize,
    means: Vec<f64>,
    scales: Vec<f64>,
    rows: Vec<Vec<f64>>,
    response: Vec<f64>,
}

impl KnnModel {
    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

impl Fitter for KnnRegressor {
    type Model = KnnModel;

    fn fit(&self, features: &FeatureMatrix, response: &[f64]) -> Result<KnnModel> {
        if self.k == 0 {
            return Err(StatsError::InvalidParameter("k must be at least 1".to_string()));
        }
        if features.n_rows() != response.len() {
            return Err(StatsError::DimensionMismatch {
                expected: features.n_rows(),
                actual: response.len(),
            });
        }
        if features.n_rows() == 0 {
            return Err(StatsError::NotEnoughData { needed: 1, available: 0 });
        }

        let n = features.n_rows() as f64;
        let p = features.n_features();
        let mut means = vec![0.0; p];
        for row in features.rows() {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut scales = vec![0.0; p];
        for row in features.rows() {
            for ((s, x), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (x - m).powi(2) / n;
            }
        }
        // Constant columns keep their raw scale.
        for s in &mut scales {
            *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
        }

        let mut model = KnnModel {
            k: self.k.min(features.n_rows()),
            means,
            scales,
            rows: Vec::with_capacity(features.n_rows()),
            response: response.to_vec(),
        };
        let rows = features.rows().map(|r| model.standardize(r)).collect();
        model.rows = rows;
        Ok(model)
    }
}

impl Predictor for KnnModel {
    fn predict(&self, features: &[f64]) -> f64 {
        let query = self.standardize(features);
        let mut distances: Vec<(f64, usize)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let d: f64 = row.iter().zip(&query).map(|(a, b)| (a - b).powi(2)).sum();
                (d, i)
            })
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        distances[..self.k].iter().map(|&(_, i)| self.response[i]).sum::<f64>() / self.k as f64
    }
}

// ============================================================================
// Partial dependence
// ============================================================================

/// Evenly spaced grid of `steps` values from `min` to `max` inclusive.
pub fn elevation_grid(min: f64, max: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (steps - 1) as f64;
            (0..steps).map(|i| min + i as f64 * step).collect()
        }
    }
}

/// Average prediction with `feature` fixed at each grid value.
///
/// For each grid value the feature is substituted into every row and the
/// predictions are averaged.
pub fn partial_dependence<P: Predictor + ?Sized>(
    model: &P,
    features: &FeatureMatrix,
    feature: usize,
    grid: &[f64],
) -> Result<Vec<f64>> {
    if feature >= features.n_features() {
        return Err(StatsError::DimensionMismatch {
            expected: features.n_features(),
            actual: feature + 1,
        });
    }
    if features.n_rows() == 0 {
        return Err(StatsError::NotEnoughData { needed: 1, available: 0 });
    }

    let mut row = vec![0.0; features.n_features()];
    Ok(grid
        .iter()
        .map(|&value| {
            let total: f64 = features
                .rows()
                .map(|r| {
                    row.copy_from_slice(r);
                    row[feature] = value;
                    model.predict(&row)
                })
                .sum();
            total / features.n_rows() as f64
        })
        .collect())
}

/// One partial-dependence curve from a random subset of the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityCurve {
    pub sample_size: usize,
    pub replicate: usize,
    pub grid: Vec<f64>,
    pub values: Vec<f64>,
}

/// Partial dependence fitted on random subsets of increasing size.
///
/// For every size and replicate a subset is drawn without replacement, a
/// model is fitted and its partial dependence on `feature` is evaluated
/// over `grid`. Sizes larger than the data are skipped.
#[allow(clippy::too_many_arguments)]
pub fn sample_size_sensitivity<F, R>(
    fitter: &F,
    features: &FeatureMatrix,
    response: &[f64],
    feature: usize,
    grid: &[f64],
    sample_sizes: &[usize],
    replicates: usize,
    rng: &mut R,
) -> Result<Vec<SensitivityCurve>>
where
    F: Fitter,
    R: Rng + ?Sized,
{
    let available = features.n_rows();
    let mut curves = Vec::new();

    for &size in sample_sizes {
        if size == 0 || size > available {
            tracing::warn!(size, available, "Skipping sample size");
            continue;
        }
        for replicate in 0..replicates {
            let indices = sample(rng, available, size).into_vec();
            let subset = features.select(&indices);
            let subset_response: Vec<f64> = indices.iter().map(|&i| response[i]).collect();
            let model = fitter.fit(&subset, &subset_response)?;
            let values = partial_dependence(&model, &subset, feature, grid)?;
            curves.push(SensitivityCurve {
                sample_size: size,
                replicate,
                grid: grid.to_vec(),
                values,
            });
        }
        tracing::debug!(size, replicates, "Fitted sensitivity replicates");
    }

    Ok(curves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Constant(f64);

    impl Predictor for Constant {
        fn predict(&self, _features: &[f64]) -> f64 {
            self.0
        }
    }

    fn matrix(rows: &[[f64; 2]]) -> FeatureMatrix {
        let mut m = FeatureMatrix::new(vec!["elevation".to_string(), "forest".to_string()]);
        for r in rows {
            m.push_row(r.to_vec()).unwrap();
        }
        m
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut m = FeatureMatrix::new(vec!["a".to_string()]);
        assert!(matches!(
            m.push_row(vec![1.0, 2.0]),
            Err(StatsError::DimensionMismatch { expected: 1, actual: 2 })
        ));
        assert_eq!(m.column_index("a").unwrap(), 0);
        assert!(matches!(m.column_index("b"), Err(StatsError::UnknownFeature(_))));
    }

    #[test]
    fn test_constant_model_flat_dependence() {
        let x = matrix(&[[1000.0, 0.1], [2000.0, 0.5], [3000.0, 0.9]]);
        let grid = elevation_grid(1000.0, 3000.0, 5);
        let pd = partial_dependence(&Constant(0.25), &x, 0, &grid).unwrap();
        assert_eq!(pd.len(), 5);
        assert!(pd.iter().all(|&v| (v - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_elevation_grid() {
        assert_eq!(elevation_grid(0.0, 100.0, 3), vec![0.0, 50.0, 100.0]);
        assert_eq!(elevation_grid(5.0, 10.0, 1), vec![5.0]);
        assert!(elevation_grid(5.0, 10.0, 0).is_empty());
    }

    #[test]
    fn test_knn_exact_neighbours() {
        let x = matrix(&[[1000.0, 0.0], [1100.0, 0.0], [3000.0, 0.0], [3100.0, 0.0]]);
        let y = [0.0, 0.0, 1.0, 1.0];
        let model = KnnRegressor { k: 2 }.fit(&x, &y).unwrap();
        assert_relative_eq!(model.predict(&[1050.0, 0.0]), 0.0);
        assert_relative_eq!(model.predict(&[3050.0, 0.0]), 1.0);
    }

    #[test]
    fn test_knn_partial_dependence_follows_signal() {
        let rows: Vec<[f64; 2]> = (0..40).map(|i| [1000.0 + 50.0 * i as f64, (i % 3) as f64]).collect();
        let x = matrix(&rows);
        let y: Vec<f64> = rows.iter().map(|r| if r[0] > 2000.0 { 1.0 } else { 0.0 }).collect();
        let model = KnnRegressor { k: 3 }.fit(&x, &y).unwrap();
        let pd = partial_dependence(&model, &x, 0, &[1200.0, 2800.0]).unwrap();
        assert!(pd[0] < pd[1]);
    }

    #[test]
    fn test_knn_rejects_mismatched_response() {
        let x = matrix(&[[1.0, 2.0]]);
        assert!(KnnRegressor { k: 1 }.fit(&x, &[1.0, 2.0]).is_err());
        assert!(KnnRegressor { k: 0 }.fit(&x, &[1.0]).is_err());
    }

    #[test]
    fn test_sample_size_sensitivity() {
        let rows: Vec<[f64; 2]> = (0..30).map(|i| [1000.0 + 10.0 * i as f64, 0.0]).collect();
        let x = matrix(&rows);
        let y: Vec<f64> = (0..30).map(|i| (i % 2) as f64).collect();
        let grid = elevation_grid(1000.0, 1290.0, 4);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let curves =
            sample_size_sensitivity(&KnnRegressor { k: 3 }, &x, &y, 0, &grid, &[10, 20, 100], 2, &mut rng)
                .unwrap();
        // Size 100 exceeds the data and is skipped.
        assert_eq!(curves.len(), 4);
        assert!(curves.iter().all(|c| c.values.len() == 4));
        assert!(curves
            .iter()
            .flat_map(|c| &c.values)
            .all(|&v| (0.0..=1.0).contains(&v)));

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let again =
            sample_size_sensitivity(&KnnRegressor { k: 3 }, &x, &y, 0, &grid, &[10, 20, 100], 2, &mut rng)
                .unwrap();
        assert_eq!(curves, again);
    }
}
