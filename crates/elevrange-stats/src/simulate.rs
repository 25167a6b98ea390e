//! Synthetic elevational distributions and range-shift scenarios.
//!
//! Elevations are drawn from normal or skew-normal distributions to show
//! how the inferred shift depends on which range definition is used.

use crate::summary::quantile;
use crate::{Result, StatsError};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::fmt;

/// A distribution of occurrence over elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeDistribution {
    Normal { mean: f64, sd: f64 },
    /// Azzalini skew-normal. Positive `shape` skews upslope.
    SkewNormal { location: f64, scale: f64, shape: f64 },
}

impl RangeDistribution {
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            RangeDistribution::Normal { mean, sd } => mean.is_finite() && sd.is_finite() && sd > 0.0,
            RangeDistribution::SkewNormal { location, scale, shape } => {
                location.is_finite() && scale.is_finite() && scale > 0.0 && shape.is_finite()
            }
        };
        if ok {
            Ok(())
        } else {
            Err(StatsError::InvalidParameter(format!("{:?}", self)))
        }
    }

    /// Draw one elevation.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            RangeDistribution::Normal { mean, sd } => {
                let z: f64 = StandardNormal.sample(rng);
                mean + sd * z
            }
            RangeDistribution::SkewNormal { location, scale, shape } => {
                let delta = shape / (1.0 + shape * shape).sqrt();
                let u0: f64 = StandardNormal.sample(rng);
                let v: f64 = StandardNormal.sample(rng);
                let u1 = delta * u0 + (1.0 - delta * delta).sqrt() * v;
                let z = if u0 >= 0.0 { u1 } else { -u1 };
                location + scale * z
            }
        }
    }

    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    /// Probability density at `x`.
    pub fn pdf(&self, x: f64) -> Result<f64> {
        match *self {
            RangeDistribution::Normal { mean, sd } => Ok(normal(mean, sd)?.pdf(x)),
            RangeDistribution::SkewNormal { location, scale, shape } => {
                let std = normal(0.0, 1.0)?;
                let z = (x - location) / scale;
                Ok(2.0 / scale * std.pdf(z) * std.cdf(shape * z))
            }
        }
    }

    /// Expected elevation.
    pub fn mean(&self) -> f64 {
        match *self {
            RangeDistribution::Normal { mean, .. } => mean,
            RangeDistribution::SkewNormal { location, scale, shape } => {
                let delta = shape / (1.0 + shape * shape).sqrt();
                location + scale * delta * (2.0 / std::f64::consts::PI).sqrt()
            }
        }
    }
}

fn normal(mean: f64, sd: f64) -> Result<Normal> {
    Normal::new(mean, sd).map_err(|e| StatsError::InvalidParameter(e.to_string()))
}

/// A named before/after pair of distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftScenario {
    pub name: String,
    pub before: RangeDistribution,
    pub after: RangeDistribution,
}

/// Ways of defining the position of an elevational range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeDefinition {
    Minimum,
    #[serde(rename = "p05")]
    Lower5,
    Median,
    Mean,
    #[serde(rename = "p95")]
    Upper95,
    Maximum,
}

impl RangeDefinition {
    pub const ALL: [RangeDefinition; 6] = [
        RangeDefinition::Minimum,
        RangeDefinition::Lower5,
        RangeDefinition::Median,
        RangeDefinition::Mean,
        RangeDefinition::Upper95,
        RangeDefinition::Maximum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeDefinition::Minimum => "minimum",
            RangeDefinition::Lower5 => "p05",
            RangeDefinition::Median => "median",
            RangeDefinition::Mean => "mean",
            RangeDefinition::Upper95 => "p95",
            RangeDefinition::Maximum => "maximum",
        }
    }

    /// Evaluate this definition on sorted elevations.
    pub fn evaluate(&self, sorted: &[f64]) -> Option<f64> {
        let n = sorted.len();
        if n == 0 {
            return None;
        }
        match self {
            RangeDefinition::Minimum => Some(sorted[0]),
            RangeDefinition::Lower5 => quantile(sorted, 0.05),
            RangeDefinition::Median => quantile(sorted, 0.5),
            RangeDefinition::Mean => Some(sorted.iter().sum::<f64>() / n as f64),
            RangeDefinition::Upper95 => quantile(sorted, 0.95),
            RangeDefinition::Maximum => Some(sorted[n - 1]),
        }
    }
}

impl fmt::Display for RangeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inferred shift under one range definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftEstimate {
    pub scenario: String,
    pub definition: RangeDefinition,
    pub sample_size: usize,
    pub before_m: f64,
    pub after_m: f64,
    pub shift_m: f64,
}

fn sorted_sample<R: Rng + ?Sized>(dist: &RangeDistribution, n: usize, rng: &mut R) -> Vec<f64> {
    let mut values = dist.sample_n(n, rng);
    values.sort_by(f64::total_cmp);
    values
}

/// Sample `n` elevations before and after and compare every definition.
pub fn simulate_shift<R: Rng + ?Sized>(
    scenario: &ShiftScenario,
    n: usize,
    rng: &mut R,
) -> Result<Vec<ShiftEstimate>> {
    scenario.before.validate()?;
    scenario.after.validate()?;
    if n == 0 {
        return Err(StatsError::NotEnoughData { needed: 1, available: 0 });
    }

    let before = sorted_sample(&scenario.before, n, rng);
    let after = sorted_sample(&scenario.after, n, rng);

    Ok(RangeDefinition::ALL
        .iter()
        .filter_map(|&definition| {
            let before_m = definition.evaluate(&before)?;
            let after_m = definition.evaluate(&after)?;
            Some(ShiftEstimate {
                scenario: scenario.name.clone(),
                definition,
                sample_size: n,
                before_m,
                after_m,
                shift_m: after_m - before_m,
            })
        })
        .collect())
}

/// Observed range extent at one sample size, averaged over replicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSizeEffect {
    pub sample_size: usize,
    pub replicates: usize,
    /// Mean of `max - min`.
    pub mean_extent_m: f64,
    /// Mean of `p95 - p05`.
    pub mean_inner_extent_m: f64,
}

/// How the observed range extent grows with sample size.
pub fn sample_size_effect<R: Rng + ?Sized>(
    dist: &RangeDistribution,
    sample_sizes: &[usize],
    replicates: usize,
    rng: &mut R,
) -> Result<Vec<SampleSizeEffect>> {
    dist.validate()?;
    if replicates == 0 {
        return Err(StatsError::InvalidParameter("replicates must be at least 1".to_string()));
    }

    let mut effects = Vec::with_capacity(sample_sizes.len());
    for &n in sample_sizes {
        if n == 0 {
            tracing::warn!("Skipping sample size 0");
            continue;
        }
        let (mut extent, mut inner) = (0.0, 0.0);
        for _ in 0..replicates {
            let values = sorted_sample(dist, n, rng);
            extent += values[n - 1] - values[0];
            let p05 = quantile(&values, 0.05).unwrap_or(values[0]);
            let p95 = quantile(&values, 0.95).unwrap_or(values[n - 1]);
            inner += p95 - p05;
        }
        effects.push(SampleSizeEffect {
            sample_size: n,
            replicates,
            mean_extent_m: extent / replicates as f64,
            mean_inner_extent_m: inner / replicates as f64,
        });
    }
    Ok(effects)
}

/// Density of a distribution over a grid, as `(elevation, density)`.
pub fn density_curve(dist: &RangeDistribution, grid: &[f64]) -> Result<Vec<(f64, f64)>> {
    dist.validate()?;
    grid.iter().map(|&x| Ok((x, dist.pdf(x)?))).collect()
}
