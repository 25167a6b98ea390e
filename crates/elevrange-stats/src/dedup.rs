//! Spatial-temporal subsampling.
//!
//! Records are grouped by detection flag, year, calendar week and spatial
//! cell; one record per group is kept, chosen uniformly at random.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grouping key for subsampling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubsampleKey<C> {
    pub detected: bool,
    pub year: i32,
    pub week: u32,
    pub cell: C,
}

/// Keep one record per key.
///
/// Groups are emitted in key order. Singleton groups pass through without
/// drawing from `rng`, so the output depends only on the input order and
/// the RNG state.
pub fn subsample<T, C, F, R>(records: Vec<T>, key: F, rng: &mut R) -> Vec<T>
where
    C: Ord,
    F: Fn(&T) -> SubsampleKey<C>,
    R: Rng + ?Sized,
{
    let input = records.len();
    let mut groups: BTreeMap<SubsampleKey<C>, Vec<T>> = BTreeMap::new();
    for record in records {
        groups.entry(key(&record)).or_default().push(record);
    }

    let kept: Vec<T> = groups
        .into_values()
        .filter_map(|mut group| match group.len() {
            0 => None,
            1 => group.pop(),
            n => Some(group.swap_remove(rng.gen_range(0..n))),
        })
        .collect();

    tracing::info!(input, kept = kept.len(), "Subsampled records");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Debug, Clone, PartialEq)]
    struct Rec {
        id: u32,
        detected: bool,
        year: i32,
        week: u32,
        cell: (i64, i64),
    }

    fn rec(id: u32, detected: bool, week: u32, cell: (i64, i64)) -> Rec {
        Rec {
            id,
            detected,
            year: 2018,
            week,
            cell,
        }
    }

    fn key(r: &Rec) -> SubsampleKey<(i64, i64)> {
        SubsampleKey {
            detected: r.detected,
            year: r.year,
            week: r.week,
            cell: r.cell,
        }
    }

    fn records() -> Vec<Rec> {
        vec![
            rec(1, true, 23, (0, 0)),
            rec(2, true, 23, (0, 0)),
            rec(3, true, 23, (0, 0)),
            rec(4, false, 23, (0, 0)),
            rec(5, true, 24, (0, 0)),
            rec(6, true, 23, (1, 0)),
            rec(7, true, 23, (1, 0)),
        ]
    }

    #[test]
    fn test_one_per_key() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let kept = subsample(records(), key, &mut rng);
        assert_eq!(kept.len(), 4);

        let mut keys: Vec<_> = kept.iter().map(key).collect();
        keys.dedup();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_singletons_pass_through() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let kept = subsample(records(), key, &mut rng);
        assert!(kept.iter().any(|r| r.id == 4));
        assert!(kept.iter().any(|r| r.id == 5));
    }

    #[test]
    fn test_same_seed_same_output() {
        let a = subsample(records(), key, &mut ChaCha8Rng::seed_from_u64(42));
        let b = subsample(records(), key, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_member_can_be_chosen() {
        let mut seen = std::collections::BTreeSet::new();
        for seed in 0..200 {
            let kept = subsample(records(), key, &mut ChaCha8Rng::seed_from_u64(seed));
            for r in kept.iter().filter(|r| r.detected && r.week == 23 && r.cell == (0, 0)) {
                seen.insert(r.id);
            }
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_input() {
        let kept = subsample(Vec::<Rec>::new(), key, &mut ChaCha8Rng::seed_from_u64(0));
        assert!(kept.is_empty());
    }
}
