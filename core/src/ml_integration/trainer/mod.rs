//! Model Training Methods
//!
//! Fitting and cross-validation for the candidate algorithms, organized
//! by learning paradigm (supervised vs unsupervised).

pub mod supervised;
pub mod unsupervised;

pub use supervised::*;
pub use unsupervised::*;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// (train, validation) row indices for one fold
pub type Fold = (Vec<usize>, Vec<usize>);

/// Shuffled k-fold split of `n_rows` rows, reproducible for a given `seed`.
///
/// `folds` is clamped to `2..=n_rows`; fold sizes differ by at most one.
pub fn kfold_indices(n_rows: usize, folds: usize, seed: u64) -> Vec<Fold> {
    if n_rows < 2 {
        return Vec::new();
    }
    let folds = folds.clamp(2, n_rows);

    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    order.shuffle(&mut rng);

    (0..folds)
        .map(|k| {
            let (valid, train): (Vec<(usize, usize)>, Vec<(usize, usize)>) = order
                .iter()
                .copied()
                .enumerate()
                .partition(|(position, _)| position % folds == k);
            (
                train.into_iter().map(|(_, row)| row).collect(),
                valid.into_iter().map(|(_, row)| row).collect(),
            )
        })
        .collect()
}

/// Round to four decimals, as metrics are reported
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_partition_every_row_once() {
        let folds = kfold_indices(10, 5, 42);
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, valid)| valid.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for (train, valid) in &folds {
            assert_eq!(train.len() + valid.len(), 10);
            assert!(valid.iter().all(|row| !train.contains(row)));
        }
    }

    #[test]
    fn test_folds_are_seeded() {
        assert_eq!(kfold_indices(12, 3, 7), kfold_indices(12, 3, 7));
        assert_ne!(kfold_indices(12, 3, 7), kfold_indices(12, 3, 8));
    }

    #[test]
    fn test_fold_count_is_clamped() {
        assert_eq!(kfold_indices(3, 10, 1).len(), 3);
        assert_eq!(kfold_indices(6, 1, 1).len(), 2);
        assert!(kfold_indices(1, 5, 1).is_empty());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
