//! Row partitions used during validation: k-fold and train/validation split.
//!
//! All index lists come back sorted ascending so downstream training sees
//! rows in their original order for a given seed.

use oxidize_select_core::{ClassSet, ConfigurationError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One train / validation partition of the training rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

impl Fold {
    fn from_assignment(index: usize, assignment: &[usize]) -> Self {
        let mut train = Vec::new();
        let mut validation = Vec::new();
        for (row, &fold) in assignment.iter().enumerate() {
            if fold == index {
                validation.push(row);
            } else {
                train.push(row);
            }
        }
        Fold {
            index,
            train,
            validation,
        }
    }
}

/// Row indices grouped by class, each group shuffled.
fn shuffled_groups(labels: &[f64], rng: &mut StdRng) -> Vec<Vec<usize>> {
    let classes = ClassSet::from_labels(labels.iter().copied());
    let mut groups = vec![Vec::new(); classes.len()];
    for (row, &label) in labels.iter().enumerate() {
        if let Some(c) = classes.index_of(label) {
            groups[c].push(row);
        }
    }
    for group in &mut groups {
        group.shuffle(rng);
    }
    groups
}

/// Split `labels.len()` rows into `num_folds` folds.
///
/// Without stratification the rows are shuffled and cut into contiguous
/// blocks whose sizes differ by at most one. With stratification each class
/// is shuffled and dealt round-robin, continuing the rotation across classes.
pub fn k_folds(
    labels: &[f64],
    num_folds: usize,
    seed: u64,
    stratify: bool,
) -> Result<Vec<Fold>, ConfigurationError> {
    if num_folds < 2 {
        return Err(ConfigurationError::TooFewFolds(num_folds));
    }
    let n = labels.len();
    if n < num_folds {
        return Err(ConfigurationError::NotEnoughRows {
            purpose: "cross-validation",
            needed: num_folds,
            rows: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; n];

    if stratify {
        let mut next = 0;
        for group in shuffled_groups(labels, &mut rng) {
            for row in group {
                assignment[row] = next % num_folds;
                next += 1;
            }
        }
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let base = n / num_folds;
        let remainder = n % num_folds;
        let mut current = 0;
        for fold in 0..num_folds {
            let size = if fold < remainder { base + 1 } else { base };
            for &row in &indices[current..current + size] {
                assignment[row] = fold;
            }
            current += size;
        }
    }

    Ok((0..num_folds)
        .map(|fold| Fold::from_assignment(fold, &assignment))
        .collect())
}

/// A single seeded split with `round(n * train_ratio)` training rows
/// (computed per class when stratifying). Both sides must be non-empty.
pub fn train_validation_split(
    labels: &[f64],
    train_ratio: f64,
    seed: u64,
    stratify: bool,
) -> Result<Fold, ConfigurationError> {
    if !(train_ratio > 0.0 && train_ratio < 1.0) {
        return Err(ConfigurationError::InvalidRatio {
            name: "train_ratio",
            range: "(0, 1)",
            value: train_ratio,
        });
    }
    let n = labels.len();
    let mut rng = StdRng::seed_from_u64(seed);
    // 0 = train, 1 = validation
    let mut assignment = vec![1usize; n];

    if stratify {
        for group in shuffled_groups(labels, &mut rng) {
            let cut = (group.len() as f64 * train_ratio).round() as usize;
            for &row in &group[..cut.min(group.len())] {
                assignment[row] = 0;
            }
        }
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let cut = (n as f64 * train_ratio).round() as usize;
        for &row in &indices[..cut.min(n)] {
            assignment[row] = 0;
        }
    }

    let mut fold = Fold::from_assignment(1, &assignment);
    fold.index = 0;
    if fold.train.is_empty() || fold.validation.is_empty() {
        return Err(ConfigurationError::NotEnoughRows {
            purpose: "a train/validation split",
            needed: 2,
            rows: n,
        });
    }
    Ok(fold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize, k: usize) -> Vec<f64> {
        (0..n).map(|i| (i % k) as f64).collect()
    }

    #[test]
    fn test_k_folds_partition_rows() {
        let y = labels(23, 3);
        for stratify in [false, true] {
            let folds = k_folds(&y, 4, 7, stratify).unwrap();
            assert_eq!(folds.len(), 4);
            let mut seen = vec![0usize; y.len()];
            for fold in &folds {
                assert_eq!(fold.train.len() + fold.validation.len(), y.len());
                for &row in &fold.validation {
                    seen[row] += 1;
                }
                let sizes_ok = fold.validation.len() == 5 || fold.validation.len() == 6;
                assert!(sizes_ok, "fold size {}", fold.validation.len());
            }
            assert!(seen.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_stratified_folds_keep_every_class() {
        let y = labels(30, 3);
        let folds = k_folds(&y, 3, 1, true).unwrap();
        for fold in folds {
            let classes = ClassSet::from_labels(fold.validation.iter().map(|&i| y[i]));
            assert_eq!(classes.len(), 3);
        }
    }

    #[test]
    fn test_k_folds_seeded() {
        let y = labels(17, 2);
        assert_eq!(k_folds(&y, 3, 5, false).unwrap(), k_folds(&y, 3, 5, false).unwrap());
    }

    #[test]
    fn test_k_folds_rejects_bad_counts() {
        let y = labels(5, 2);
        assert_eq!(
            k_folds(&y, 1, 0, false),
            Err(ConfigurationError::TooFewFolds(1))
        );
        assert!(matches!(
            k_folds(&y, 6, 0, false),
            Err(ConfigurationError::NotEnoughRows { .. })
        ));
    }

    #[test]
    fn test_train_validation_split() {
        let y = labels(20, 2);
        let fold = train_validation_split(&y, 0.8, 3, false).unwrap();
        assert_eq!(fold.train.len(), 16);
        assert_eq!(fold.validation.len(), 4);

        let strat = train_validation_split(&y, 0.8, 3, true).unwrap();
        assert_eq!(strat.train.len(), 16);
        let val = ClassSet::from_labels(strat.validation.iter().map(|&i| y[i]));
        assert_eq!(val.len(), 2);
    }

    #[test]
    fn test_train_validation_split_rejects_ratio() {
        let y = labels(10, 2);
        for ratio in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                train_validation_split(&y, ratio, 0, false),
                Err(ConfigurationError::InvalidRatio { .. })
            ));
        }
    }
}
