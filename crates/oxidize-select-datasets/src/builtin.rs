use oxidize_select_core::{Dataset, LabeledRow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Standard normal draw (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Gaussian blobs around explicit centers.
///
/// `sizes[c]` points are drawn around `centers[c]` and labeled `c`. Rows are
/// grouped by class, in class order. Every center must have the same
/// dimensionality; extra sizes or centers are ignored.
pub fn make_blobs(
    sizes: &[usize],
    centers: &[Vec<f64>],
    cluster_std: f64,
    seed: Option<u64>,
) -> Dataset {
    let mut rng = rng_for(seed);
    let mut rows = Vec::with_capacity(sizes.iter().sum());
    for (c, (&n, center)) in sizes.iter().zip(centers).enumerate() {
        for _ in 0..n {
            let x: Vec<f64> = center
                .iter()
                .map(|&m| m + gaussian(&mut rng) * cluster_std)
                .collect();
            rows.push(LabeledRow::new(c as f64, x));
        }
    }
    Dataset::new(rows).expect("blob centers share one dimensionality")
}

/// Gaussian blobs with generated centers, spaced 5 apart per class.
pub fn make_classification(
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    cluster_std: f64,
    seed: Option<u64>,
) -> Dataset {
    let mut rng = rng_for(seed);
    let centers: Vec<Vec<f64>> = (0..n_classes)
        .map(|c| {
            (0..n_features)
                .map(|_| c as f64 * 5.0 + rng.gen::<f64>())
                .collect()
        })
        .collect();
    let per_class = n_samples / n_classes.max(1);
    let sizes: Vec<usize> = (0..n_classes)
        .map(|c| {
            if c + 1 == n_classes {
                n_samples - per_class * (n_classes - 1)
            } else {
                per_class
            }
        })
        .collect();
    make_blobs(&sizes, &centers, cluster_std, Some(rng.gen()))
}

/// 22 rows in three tight, far-apart clusters: 5 rows of label 0 around
/// -100, 7 of label 1 around 0 and 10 of label 2 around +100, in 3
/// dimensions. Any reasonable learner separates them perfectly.
pub fn three_clusters() -> Dataset {
    make_blobs(
        &[5, 7, 10],
        &[vec![-100.0; 3], vec![0.0; 3], vec![100.0; 3]],
        1.0,
        Some(7),
    )
}

/// Two classes with one feature each, split at zero.
pub fn two_classes(n_per_class: usize, seed: u64) -> Dataset {
    make_blobs(
        &[n_per_class, n_per_class],
        &[vec![-3.0], vec![3.0]],
        0.5,
        Some(seed),
    )
}

/// A 30-row subset of the Iris dataset (10 per species, 4 features).
pub fn load_iris() -> Dataset {
    #[rustfmt::skip]
    let features: [[f64; 4]; 30] = [
        // Setosa
        [5.1, 3.5, 1.4, 0.2], [4.9, 3.0, 1.4, 0.2], [4.7, 3.2, 1.3, 0.2], [4.6, 3.1, 1.5, 0.2],
        [5.0, 3.6, 1.4, 0.2], [5.4, 3.9, 1.7, 0.4], [4.6, 3.4, 1.4, 0.3], [5.0, 3.4, 1.5, 0.2],
        [4.4, 2.9, 1.4, 0.2], [4.9, 3.1, 1.5, 0.1],
        // Versicolor
        [7.0, 3.2, 4.7, 1.4], [6.4, 3.2, 4.5, 1.5], [6.9, 3.1, 4.9, 1.5], [5.5, 2.3, 4.0, 1.3],
        [6.5, 2.8, 4.6, 1.5], [5.7, 2.8, 4.5, 1.3], [6.3, 3.3, 4.7, 1.6], [4.9, 2.4, 3.3, 1.0],
        [6.6, 2.9, 4.6, 1.3], [5.2, 2.7, 3.9, 1.4],
        // Virginica
        [6.3, 3.3, 6.0, 2.5], [5.8, 2.7, 5.1, 1.9], [7.1, 3.0, 5.9, 2.1], [6.3, 2.9, 5.6, 1.8],
        [6.5, 3.0, 5.8, 2.2], [7.6, 3.0, 6.6, 2.1], [4.9, 2.5, 4.5, 1.7], [7.3, 2.9, 6.3, 1.8],
        [6.7, 2.5, 5.8, 1.8], [7.2, 3.6, 6.1, 2.5],
    ];
    let rows = features
        .iter()
        .enumerate()
        .map(|(i, x)| LabeledRow::new((i / 10) as f64, x.to_vec()).with_id(format!("iris-{}", i)))
        .collect();
    Dataset::new(rows).expect("iris rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_clusters_layout() {
        let data = three_clusters();
        assert_eq!(data.len(), 22);
        assert_eq!(data.dim(), 3);
        assert_eq!(data.class_counts(&data.class_set()), vec![5, 7, 10]);
        for row in data.iter() {
            let center = (row.label - 1.0) * 100.0;
            for v in row.features.to_dense() {
                assert!((v - center).abs() < 10.0);
            }
        }
    }

    #[test]
    fn test_blobs_are_seeded() {
        let data = make_classification(40, 2, 3, 0.5, Some(42));
        assert_eq!(data, make_classification(40, 2, 3, 0.5, Some(42)));
        assert_eq!(data.len(), 40);
        assert_eq!(data.class_set().len(), 3);
    }

    #[test]
    fn test_load_iris() {
        let iris = load_iris();
        assert_eq!(iris.len(), 30);
        assert_eq!(iris.dim(), 4);
        assert_eq!(iris.rows()[29].id.as_deref(), Some("iris-29"));
    }
}
