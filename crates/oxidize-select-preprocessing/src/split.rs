use oxidize_select_core::{ConfigurationError, Dataset};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Reserves a test partition and optionally drops rare label classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSplitter {
    /// Fraction of rows held out as the test partition, in `[0, 1)`.
    pub reserve_test_fraction: f64,
    pub seed: u64,
    /// Keep only the most frequent label classes.
    pub max_label_categories: Option<usize>,
    /// Drop label classes rarer than this fraction of all rows.
    pub min_label_fraction: f64,
}

impl Default for DataSplitter {
    fn default() -> Self {
        DataSplitter {
            reserve_test_fraction: 0.1,
            seed: 42,
            max_label_categories: None,
            min_label_fraction: 0.0,
        }
    }
}

/// What the splitter did to the data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitSummary {
    pub labels_kept: Vec<f64>,
    pub labels_dropped: Vec<f64>,
    pub rows_dropped: usize,
    pub train_count: usize,
    pub test_count: usize,
}

/// Output of `DataSplitter::prepare`.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: Dataset,
    pub test: Dataset,
    pub summary: SplitSummary,
}

impl DataSplitter {
    pub fn new(reserve_test_fraction: f64) -> Self {
        DataSplitter {
            reserve_test_fraction,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_label_categories(mut self, max: usize) -> Self {
        self.max_label_categories = Some(max);
        self
    }

    pub fn with_min_label_fraction(mut self, fraction: f64) -> Self {
        self.min_label_fraction = fraction;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..1.0).contains(&self.reserve_test_fraction) {
            return Err(ConfigurationError::InvalidRatio {
                name: "reserve_test_fraction",
                range: "[0, 1)",
                value: self.reserve_test_fraction,
            });
        }
        if !(0.0..1.0).contains(&self.min_label_fraction) {
            return Err(ConfigurationError::InvalidRatio {
                name: "min_label_fraction",
                range: "[0, 1)",
                value: self.min_label_fraction,
            });
        }
        if self.max_label_categories == Some(0) {
            return Err(ConfigurationError::InvalidRatio {
                name: "max_label_categories",
                range: "[1, inf)",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Drop label classes exceeding `max_label_categories` (least frequent
    /// first, ties by label) or below `min_label_fraction`.
    pub fn filter_labels(&self, data: &Dataset) -> (Dataset, SplitSummary) {
        let classes = data.class_set();
        let counts = data.class_counts(&classes);
        let n = data.len().max(1) as f64;

        let mut order: Vec<usize> = (0..classes.len()).collect();
        order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));

        let mut keep = vec![false; classes.len()];
        for (rank, &c) in order.iter().enumerate() {
            let within_cap = self.max_label_categories.map_or(true, |max| rank < max);
            let frequent = counts[c] as f64 / n >= self.min_label_fraction;
            keep[c] = within_cap && frequent;
        }

        let mut summary = SplitSummary::default();
        for (c, &label) in classes.labels().iter().enumerate() {
            if keep[c] {
                summary.labels_kept.push(label);
            } else {
                summary.labels_dropped.push(label);
                summary.rows_dropped += counts[c];
            }
        }

        if summary.labels_dropped.is_empty() {
            return (data.clone(), summary);
        }
        info!(
            dropped = ?summary.labels_dropped,
            rows = summary.rows_dropped,
            "dropping rare label classes"
        );
        let filtered = data.filter_labels(|label| {
            classes
                .index_of(label)
                .map(|c| keep[c])
                .unwrap_or(false)
        });
        (filtered, summary)
    }

    /// Shuffle with the configured seed and cut off
    /// `round(n * reserve_test_fraction)` rows as the test partition.
    ///
    /// Returns `(train, test)`.
    pub fn split(&self, data: &Dataset) -> (Dataset, Dataset) {
        let n = data.len();
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let test_size = (n as f64 * self.reserve_test_fraction).round() as usize;
        let train_size = n - test_size.min(n);

        let mut train_idx = indices[..train_size].to_vec();
        let mut test_idx = indices[train_size..].to_vec();
        // Keep the original row order inside each partition
        train_idx.sort_unstable();
        test_idx.sort_unstable();

        (data.select(&train_idx), data.select(&test_idx))
    }

    /// Label filtering followed by the train/test split.
    pub fn prepare(&self, data: &Dataset) -> Result<PreparedData, ConfigurationError> {
        self.validate()?;
        let (filtered, mut summary) = self.filter_labels(data);
        let (train, test) = self.split(&filtered);
        summary.train_count = train.len();
        summary.test_count = test.len();
        Ok(PreparedData {
            train,
            test,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidize_select_core::LabeledRow;

    fn rows(labels: &[f64]) -> Dataset {
        let rows = labels
            .iter()
            .enumerate()
            .map(|(i, &l)| LabeledRow::new(l, vec![i as f64, 2.0 * i as f64]))
            .collect();
        Dataset::new(rows).unwrap()
    }

    #[test]
    fn test_train_test_split() {
        let data = rows(&[0.0, 1.0, 0.0, 1.0, 0.0]);
        let (train, test) = DataSplitter::new(0.4).with_seed(42).split(&data);
        assert_eq!(train.len(), 3);
        assert_eq!(test.len(), 2);
        assert_eq!(train.dim(), 2);
    }

    #[test]
    fn test_split_counts_for_many_sizes() {
        for n in 0..60 {
            let labels: Vec<f64> = (0..n).map(|i| (i % 3) as f64).collect();
            let data = rows(&labels);
            let splitter = DataSplitter::new(0.25).with_seed(n as u64);
            let (train, test) = splitter.split(&data);
            assert_eq!(train.len() + test.len(), n);
            assert!((test.len() as f64 - 0.25 * n as f64).abs() <= 0.5);
        }
    }

    #[test]
    fn test_split_is_seeded() {
        let data = rows(&[0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
        let a = DataSplitter::new(0.3).with_seed(9).split(&data);
        let b = DataSplitter::new(0.3).with_seed(9).split(&data);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_filter_rare_labels() {
        let data = rows(&[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 3.0, 3.0]);
        let splitter = DataSplitter::new(0.0)
            .with_max_label_categories(3)
            .with_min_label_fraction(0.15);
        let prepared = splitter.prepare(&data).unwrap();
        assert_eq!(prepared.summary.labels_kept, vec![0.0, 1.0, 3.0]);
        assert_eq!(prepared.summary.labels_dropped, vec![2.0]);
        assert_eq!(prepared.summary.rows_dropped, 1);
        assert_eq!(prepared.train.len(), 9);
        assert!(prepared.test.is_empty());

        let capped = DataSplitter::new(0.0).with_max_label_categories(2);
        let (kept, summary) = capped.filter_labels(&data);
        assert_eq!(summary.labels_kept, vec![0.0, 1.0]);
        assert_eq!(kept.len(), 7);
    }

    #[test]
    fn test_rejects_bad_fraction() {
        assert!(DataSplitter::new(1.0).validate().is_err());
        assert!(DataSplitter::new(-0.1).validate().is_err());
        assert!(DataSplitter::new(0.0).validate().is_ok());
    }
}
