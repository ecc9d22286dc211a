use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, LearnError, LearnResult};

/// Feature vector of one row, dense or sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Features {
    Dense(Vec<f64>),
    /// Sparse vector: `indices` strictly increasing, each `< size`.
    Sparse {
        size: usize,
        indices: Vec<usize>,
        values: Vec<f64>,
    },
}

impl Features {
    pub fn len(&self) -> usize {
        match self {
            Features::Dense(v) => v.len(),
            Features::Sparse { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at position `i`; implicit zeros for sparse vectors.
    pub fn get(&self, i: usize) -> f64 {
        match self {
            Features::Dense(v) => v.get(i).copied().unwrap_or(0.0),
            Features::Sparse {
                indices, values, ..
            } => match indices.binary_search(&i) {
                Ok(pos) => values[pos],
                Err(_) => 0.0,
            },
        }
    }

    pub fn to_dense(&self) -> Vec<f64> {
        match self {
            Features::Dense(v) => v.clone(),
            Features::Sparse {
                size,
                indices,
                values,
            } => {
                let mut out = vec![0.0; *size];
                for (&i, &v) in indices.iter().zip(values.iter()) {
                    out[i] = v;
                }
                out
            }
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Features::Dense(v) => {
                if v.iter().any(|x| !x.is_finite()) {
                    return Err("non-finite feature value".into());
                }
            }
            Features::Sparse {
                size,
                indices,
                values,
            } => {
                if indices.len() != values.len() {
                    return Err(format!(
                        "sparse vector has {} indices but {} values",
                        indices.len(),
                        values.len()
                    ));
                }
                if indices.windows(2).any(|w| w[0] >= w[1]) {
                    return Err("sparse indices must be strictly increasing".into());
                }
                if indices.last().is_some_and(|&i| i >= *size) {
                    return Err(format!("sparse index out of range for size {}", size));
                }
                if values.iter().any(|x| !x.is_finite()) {
                    return Err("non-finite feature value".into());
                }
            }
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Features {
    fn from(v: Vec<f64>) -> Self {
        Features::Dense(v)
    }
}

/// One labeled example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub label: f64,
    pub features: Features,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl LabeledRow {
    pub fn new(label: f64, features: impl Into<Features>) -> Self {
        LabeledRow {
            label,
            features: features.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A collection of labeled rows sharing one feature dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    rows: Vec<LabeledRow>,
    dim: usize,
}

impl Dataset {
    /// Validate and wrap rows. Every row must have the dimensionality of the first.
    pub fn new(rows: Vec<LabeledRow>) -> Result<Self, ConfigurationError> {
        let dim = rows.first().map(|r| r.features.len()).unwrap_or(0);
        for (i, row) in rows.iter().enumerate() {
            if row.features.len() != dim {
                return Err(ConfigurationError::DimensionMismatch {
                    row: i,
                    expected: dim,
                    got: row.features.len(),
                });
            }
            if !row.label.is_finite() {
                return Err(ConfigurationError::InvalidRow {
                    row: i,
                    reason: format!("label {} is not finite", row.label),
                });
            }
            row.features
                .check()
                .map_err(|reason| ConfigurationError::InvalidRow { row: i, reason })?;
        }
        Ok(Dataset { rows, dim })
    }

    /// Build from a dense feature matrix and a label vector.
    pub fn from_dense(x: &[Vec<f64>], y: &[f64]) -> Result<Self, ConfigurationError> {
        if x.len() != y.len() {
            return Err(ConfigurationError::InvalidRow {
                row: x.len().min(y.len()),
                reason: format!("{} feature rows but {} labels", x.len(), y.len()),
            });
        }
        let rows = x
            .iter()
            .zip(y.iter())
            .map(|(xi, &yi)| LabeledRow::new(yi, xi.clone()))
            .collect();
        Dataset::new(rows)
    }

    /// An empty dataset with a fixed dimensionality.
    pub fn empty(dim: usize) -> Self {
        Dataset {
            rows: Vec::new(),
            dim,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> &[LabeledRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabeledRow> {
        self.rows.iter()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.label).collect()
    }

    /// Subset by row indices (in the given order). Indices must be in range.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            dim: self.dim,
        }
    }

    /// Keep only rows whose label satisfies `keep`.
    pub fn filter_labels<F: Fn(f64) -> bool>(&self, keep: F) -> Dataset {
        Dataset {
            rows: self.rows.iter().filter(|r| keep(r.label)).cloned().collect(),
            dim: self.dim,
        }
    }

    /// Sorted distinct labels.
    pub fn class_set(&self) -> ClassSet {
        ClassSet::from_labels(self.rows.iter().map(|r| r.label))
    }

    /// Row count per class of `classes`; labels outside the set are ignored.
    pub fn class_counts(&self, classes: &ClassSet) -> Vec<usize> {
        let mut counts = vec![0usize; classes.len()];
        for row in &self.rows {
            if let Some(c) = classes.index_of(row.label) {
                counts[c] += 1;
            }
        }
        counts
    }

    /// Dense training matrix with class indices relative to `classes`.
    /// Rows whose label is not in `classes` are skipped.
    pub fn training_set(&self, classes: &ClassSet) -> LearnResult<TrainingSet> {
        let mut x = Vec::with_capacity(self.rows.len());
        let mut y = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            if let Some(c) = classes.index_of(row.label) {
                x.push(row.features.to_dense());
                y.push(c);
            }
        }
        TrainingSet::new(x, y, classes.len(), self.dim)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a LabeledRow;
    type IntoIter = std::slice::Iter<'a, LabeledRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Sorted distinct label values. Score vectors are indexed by position here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSet {
    labels: Vec<f64>,
}

impl ClassSet {
    pub fn from_labels<I: IntoIterator<Item = f64>>(labels: I) -> Self {
        let mut labels: Vec<f64> = labels.into_iter().collect();
        labels.sort_by(|a, b| a.total_cmp(b));
        labels.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
        ClassSet { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: f64) -> Option<usize> {
        self.labels.binary_search_by(|l| l.total_cmp(&label)).ok()
    }

    /// Label value of class index `idx`.
    pub fn label(&self, idx: usize) -> Option<f64> {
        self.labels.get(idx).copied()
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }
}

/// Dense numeric view handed to trainers: features plus class indices.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<usize>,
    pub n_classes: usize,
    pub n_features: usize,
}

impl TrainingSet {
    pub fn new(
        x: Vec<Vec<f64>>,
        y: Vec<usize>,
        n_classes: usize,
        n_features: usize,
    ) -> LearnResult<Self> {
        if x.len() != y.len() {
            return Err(LearnError::InvalidOperation(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if let Some(row) = x.iter().find(|r| r.len() != n_features) {
            return Err(LearnError::DimensionMismatch {
                expected: n_features,
                got: row.len(),
            });
        }
        if let Some(&index) = y.iter().find(|&&c| c >= n_classes) {
            return Err(LearnError::ClassOutOfRange { index, n_classes });
        }
        Ok(TrainingSet {
            x,
            y,
            n_classes,
            n_features,
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &c in &self.y {
            counts[c] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_rejects_ragged_rows() {
        let rows = vec![
            LabeledRow::new(0.0, vec![1.0, 2.0]),
            LabeledRow::new(1.0, vec![1.0]),
        ];
        let err = Dataset::new(rows).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DimensionMismatch {
                row: 1,
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_sparse_features() {
        let f = Features::Sparse {
            size: 4,
            indices: vec![1, 3],
            values: vec![2.0, -1.0],
        };
        assert_eq!(f.len(), 4);
        assert_eq!(f.get(1), 2.0);
        assert_eq!(f.get(2), 0.0);
        assert_eq!(f.to_dense(), vec![0.0, 2.0, 0.0, -1.0]);

        let bad = Features::Sparse {
            size: 2,
            indices: vec![0, 2],
            values: vec![1.0, 1.0],
        };
        assert!(Dataset::new(vec![LabeledRow::new(0.0, bad)]).is_err());
    }

    #[test]
    fn test_class_set_non_contiguous() {
        let classes = ClassSet::from_labels(vec![7.0, 0.0, 2.0, 7.0, 0.0]);
        assert_eq!(classes.labels(), &[0.0, 2.0, 7.0]);
        assert_eq!(classes.index_of(7.0), Some(2));
        assert_eq!(classes.index_of(1.0), None);
        assert_eq!(classes.label(1), Some(2.0));
    }

    #[test]
    fn test_training_set_maps_labels() {
        let data = Dataset::from_dense(
            &[vec![0.0], vec![1.0], vec![2.0]],
            &[5.0, 9.0, 5.0],
        )
        .unwrap();
        let classes = data.class_set();
        let ts = data.training_set(&classes).unwrap();
        assert_eq!(ts.y, vec![0, 1, 0]);
        assert_eq!(ts.n_classes, 2);
        assert_eq!(ts.class_counts(), vec![2, 1]);
    }
}
