use oxidize_select_core::error::LearnResult;
use oxidize_select_core::params::{
    ensure, expect_f64, expect_text, expect_usize, unknown_param, Hyperparameters, ParamKind,
    ParamSpec, ParamValue,
};
use oxidize_select_core::vector::normalize;
use oxidize_select_core::{ClassificationModel, LearnError, Trainer, TrainingSet};
use serde::{Deserialize, Serialize};

/// Split quality criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impurity {
    Gini,
    Entropy,
}

impl Impurity {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gini" => Some(Impurity::Gini),
            "entropy" => Some(Impurity::Entropy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Impurity::Gini => "gini",
            Impurity::Entropy => "entropy",
        }
    }

    /// Impurity of a class-count histogram.
    pub fn of(self, counts: &[f64]) -> f64 {
        let total: f64 = counts.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Impurity::Gini => {
                let mut gini = 1.0;
                for &c in counts {
                    let p = c / total;
                    gini -= p * p;
                }
                gini
            }
            Impurity::Entropy => counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / total;
                    -p * p.log2()
                })
                .sum(),
        }
    }
}

/// A node in the decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal node: splits on feature `feature_idx` at `threshold`.
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    /// Leaf: training class counts that reached it.
    Leaf { counts: Vec<f64> },
}

impl TreeNode {
    pub fn leaf_counts(&self, x: &[f64]) -> &[f64] {
        match self {
            TreeNode::Leaf { counts } => counts,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if x[*feature_idx] <= *threshold {
                    left.leaf_counts(x)
                } else {
                    right.leaf_counts(x)
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeParams {
    pub max_depth: usize,
    pub min_instances_per_node: usize,
    pub min_info_gain: f64,
    pub impurity: Impurity,
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        DecisionTreeParams {
            max_depth: 5,
            min_instances_per_node: 1,
            min_info_gain: 0.0,
            impurity: Impurity::Gini,
        }
    }
}

impl Hyperparameters for DecisionTreeParams {
    const SPECS: &'static [ParamSpec] = &[
        ParamSpec::new("max_depth", ParamKind::Int),
        ParamSpec::new("min_instances_per_node", ParamKind::Int),
        ParamSpec::new("min_info_gain", ParamKind::Float),
        ParamSpec::new("impurity", ParamKind::Text),
    ];

    fn set(&mut self, name: &str, value: &ParamValue) -> LearnResult<()> {
        match name {
            "max_depth" => self.max_depth = expect_usize(name, value)?,
            "min_instances_per_node" => self.min_instances_per_node = expect_usize(name, value)?,
            "min_info_gain" => self.min_info_gain = expect_f64(name, value)?,
            "impurity" => {
                let text = expect_text(name, value)?;
                self.impurity = Impurity::parse(text).ok_or_else(|| {
                    LearnError::InvalidHyperparameter {
                        name: name.to_string(),
                        reason: format!("expected 'gini' or 'entropy', got '{}'", text),
                    }
                })?;
            }
            _ => return Err(unknown_param(name)),
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "max_depth" => self.max_depth.into(),
            "min_instances_per_node" => self.min_instances_per_node.into(),
            "min_info_gain" => self.min_info_gain.into(),
            "impurity" => self.impurity.as_str().into(),
            _ => return None,
        })
    }

    fn validate(&self) -> LearnResult<()> {
        ensure(
            self.min_instances_per_node >= 1,
            "min_instances_per_node",
            "must be at least 1",
        )?;
        ensure(
            self.min_info_gain >= 0.0,
            "min_info_gain",
            format!("must be non-negative, got {}", self.min_info_gain),
        )
    }
}

/// CART decision tree classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionTree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    pub root: TreeNode,
    pub n_classes: usize,
    pub n_features: usize,
}

struct Grower<'a> {
    data: &'a TrainingSet,
    params: &'a DecisionTreeParams,
    /// Columns this tree may split on.
    features: &'a [usize],
}

impl Grower<'_> {
    fn counts(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.data.n_classes];
        for &i in indices {
            counts[self.data.y[i]] += 1.0;
        }
        counts
    }

    fn grow(&self, indices: &[usize], depth: usize) -> TreeNode {
        let counts = self.counts(indices);
        let min_leaf = self.params.min_instances_per_node;

        // Base cases
        let pure = counts.iter().filter(|&&c| c > 0.0).count() <= 1;
        if pure || depth >= self.params.max_depth || indices.len() < 2 * min_leaf {
            return TreeNode::Leaf { counts };
        }

        let parent_impurity = self.params.impurity.of(&counts);
        let total = indices.len() as f64;

        let mut best_gain = f64::NEG_INFINITY;
        let mut best: Option<(usize, f64)> = None;

        for &feature in self.features {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| self.data.x[a][feature].total_cmp(&self.data.x[b][feature]));

            // Sweep split points left to right, moving one row at a time
            let mut left = vec![0.0; self.data.n_classes];
            let mut right = counts.clone();
            for pos in 0..order.len() - 1 {
                let cls = self.data.y[order[pos]];
                left[cls] += 1.0;
                right[cls] -= 1.0;

                let here = self.data.x[order[pos]][feature];
                let next = self.data.x[order[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = order.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let weighted = (n_left as f64 / total) * self.params.impurity.of(&left)
                    + (n_right as f64 / total) * self.params.impurity.of(&right);
                let gain = parent_impurity - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, (here + next) / 2.0));
                }
            }
        }

        let (feature_idx, threshold) = match best {
            Some(split) if best_gain > 0.0 && best_gain >= self.params.min_info_gain => split,
            _ => return TreeNode::Leaf { counts },
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.data.x[i][feature_idx] <= threshold);

        TreeNode::Split {
            feature_idx,
            threshold,
            left: Box::new(self.grow(&left_idx, depth + 1)),
            right: Box::new(self.grow(&right_idx, depth + 1)),
        }
    }
}

impl DecisionTree {
    /// Grow a tree on the rows `indices`, splitting only on `features`.
    pub fn grow(
        data: &TrainingSet,
        params: &DecisionTreeParams,
        indices: &[usize],
        features: &[usize],
    ) -> LearnResult<DecisionTreeModel> {
        params.validate()?;
        if indices.is_empty() {
            return Err(LearnError::EmptyTrainingSet);
        }
        let grower = Grower {
            data,
            params,
            features,
        };
        Ok(DecisionTreeModel {
            root: grower.grow(indices, 0),
            n_classes: data.n_classes,
            n_features: data.n_features,
        })
    }
}

impl Trainer for DecisionTree {
    type Params = DecisionTreeParams;
    type Model = DecisionTreeModel;

    const NAME: &'static str = "DecisionTree";

    fn fit(&self, data: &TrainingSet, params: &Self::Params) -> LearnResult<Self::Model> {
        let indices: Vec<usize> = (0..data.len()).collect();
        let features: Vec<usize> = (0..data.n_features).collect();
        DecisionTree::grow(data, params, &indices, &features)
    }
}

impl ClassificationModel for DecisionTreeModel {
    fn num_classes(&self) -> usize {
        self.n_classes
    }

    fn num_features(&self) -> usize {
        self.n_features
    }

    /// Class counts of the leaf reached by `x`.
    fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        self.root.leaf_counts(x).to_vec()
    }

    fn raw_to_probability(&self, raw: &[f64]) -> Vec<f64> {
        normalize(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn steps() -> TrainingSet {
        let x = (0..8).map(|i| vec![i as f64]).collect();
        TrainingSet::new(x, vec![0, 0, 0, 0, 1, 1, 1, 1], 2, 1).unwrap()
    }

    #[test]
    fn test_decision_tree_classifier() {
        let data = steps();
        let model = DecisionTree
            .fit(&data, &DecisionTreeParams::default())
            .unwrap();

        // Should get 100% accuracy on training data
        for (xi, &yi) in data.x.iter().zip(data.y.iter()) {
            assert_eq!(model.predict_class(xi), yi, "Mismatch at {:?}", xi);
        }
        assert_eq!(model.root.depth(), 1);
        assert_eq!(model.predict_raw(&[0.0]), vec![4.0, 0.0]);
    }

    #[test]
    fn test_depth_zero_is_prior() {
        let data = TrainingSet::new(
            vec![vec![0.0], vec![1.0], vec![2.0]],
            vec![0, 1, 1],
            2,
            1,
        )
        .unwrap();
        let params = DecisionTreeParams {
            max_depth: 0,
            ..Default::default()
        };
        let model = DecisionTree.fit(&data, &params).unwrap();
        let proba = model.predict_probability(&[0.0]);
        assert_abs_diff_eq!(proba[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(proba[1], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_entropy_impurity() {
        assert_abs_diff_eq!(Impurity::Entropy.of(&[2.0, 2.0]), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Impurity::Gini.of(&[2.0, 2.0]), 0.5, epsilon = 1e-12);
        assert_eq!(Impurity::Gini.of(&[3.0, 0.0]), 0.0);

        let mut params = DecisionTreeParams::default();
        params
            .set("impurity", &ParamValue::Text("entropy".into()))
            .unwrap();
        assert_eq!(params.impurity, Impurity::Entropy);
        assert!(params
            .set("impurity", &ParamValue::Text("variance".into()))
            .is_err());
    }

    #[test]
    fn test_min_info_gain_blocks_split() {
        let data = steps();
        let params = DecisionTreeParams {
            min_info_gain: 0.9,
            ..Default::default()
        };
        let model = DecisionTree.fit(&data, &params).unwrap();
        assert_eq!(model.root.depth(), 0);
    }
}
