use oxidize_select_core::error::LearnResult;
use oxidize_select_core::params::{
    ensure, expect_f64, expect_text, expect_u64, expect_usize, unknown_param, Hyperparameters,
    ParamKind, ParamSpec, ParamValue,
};
use oxidize_select_core::vector::normalize;
use oxidize_select_core::{ClassificationModel, LearnError, Trainer, TrainingSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::decision_tree::{DecisionTree, DecisionTreeModel, DecisionTreeParams, Impurity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_instances_per_node: usize,
    /// Bootstrap sample size as a fraction of the training rows.
    pub subsampling_rate: f64,
    /// Fraction of features each tree may split on.
    pub feature_subset_ratio: f64,
    pub impurity: Impurity,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        RandomForestParams {
            num_trees: 20,
            max_depth: 5,
            min_instances_per_node: 1,
            subsampling_rate: 1.0,
            feature_subset_ratio: 1.0,
            impurity: Impurity::Gini,
            seed: 42,
        }
    }
}

impl Hyperparameters for RandomForestParams {
    const SPECS: &'static [ParamSpec] = &[
        ParamSpec::new("num_trees", ParamKind::Int),
        ParamSpec::new("max_depth", ParamKind::Int),
        ParamSpec::new("min_instances_per_node", ParamKind::Int),
        ParamSpec::new("subsampling_rate", ParamKind::Float),
        ParamSpec::new("feature_subset_ratio", ParamKind::Float),
        ParamSpec::new("impurity", ParamKind::Text),
        ParamSpec::new("seed", ParamKind::Int),
    ];

    fn set(&mut self, name: &str, value: &ParamValue) -> LearnResult<()> {
        match name {
            "num_trees" => self.num_trees = expect_usize(name, value)?,
            "max_depth" => self.max_depth = expect_usize(name, value)?,
            "min_instances_per_node" => self.min_instances_per_node = expect_usize(name, value)?,
            "subsampling_rate" => self.subsampling_rate = expect_f64(name, value)?,
            "feature_subset_ratio" => self.feature_subset_ratio = expect_f64(name, value)?,
            "impurity" => {
                let text = expect_text(name, value)?;
                self.impurity = Impurity::parse(text).ok_or_else(|| {
                    LearnError::InvalidHyperparameter {
                        name: name.to_string(),
                        reason: format!("expected 'gini' or 'entropy', got '{}'", text),
                    }
                })?;
            }
            "seed" => self.seed = expect_u64(name, value)?,
            _ => return Err(unknown_param(name)),
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "num_trees" => self.num_trees.into(),
            "max_depth" => self.max_depth.into(),
            "min_instances_per_node" => self.min_instances_per_node.into(),
            "subsampling_rate" => self.subsampling_rate.into(),
            "feature_subset_ratio" => self.feature_subset_ratio.into(),
            "impurity" => self.impurity.as_str().into(),
            "seed" => ParamValue::Int(self.seed as i64),
            _ => return None,
        })
    }

    fn validate(&self) -> LearnResult<()> {
        ensure(self.num_trees >= 1, "num_trees", "must be at least 1")?;
        ensure(
            self.min_instances_per_node >= 1,
            "min_instances_per_node",
            "must be at least 1",
        )?;
        ensure(
            self.subsampling_rate > 0.0 && self.subsampling_rate <= 1.0,
            "subsampling_rate",
            format!("must lie in (0, 1], got {}", self.subsampling_rate),
        )?;
        ensure(
            self.feature_subset_ratio > 0.0 && self.feature_subset_ratio <= 1.0,
            "feature_subset_ratio",
            format!("must lie in (0, 1], got {}", self.feature_subset_ratio),
        )
    }
}

/// Random forest classifier: an ensemble of decision trees with bagging.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomForest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    pub trees: Vec<DecisionTreeModel>,
    pub n_classes: usize,
    pub n_features: usize,
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed ^ (tree as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

impl Trainer for RandomForest {
    type Params = RandomForestParams;
    type Model = RandomForestModel;

    const NAME: &'static str = "RandomForest";

    fn fit(&self, data: &TrainingSet, params: &Self::Params) -> LearnResult<Self::Model> {
        params.validate()?;
        if data.is_empty() {
            return Err(LearnError::EmptyTrainingSet);
        }
        let n = data.len();
        let p = data.n_features;
        let sample_size = ((n as f64 * params.subsampling_rate).round() as usize).max(1);
        let max_features = ((p as f64 * params.feature_subset_ratio).ceil() as usize)
            .max(1)
            .min(p.max(1));

        let tree_params = DecisionTreeParams {
            max_depth: params.max_depth,
            min_instances_per_node: params.min_instances_per_node,
            min_info_gain: 0.0,
            impurity: params.impurity,
        };

        // Each tree draws from its own seeded stream, so the result does not
        // depend on how rayon schedules the trees.
        let trees = (0..params.num_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, t));

                // Bootstrap sample
                let sample: Vec<usize> = (0..sample_size).map(|_| rng.gen_range(0..n)).collect();

                // Feature subsampling
                let mut features: Vec<usize> = (0..p).collect();
                features.shuffle(&mut rng);
                features.truncate(max_features);
                features.sort_unstable();

                DecisionTree::grow(data, &tree_params, &sample, &features)
            })
            .collect::<LearnResult<Vec<_>>>()?;

        Ok(RandomForestModel {
            trees,
            n_classes: data.n_classes,
            n_features: p,
        })
    }
}

impl ClassificationModel for RandomForestModel {
    fn num_classes(&self) -> usize {
        self.n_classes
    }

    fn num_features(&self) -> usize {
        self.n_features
    }

    /// Sum of per-tree class distributions.
    fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        let mut raw = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let proba = tree.predict_probability(x);
            for (r, p) in raw.iter_mut().zip(proba.iter()) {
                *r += p;
            }
        }
        raw
    }

    fn raw_to_probability(&self, raw: &[f64]) -> Vec<f64> {
        normalize(raw)
    }
}
