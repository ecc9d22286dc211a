//! Candidate algorithms, their grids and the fitted model they produce.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use oxidize_select_core::vector::argmax;
use oxidize_select_core::{
    ClassSet, ClassificationModel, ConfigurationError, Dataset, FitError, Hyperparameters,
    LabeledRow, LearnResult, ParamValue, SelectorError, Trainer, TrainingSet,
};
use oxidize_select_linear::{LogisticRegression, LogisticRegressionModel, LogisticRegressionParams};
use oxidize_select_metrics::{EvaluationData, ScoredPoint};
use oxidize_select_naive_bayes::{GaussianNaiveBayes, GaussianNaiveBayesModel, NaiveBayesParams};
use oxidize_select_tree::{
    DecisionTree, DecisionTreeModel, DecisionTreeParams, RandomForest, RandomForestModel,
    RandomForestParams,
};
use serde::{Deserialize, Serialize};

use crate::grid::ParamGrid;

// ─── Algorithm identifiers ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    LogisticRegression,
    RandomForest,
    DecisionTree,
    NaiveBayes,
}

impl Algorithm {
    /// Registry order.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::LogisticRegression,
        Algorithm::RandomForest,
        Algorithm::DecisionTree,
        Algorithm::NaiveBayes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::LogisticRegression => LogisticRegression::NAME,
            Algorithm::RandomForest => RandomForest::NAME,
            Algorithm::DecisionTree => DecisionTree::NAME,
            Algorithm::NaiveBayes => GaussianNaiveBayes::NAME,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigurationError::UnknownAlgorithm(s.to_string()))
    }
}

// ─── Concrete parameters and fitted models ──────────────────────────────────

/// Fully resolved hyperparameters of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "params")]
pub enum AlgorithmParams {
    LogisticRegression(LogisticRegressionParams),
    RandomForest(RandomForestParams),
    DecisionTree(DecisionTreeParams),
    NaiveBayes(NaiveBayesParams),
}

impl AlgorithmParams {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            AlgorithmParams::LogisticRegression(_) => Algorithm::LogisticRegression,
            AlgorithmParams::RandomForest(_) => Algorithm::RandomForest,
            AlgorithmParams::DecisionTree(_) => Algorithm::DecisionTree,
            AlgorithmParams::NaiveBayes(_) => Algorithm::NaiveBayes,
        }
    }

    pub fn assignment(&self) -> BTreeMap<String, ParamValue> {
        match self {
            AlgorithmParams::LogisticRegression(p) => p.assignment(),
            AlgorithmParams::RandomForest(p) => p.assignment(),
            AlgorithmParams::DecisionTree(p) => p.assignment(),
            AlgorithmParams::NaiveBayes(p) => p.assignment(),
        }
    }

    pub fn fit(&self, data: &TrainingSet) -> LearnResult<FittedModel> {
        Ok(match self {
            AlgorithmParams::LogisticRegression(p) => {
                FittedModel::LogisticRegression(LogisticRegression.fit(data, p)?)
            }
            AlgorithmParams::RandomForest(p) => {
                FittedModel::RandomForest(RandomForest.fit(data, p)?)
            }
            AlgorithmParams::DecisionTree(p) => {
                FittedModel::DecisionTree(DecisionTree.fit(data, p)?)
            }
            AlgorithmParams::NaiveBayes(p) => {
                FittedModel::NaiveBayes(GaussianNaiveBayes.fit(data, p)?)
            }
        })
    }
}

impl fmt::Display for AlgorithmParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.assignment().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// A trained model of any registered algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "model")]
pub enum FittedModel {
    LogisticRegression(LogisticRegressionModel),
    RandomForest(RandomForestModel),
    DecisionTree(DecisionTreeModel),
    NaiveBayes(GaussianNaiveBayesModel),
}

impl FittedModel {
    fn inner(&self) -> &dyn ClassificationModel {
        match self {
            FittedModel::LogisticRegression(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::DecisionTree(m) => m,
            FittedModel::NaiveBayes(m) => m,
        }
    }
}

impl ClassificationModel for FittedModel {
    fn num_classes(&self) -> usize {
        self.inner().num_classes()
    }

    fn num_features(&self) -> usize {
        self.inner().num_features()
    }

    fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        self.inner().predict_raw(x)
    }

    fn raw_to_probability(&self, raw: &[f64]) -> Vec<f64> {
        self.inner().raw_to_probability(raw)
    }
}

// ─── Selected model ─────────────────────────────────────────────────────────

/// The chosen model together with everything needed to score rows:
/// its parameters, the class indexing and optional decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub params: AlgorithmParams,
    pub classes: ClassSet,
    pub model: FittedModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<f64>>,
}

impl SelectedModel {
    /// Train `params` on every row of `data`.
    pub fn train(params: AlgorithmParams, data: &Dataset) -> Result<Self, SelectorError> {
        let classes = data.class_set();
        if classes.len() < 2 {
            return Err(FitError::TooFewClasses {
                found: classes.len(),
            }
            .into());
        }
        let training = data.training_set(&classes)?;
        let model = params.fit(&training)?;
        Ok(SelectedModel {
            params,
            classes,
            model,
            thresholds: None,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.params.algorithm()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_features(&self) -> usize {
        self.model.num_features()
    }

    pub fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        self.model.predict_raw(x)
    }

    pub fn raw_to_probability(&self, raw: &[f64]) -> Vec<f64> {
        self.model.raw_to_probability(raw)
    }

    /// Class index chosen from a probability vector: `argmax(p / t)` when
    /// thresholds are set, plain argmax otherwise.
    pub fn class_index(&self, probability: &[f64]) -> usize {
        match &self.thresholds {
            Some(t) => {
                let scaled: Vec<f64> = probability
                    .iter()
                    .zip(t.iter())
                    .map(|(&p, &t)| p / t)
                    .collect();
                argmax(&scaled)
            }
            None => argmax(probability),
        }
    }

    /// Predicted label value for a dense feature vector.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let probability = self.raw_to_probability(&self.predict_raw(x));
        self.label_of(self.class_index(&probability))
    }

    pub fn label_of(&self, index: usize) -> f64 {
        self.classes.label(index).unwrap_or(f64::NAN)
    }

    /// Prediction, raw scores and probabilities for one row.
    pub fn score(&self, row: &LabeledRow) -> ScoredPoint {
        let x = row.features.to_dense();
        let raw_scores = self.predict_raw(&x);
        let probability = self.raw_to_probability(&raw_scores);
        ScoredPoint {
            label: row.label,
            prediction: self.label_of(self.class_index(&probability)),
            raw_scores,
            probability,
        }
    }

    /// Score every row of `data` for the evaluators.
    pub fn evaluation_data(&self, data: &Dataset) -> EvaluationData {
        let points = data.iter().map(|row| self.score(row)).collect();
        EvaluationData::new(self.classes.clone(), points)
    }
}

/// Check decision thresholds against the number of classes.
pub fn validate_thresholds(
    thresholds: &[f64],
    num_classes: usize,
) -> Result<(), ConfigurationError> {
    if thresholds.len() != num_classes {
        return Err(ConfigurationError::InvalidThresholds(format!(
            "{} thresholds given for {} classes",
            thresholds.len(),
            num_classes
        )));
    }
    if thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
        return Err(ConfigurationError::InvalidThresholds(
            "thresholds must be finite and non-negative".into(),
        ));
    }
    if thresholds.iter().filter(|&&t| t == 0.0).count() > 1 {
        return Err(ConfigurationError::InvalidThresholds(
            "at most one threshold may be zero".into(),
        ));
    }
    Ok(())
}

// ─── Candidates ─────────────────────────────────────────────────────────────

/// One candidate algorithm and its hyperparameter grid.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSpec {
    LogisticRegression(ParamGrid<LogisticRegressionParams>),
    RandomForest(ParamGrid<RandomForestParams>),
    DecisionTree(ParamGrid<DecisionTreeParams>),
    NaiveBayes(ParamGrid<NaiveBayesParams>),
}

/// A grid point ready to train, or the reason it cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrial {
    pub algorithm: Algorithm,
    pub description: String,
    pub params: LearnResult<AlgorithmParams>,
}

fn points<H, F>(grid: &ParamGrid<H>, algorithm: Algorithm, wrap: F) -> Vec<PlannedTrial>
where
    H: Hyperparameters,
    F: Fn(H) -> AlgorithmParams,
{
    grid.iter()
        .map(|point| PlannedTrial {
            algorithm,
            description: point.to_string(),
            params: grid.apply(&point).map(&wrap),
        })
        .collect()
}

impl CandidateSpec {
    /// The default search space of `algorithm`.
    pub fn default_for(algorithm: Algorithm) -> Self {
        let mut spec = CandidateSpec::empty(algorithm);
        let defaults: Vec<(&str, Vec<ParamValue>)> = match algorithm {
            Algorithm::LogisticRegression => {
                vec![("reg_param", vec![0.0.into(), 0.01.into(), 0.1.into()])]
            }
            Algorithm::RandomForest => vec![
                ("max_depth", vec![3i64.into(), 6i64.into()]),
                ("impurity", vec!["gini".into(), "entropy".into()]),
            ],
            Algorithm::DecisionTree => vec![
                ("max_depth", vec![3i64.into(), 6i64.into(), 12i64.into()]),
                ("impurity", vec!["gini".into(), "entropy".into()]),
            ],
            Algorithm::NaiveBayes => vec![("var_smoothing", vec![1e-9.into(), 1e-6.into()])],
        };
        for (name, values) in defaults {
            spec.set_param(name, values).expect("default grid matches parameter specs");
        }
        spec
    }

    /// A candidate with no value lists: a single trial at the defaults.
    pub fn empty(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::LogisticRegression => {
                CandidateSpec::LogisticRegression(ParamGrid::default())
            }
            Algorithm::RandomForest => CandidateSpec::RandomForest(ParamGrid::default()),
            Algorithm::DecisionTree => CandidateSpec::DecisionTree(ParamGrid::default()),
            Algorithm::NaiveBayes => CandidateSpec::NaiveBayes(ParamGrid::default()),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            CandidateSpec::LogisticRegression(_) => Algorithm::LogisticRegression,
            CandidateSpec::RandomForest(_) => Algorithm::RandomForest,
            CandidateSpec::DecisionTree(_) => Algorithm::DecisionTree,
            CandidateSpec::NaiveBayes(_) => Algorithm::NaiveBayes,
        }
    }

    pub fn set_param(
        &mut self,
        name: &str,
        values: Vec<ParamValue>,
    ) -> Result<(), ConfigurationError> {
        let algorithm = self.algorithm().name();
        match self {
            CandidateSpec::LogisticRegression(g) => g.set_param(algorithm, name, values),
            CandidateSpec::RandomForest(g) => g.set_param(algorithm, name, values),
            CandidateSpec::DecisionTree(g) => g.set_param(algorithm, name, values),
            CandidateSpec::NaiveBayes(g) => g.set_param(algorithm, name, values),
        }
    }

    pub fn grid_size(&self) -> usize {
        match self {
            CandidateSpec::LogisticRegression(g) => g.len(),
            CandidateSpec::RandomForest(g) => g.len(),
            CandidateSpec::DecisionTree(g) => g.len(),
            CandidateSpec::NaiveBayes(g) => g.len(),
        }
    }

    /// Expand the grid in iteration order.
    pub fn expand(&self) -> Vec<PlannedTrial> {
        let algorithm = self.algorithm();
        match self {
            CandidateSpec::LogisticRegression(g) => {
                points(g, algorithm, AlgorithmParams::LogisticRegression)
            }
            CandidateSpec::RandomForest(g) => points(g, algorithm, AlgorithmParams::RandomForest),
            CandidateSpec::DecisionTree(g) => points(g, algorithm, AlgorithmParams::DecisionTree),
            CandidateSpec::NaiveBayes(g) => points(g, algorithm, AlgorithmParams::NaiveBayes),
        }
    }
}

/// Every known candidate plus the ordered subset enabled for search.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegistry {
    candidates: Vec<CandidateSpec>,
    enabled: Vec<Algorithm>,
}

impl Default for CandidateRegistry {
    fn default() -> Self {
        CandidateRegistry {
            candidates: Algorithm::ALL
                .into_iter()
                .map(CandidateSpec::default_for)
                .collect(),
            enabled: vec![Algorithm::LogisticRegression, Algorithm::RandomForest],
        }
    }
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable exactly `algorithms`, in the given order. Duplicates are ignored.
    pub fn set_models_to_try(&mut self, algorithms: &[Algorithm]) {
        self.enabled.clear();
        for &a in algorithms {
            if !self.enabled.contains(&a) {
                self.enabled.push(a);
            }
        }
    }

    pub fn enabled(&self) -> &[Algorithm] {
        &self.enabled
    }

    pub fn candidate(&self, algorithm: Algorithm) -> &CandidateSpec {
        &self.candidates[Self::slot(algorithm)]
    }

    pub fn candidate_mut(&mut self, algorithm: Algorithm) -> &mut CandidateSpec {
        &mut self.candidates[Self::slot(algorithm)]
    }

    /// Replace a whole candidate, e.g. to drop its default grid.
    pub fn set_candidate(&mut self, spec: CandidateSpec) {
        let slot = Self::slot(spec.algorithm());
        self.candidates[slot] = spec;
    }

    // Candidates are stored in `Algorithm::ALL` order
    fn slot(algorithm: Algorithm) -> usize {
        algorithm as usize
    }

    pub fn set_param(
        &mut self,
        algorithm: Algorithm,
        name: &str,
        values: Vec<ParamValue>,
    ) -> Result<(), ConfigurationError> {
        self.candidate_mut(algorithm).set_param(name, values)
    }

    /// Number of trials over all enabled candidates.
    pub fn trial_count(&self) -> usize {
        self.enabled
            .iter()
            .map(|&a| self.candidate(a).grid_size())
            .sum()
    }

    /// All trials of the enabled candidates, numbered by position.
    pub fn plan(&self) -> Result<Vec<PlannedTrial>, ConfigurationError> {
        if self.enabled.is_empty() {
            return Err(ConfigurationError::NoCandidates);
        }
        Ok(self
            .enabled
            .iter()
            .flat_map(|&a| self.candidate(a).expand())
            .collect())
    }
}
