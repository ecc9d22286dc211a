//! Model selector: configuration, fit orchestration and the fitted stage-1
//! transformer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oxidize_select_core::{ConfigurationError, Dataset, Features, FitError, ParamValue, SelectorResult};
use oxidize_select_metrics::{evaluate_all, Evaluator};
use oxidize_select_preprocessing::{DataSplitter, SplitSummary};
use oxidize_select_tree::Impurity;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::cascade::{OutputCascade, OutputColumns, ScoredRow};
use crate::config::builtin_evaluator;
use crate::metadata::{MetricsRecord, SelectorMetadata, SelectorSummary, TrainingEvalSource};
use crate::registry::{
    validate_thresholds, Algorithm, CandidateRegistry, CandidateSpec, SelectedModel,
};
use crate::validator::{ValidationMetric, ValidationStrategy, Validator};

// ─── Input columns ──────────────────────────────────────────────────────────

/// Semantic type of an input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    /// Non-nullable real number.
    RealNN,
    /// Nullable real number.
    Real,
    Integral,
    Binary,
    PickList,
    Text,
    /// Numeric feature vector.
    Vector,
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputColumn {
    pub name: String,
    pub feature_type: FeatureType,
}

impl InputColumn {
    pub fn new(name: impl Into<String>, feature_type: FeatureType) -> Self {
        InputColumn {
            name: name.into(),
            feature_type,
        }
    }

    pub fn real_nn(name: impl Into<String>) -> Self {
        Self::new(name, FeatureType::RealNN)
    }

    pub fn integral(name: impl Into<String>) -> Self {
        Self::new(name, FeatureType::Integral)
    }

    pub fn vector(name: impl Into<String>) -> Self {
        Self::new(name, FeatureType::Vector)
    }
}

// ─── Best estimator override ────────────────────────────────────────────────

/// A model supplied by the caller in place of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct BestEstimator {
    pub name: String,
    pub model: SelectedModel,
    pub metadata: BTreeMap<String, Value>,
}

impl BestEstimator {
    pub fn new(name: impl Into<String>, model: SelectedModel) -> Self {
        BestEstimator {
            name: name.into(),
            model,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ─── Selector ───────────────────────────────────────────────────────────────

static NEXT_UID: AtomicUsize = AtomicUsize::new(0);

fn next_uid() -> String {
    format!("ModelSelector_{:012x}", NEXT_UID.fetch_add(1, Ordering::Relaxed))
}

/// Chooses and trains the best candidate model for a labeled dataset.
///
/// Configure with the setters, then call [`ModelSelector::fit`]. The
/// selector is only read during `fit`; the returned [`FittedModelSelector`]
/// owns everything it needs to score rows.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    uid: String,
    label: Option<InputColumn>,
    features: Option<InputColumn>,
    registry: CandidateRegistry,
    validator: Validator,
    splitter: Option<DataSplitter>,
    thresholds: Option<Vec<f64>>,
    best_estimator: Option<BestEstimator>,
    custom_params: BTreeMap<String, Value>,
}

impl Default for ModelSelector {
    fn default() -> Self {
        ModelSelector {
            uid: next_uid(),
            label: None,
            features: None,
            registry: CandidateRegistry::default(),
            validator: Validator::default(),
            splitter: Some(DataSplitter::default()),
            thresholds: None,
            best_estimator: None,
            custom_params: BTreeMap::new(),
        }
    }
}

impl ModelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Bind the label and feature columns. The label must be a non-nullable
    /// number (`RealNN` or `Integral`), the features a `Vector`.
    pub fn set_input(
        &mut self,
        label: InputColumn,
        features: InputColumn,
    ) -> Result<&mut Self, ConfigurationError> {
        if !matches!(label.feature_type, FeatureType::RealNN | FeatureType::Integral) {
            return Err(ConfigurationError::InvalidInput {
                column: label.name,
                expected: "RealNN or Integral".into(),
                got: label.feature_type.to_string(),
            });
        }
        if features.feature_type != FeatureType::Vector {
            return Err(ConfigurationError::InvalidInput {
                column: features.name,
                expected: FeatureType::Vector.to_string(),
                got: features.feature_type.to_string(),
            });
        }
        self.label = Some(label);
        self.features = Some(features);
        Ok(self)
    }

    pub fn set_models_to_try(&mut self, algorithms: &[Algorithm]) -> &mut Self {
        self.registry.set_models_to_try(algorithms);
        self
    }

    /// Replace the value list of one hyperparameter of one candidate.
    pub fn set_param(
        &mut self,
        algorithm: Algorithm,
        name: &str,
        values: Vec<ParamValue>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.registry.set_param(algorithm, name, values)?;
        Ok(self)
    }

    /// Replace a candidate and its whole grid.
    pub fn set_candidate(&mut self, spec: CandidateSpec) -> &mut Self {
        self.registry.set_candidate(spec);
        self
    }

    pub fn set_logistic_regression_reg_param(
        &mut self,
        values: &[f64],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::LogisticRegression, "reg_param", floats(values))
    }

    pub fn set_logistic_regression_max_iter(
        &mut self,
        values: &[usize],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::LogisticRegression, "max_iter", ints(values))
    }

    pub fn set_random_forest_num_trees(
        &mut self,
        values: &[usize],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::RandomForest, "num_trees", ints(values))
    }

    pub fn set_random_forest_max_depth(
        &mut self,
        values: &[usize],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::RandomForest, "max_depth", ints(values))
    }

    pub fn set_random_forest_impurity(
        &mut self,
        values: &[Impurity],
    ) -> Result<&mut Self, ConfigurationError> {
        let values = values.iter().map(|i| ParamValue::from(i.as_str())).collect();
        self.set_param(Algorithm::RandomForest, "impurity", values)
    }

    pub fn set_decision_tree_max_depth(
        &mut self,
        values: &[usize],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::DecisionTree, "max_depth", ints(values))
    }

    pub fn set_decision_tree_min_info_gain(
        &mut self,
        values: &[f64],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::DecisionTree, "min_info_gain", floats(values))
    }

    pub fn set_naive_bayes_var_smoothing(
        &mut self,
        values: &[f64],
    ) -> Result<&mut Self, ConfigurationError> {
        self.set_param(Algorithm::NaiveBayes, "var_smoothing", floats(values))
    }

    pub fn set_validation(&mut self, strategy: ValidationStrategy) -> &mut Self {
        self.validator.strategy = strategy;
        self
    }

    pub fn set_validation_metric(&mut self, metric: ValidationMetric) -> &mut Self {
        self.validator.metric = metric;
        self
    }

    /// Extra evaluator, reported during validation and in the eval records.
    pub fn add_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) -> &mut Self {
        self.validator.auxiliary.push(evaluator);
        self
    }

    /// Reserve a test partition and filter labels before validation.
    /// `None` trains and validates on every row.
    pub fn set_splitter(&mut self, splitter: Option<DataSplitter>) -> &mut Self {
        self.splitter = splitter;
        self
    }

    pub fn set_parallelism(&mut self, threads: usize) -> &mut Self {
        self.validator.parallelism = Some(threads);
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.validator.timeout = Some(timeout);
        self
    }

    /// Per-class decision thresholds applied by every candidate. Checked
    /// against the number of classes at fit time.
    pub fn set_model_thresholds(&mut self, thresholds: Vec<f64>) -> &mut Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Skip the search and use `estimator` as the selected model.
    pub fn set_best_estimator(&mut self, estimator: BestEstimator) -> &mut Self {
        self.best_estimator = Some(estimator);
        self
    }

    pub fn set_custom_param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.custom_params.insert(key.into(), value.into());
        self
    }

    pub fn registry(&self) -> &CandidateRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Number of trials a fit would run; zero when a best estimator is set.
    pub fn trial_count(&self) -> usize {
        if self.best_estimator.is_some() {
            0
        } else {
            self.registry.trial_count()
        }
    }

    /// Evaluators used for the training and holdout records: the validation
    /// evaluator first, then the extra ones, without duplicate names.
    pub fn evaluators(&self) -> Vec<Arc<dyn Evaluator>> {
        let mut out: Vec<Arc<dyn Evaluator>> = vec![self.validator.metric.evaluator().clone()];
        for e in &self.validator.auxiliary {
            if !out.iter().any(|o| o.name() == e.name()) {
                out.push(e.clone());
            }
        }
        out
    }

    /// Split, search (or take the injected estimator), retrain and record
    /// the training metrics.
    pub fn fit(&self, data: &Dataset) -> SelectorResult<FittedModelSelector> {
        let (label, features) = match (&self.label, &self.features) {
            (Some(l), Some(f)) => (l.clone(), f.clone()),
            _ => return Err(ConfigurationError::InputsNotSet.into()),
        };
        if self.best_estimator.is_some() && self.thresholds.is_some() {
            return Err(ConfigurationError::ThresholdsWithOverride.into());
        }
        let found = data.class_set().len();
        if found < 2 {
            return Err(FitError::TooFewClasses { found }.into());
        }

        let (train, test, split_summary) = match &self.splitter {
            Some(splitter) => {
                let prepared = splitter.prepare(data)?;
                (prepared.train, prepared.test, Some(prepared.summary))
            }
            None => (data.clone(), Dataset::empty(data.dim()), None),
        };
        if train.is_empty() {
            return Err(FitError::EmptyTrainingPartition.into());
        }
        let num_classes = train.class_set().len();
        if num_classes < 2 {
            return Err(FitError::TooFewClasses { found: num_classes }.into());
        }
        if let Some(t) = &self.thresholds {
            validate_thresholds(t, num_classes)?;
        }

        if let Some(estimator) = &self.best_estimator {
            check_dim(estimator.model.num_features(), data.dim())?;
        }

        info!(
            uid = %self.uid,
            rows = data.len(),
            train = train.len(),
            test = test.len(),
            classes = num_classes,
            "fitting model selector"
        );

        let (model, mut summary) = match &self.best_estimator {
            Some(estimator) => {
                info!(name = %estimator.name, "using injected best estimator, skipping search");
                let mut summary = self.summary(&estimator.model, estimator.name.clone(), split_summary);
                summary.merge_extra(&estimator.metadata);
                (estimator.model.clone(), summary)
            }
            None => {
                let mut validator = self.validator.clone();
                validator.thresholds = self.thresholds.clone();
                let outcome = validator.validate(&self.registry, &train)?;
                let name = outcome.best.algorithm().name().to_string();
                let mut summary = self.summary(&outcome.best, name, split_summary);
                summary.validation = Some(validator.strategy.clone());
                summary.evaluation_metric = Some(outcome.metric_key);
                summary.best_validation_metric = Some(outcome.metric_value);
                summary.validation_results = outcome.trials;
                summary.trials_run = outcome.trials_run;
                (outcome.best, summary)
            }
        };

        let (eval_rows, source) = if test.is_empty() {
            (&train, TrainingEvalSource::TrainPartition)
        } else {
            (&test, TrainingEvalSource::TestPartition)
        };
        summary.training_eval_source = source;
        let evaluators = self.evaluators();
        let training_eval = evaluate_all(&evaluators, &model.evaluation_data(eval_rows));

        info!(
            best = %summary.best_model_name,
            params = %model.params,
            trials = summary.trials_run,
            "model selector fitted"
        );

        Ok(FittedModelSelector {
            uid: self.uid.clone(),
            columns: OutputColumns::new(&label.name, &features.name, &self.uid),
            label,
            features,
            model: Arc::new(model),
            metadata: SelectorMetadata {
                summary,
                training_eval,
                holdout_eval: None,
            },
            evaluators,
        })
    }

    fn summary(
        &self,
        model: &SelectedModel,
        name: String,
        data_split: Option<SplitSummary>,
    ) -> SelectorSummary {
        SelectorSummary {
            best_model_name: name,
            best_model_type: model.algorithm(),
            best_hyperparameters: model.params.assignment(),
            validation: None,
            evaluation_metric: None,
            best_validation_metric: None,
            validation_results: Vec::new(),
            data_split,
            training_eval_source: TrainingEvalSource::TrainPartition,
            trials_run: 0,
            custom_params: self.custom_params.clone(),
            extra: BTreeMap::new(),
        }
    }
}

fn check_dim(expected: usize, got: usize) -> Result<(), ConfigurationError> {
    if expected == got {
        Ok(())
    } else {
        Err(ConfigurationError::DimensionMismatch {
            row: 0,
            expected,
            got,
        })
    }
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

fn ints(values: &[usize]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::from(v)).collect()
}

// ─── Fitted selector ────────────────────────────────────────────────────────

/// Stage-1 transformer bound to the selected model, plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModelSelector {
    uid: String,
    label: InputColumn,
    features: InputColumn,
    columns: OutputColumns,
    model: Arc<SelectedModel>,
    metadata: SelectorMetadata,
    #[serde(default, with = "evaluator_names")]
    evaluators: Vec<Arc<dyn Evaluator>>,
}

/// Evaluators persist by name. Built-in ones are rebuilt on load; custom
/// closures cannot be, and are dropped with a warning.
mod evaluator_names {
    use super::*;

    pub fn serialize<S: Serializer>(
        evaluators: &[Arc<dyn Evaluator>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(evaluators.iter().map(|e| e.name()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Arc<dyn Evaluator>>, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(names
            .iter()
            .filter_map(|name| match builtin_evaluator(name) {
                Ok(e) => Some(e),
                Err(_) => {
                    warn!(evaluator = %name, "custom evaluator not restored, set it again");
                    None
                }
            })
            .collect())
    }
}

impl FittedModelSelector {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn label(&self) -> &InputColumn {
        &self.label
    }

    pub fn features(&self) -> &InputColumn {
        &self.features
    }

    pub fn columns(&self) -> &OutputColumns {
        &self.columns
    }

    pub fn model(&self) -> &SelectedModel {
        &self.model
    }

    pub fn shared_model(&self) -> Arc<SelectedModel> {
        Arc::clone(&self.model)
    }

    pub fn metadata(&self) -> &SelectorMetadata {
        &self.metadata
    }

    pub fn best_model_name(&self) -> &str {
        &self.metadata.summary.best_model_name
    }

    /// Trials the validator trained; zero for an injected estimator.
    pub fn trials_run(&self) -> usize {
        self.metadata.summary.trials_run
    }

    pub fn training_eval(&self) -> &MetricsRecord {
        &self.metadata.training_eval
    }

    pub fn holdout_eval(&self) -> Option<&MetricsRecord> {
        self.metadata.holdout_eval.as_ref()
    }

    pub fn evaluators(&self) -> &[Arc<dyn Evaluator>] {
        &self.evaluators
    }

    /// Replace the holdout evaluators, e.g. to restore custom ones after a
    /// reload.
    pub fn set_evaluators(&mut self, evaluators: Vec<Arc<dyn Evaluator>>) {
        self.evaluators = evaluators;
    }

    /// Stage 1: the predicted label of one row.
    pub fn predict_row(&self, features: &Features) -> Result<f64, ConfigurationError> {
        check_dim(self.model.num_features(), features.len())?;
        Ok(self.model.predict(&features.to_dense()))
    }

    pub fn cascade(&self) -> Result<OutputCascade, ConfigurationError> {
        OutputCascade::new(self)
    }

    /// Run all three stages over `data`.
    pub fn transform(&self, data: &Dataset) -> Result<Vec<ScoredRow>, ConfigurationError> {
        self.cascade()?.score(data)
    }

    /// Score `data` with the configured evaluators and store the result as
    /// `HoldOutEval`, replacing any earlier one.
    pub fn evaluate_model(
        &mut self,
        data: &Dataset,
    ) -> Result<&MetricsRecord, ConfigurationError> {
        if self.evaluators.is_empty() {
            return Err(ConfigurationError::NoEvaluators);
        }
        if !data.is_empty() {
            check_dim(self.model.num_features(), data.dim())?;
        }
        let record = evaluate_all(&self.evaluators, &self.model.evaluation_data(data));
        info!(uid = %self.uid, rows = data.len(), metrics = record.len(), "holdout evaluation");
        Ok(self.metadata.holdout_eval.insert(record))
    }
}
