//! Trial evaluation: every grid point of every enabled candidate is trained
//! and scored on each fold, then the best one is retrained on all rows.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use oxidize_select_core::{
    ClassSet, ConfigurationError, Dataset, FitError, ParamValue, SelectorError, TrainingSet,
    TrialFailure,
};
use oxidize_select_metrics::{evaluate_all, metric_key, Direction, Evaluator, MultiClassEvaluator};
use oxidize_select_preprocessing::{k_folds, train_validation_split, DataSplitter, Fold};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::registry::{CandidateRegistry, PlannedTrial, SelectedModel};

/// How trials are scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValidationStrategy {
    CrossValidation {
        num_folds: usize,
        seed: u64,
        #[serde(default)]
        stratify: bool,
    },
    TrainValidationSplit {
        train_ratio: f64,
        seed: u64,
        #[serde(default)]
        stratify: bool,
    },
}

impl Default for ValidationStrategy {
    fn default() -> Self {
        ValidationStrategy::cross_validation(3)
    }
}

impl ValidationStrategy {
    pub const DEFAULT_SEED: u64 = 42;

    pub fn cross_validation(num_folds: usize) -> Self {
        ValidationStrategy::CrossValidation {
            num_folds,
            seed: Self::DEFAULT_SEED,
            stratify: false,
        }
    }

    pub fn train_validation_split(train_ratio: f64) -> Self {
        ValidationStrategy::TrainValidationSplit {
            train_ratio,
            seed: Self::DEFAULT_SEED,
            stratify: false,
        }
    }

    pub fn with_seed(mut self, new_seed: u64) -> Self {
        match &mut self {
            ValidationStrategy::CrossValidation { seed, .. }
            | ValidationStrategy::TrainValidationSplit { seed, .. } => *seed = new_seed,
        }
        self
    }

    pub fn with_stratify(mut self, on: bool) -> Self {
        match &mut self {
            ValidationStrategy::CrossValidation { stratify, .. }
            | ValidationStrategy::TrainValidationSplit { stratify, .. } => *stratify = on,
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match *self {
            ValidationStrategy::CrossValidation { num_folds, .. } if num_folds < 2 => {
                Err(ConfigurationError::TooFewFolds(num_folds))
            }
            ValidationStrategy::TrainValidationSplit { train_ratio, .. }
                if !(train_ratio > 0.0 && train_ratio < 1.0) =>
            {
                Err(ConfigurationError::InvalidRatio {
                    name: "train_ratio",
                    range: "(0, 1)",
                    value: train_ratio,
                })
            }
            _ => Ok(()),
        }
    }

    /// Seeded partitions of rows with the given labels.
    pub fn folds(&self, labels: &[f64]) -> Result<Vec<Fold>, ConfigurationError> {
        match *self {
            ValidationStrategy::CrossValidation {
                num_folds,
                seed,
                stratify,
            } => k_folds(labels, num_folds, seed, stratify),
            ValidationStrategy::TrainValidationSplit {
                train_ratio,
                seed,
                stratify,
            } => Ok(vec![train_validation_split(
                labels,
                train_ratio,
                seed,
                stratify,
            )?]),
        }
    }
}

/// The evaluator metric that ranks trials.
#[derive(Clone)]
pub struct ValidationMetric {
    evaluator: Arc<dyn Evaluator>,
    metric: String,
    direction: Direction,
}

impl ValidationMetric {
    /// Fails unless `evaluator` declares `metric`.
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        metric: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let metric = metric.into();
        let direction =
            evaluator
                .direction(&metric)
                .ok_or_else(|| ConfigurationError::UnknownMetric {
                    evaluator: evaluator.name().to_string(),
                    metric: metric.clone(),
                })?;
        Ok(ValidationMetric {
            evaluator,
            metric,
            direction,
        })
    }

    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.evaluator
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `{evaluator}_{metric}`.
    pub fn key(&self) -> String {
        metric_key(self.evaluator.name(), &self.metric)
    }
}

impl Default for ValidationMetric {
    fn default() -> Self {
        ValidationMetric {
            evaluator: Arc::new(MultiClassEvaluator),
            metric: MultiClassEvaluator::F1.to_string(),
            direction: Direction::LargerIsBetter,
        }
    }
}

impl std::fmt::Debug for ValidationMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationMetric")
            .field("key", &self.key())
            .field("direction", &self.direction)
            .finish()
    }
}

/// Outcome of one trial, kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialSummary {
    pub index: usize,
    pub model_name: String,
    pub params: BTreeMap<String, ParamValue>,
    /// Validation metric averaged over folds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux_metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub skipped: bool,
}

/// What a validator run produced.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub best: SelectedModel,
    pub best_trial: usize,
    pub metric_key: String,
    pub metric_value: f64,
    pub trials: Vec<TrialSummary>,
    /// Trials trained on at least one fold.
    pub trials_run: usize,
}

/// Runs every planned trial against the validation folds.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    pub strategy: ValidationStrategy,
    pub metric: ValidationMetric,
    pub auxiliary: Vec<Arc<dyn Evaluator>>,
    /// Label filter applied once before folding.
    pub splitter: Option<DataSplitter>,
    /// Worker threads; `None` uses the global rayon pool.
    pub parallelism: Option<usize>,
    pub timeout: Option<Duration>,
    pub thresholds: Option<Vec<f64>>,
}

struct FoldScore {
    metric: f64,
    aux: BTreeMap<String, f64>,
}

enum JobOutcome {
    Done(Result<FoldScore, String>),
    Skipped,
}

/// Fold data materialized once and shared by every job.
struct PreparedFold {
    train: TrainingSet,
    validation: Dataset,
}

impl Validator {
    pub fn new(strategy: ValidationStrategy) -> Self {
        Validator {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: ValidationMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_auxiliary(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.auxiliary.push(evaluator);
        self
    }

    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply `splitter`'s label filter to the data before folds are built.
    pub fn with_splitter(mut self, splitter: DataSplitter) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Evaluate every enabled trial of `registry` on `data` and retrain the
    /// best one on all of `data`.
    pub fn validate(
        &self,
        registry: &CandidateRegistry,
        data: &Dataset,
    ) -> Result<ValidationOutcome, SelectorError> {
        self.strategy.validate()?;
        let plan = registry.plan()?;

        let data: Cow<'_, Dataset> = match &self.splitter {
            Some(splitter) => {
                splitter.validate()?;
                Cow::Owned(splitter.filter_labels(data).0)
            }
            None => Cow::Borrowed(data),
        };
        let classes = data.class_set();
        if classes.len() < 2 {
            return Err(FitError::TooFewClasses {
                found: classes.len(),
            }
            .into());
        }

        let folds = self.strategy.folds(&data.labels())?;
        let prepared = folds
            .iter()
            .map(|fold| {
                Ok(PreparedFold {
                    train: data.select(&fold.train).training_set(&classes)?,
                    validation: data.select(&fold.validation),
                })
            })
            .collect::<Result<Vec<_>, SelectorError>>()?;

        info!(
            trials = plan.len(),
            folds = prepared.len(),
            rows = data.len(),
            metric = %self.metric.key(),
            "starting validation"
        );

        let jobs: Vec<(usize, usize)> = plan
            .iter()
            .enumerate()
            .filter(|(_, trial)| trial.params.is_ok())
            .flat_map(|(t, _)| (0..prepared.len()).map(move |f| (t, f)))
            .collect();

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let run = || -> Vec<JobOutcome> {
            jobs.par_iter()
                .map(|&(t, f)| {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return JobOutcome::Skipped;
                    }
                    JobOutcome::Done(self.run_job(&plan[t], &prepared[f], &classes))
                })
                .collect()
        };
        let outcomes = match self.parallelism {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| ConfigurationError::ThreadPool(e.to_string()))?
                .install(run),
            None => run(),
        };

        let mut by_trial: Vec<Vec<JobOutcome>> = plan.iter().map(|_| Vec::new()).collect();
        for (&(t, _), outcome) in jobs.iter().zip(outcomes) {
            by_trial[t].push(outcome);
        }

        let mut summaries = Vec::with_capacity(plan.len());
        let mut failures = Vec::new();
        for (index, (trial, outcomes)) in plan.iter().zip(by_trial).enumerate() {
            let summary = self.reduce_trial(index, trial, outcomes, &mut failures);
            summaries.push(summary);
        }

        if summaries.iter().all(|s| s.metric.is_none()) && summaries.iter().any(|s| s.skipped) {
            warn!("timeout reached before any trial completed, running trials sequentially");
            for index in 0..plan.len() {
                if !summaries[index].skipped {
                    continue;
                }
                let outcomes = prepared
                    .iter()
                    .map(|fold| JobOutcome::Done(self.run_job(&plan[index], fold, &classes)))
                    .collect();
                summaries[index] = self.reduce_trial(index, &plan[index], outcomes, &mut failures);
                if summaries[index].metric.is_some() {
                    break;
                }
            }
        }

        let trials_run = summaries.iter().filter(|s| !s.skipped).count();
        let mut best: Option<(usize, f64)> = None;
        for s in &summaries {
            if let Some(value) = s.metric {
                let better = match best {
                    None => true,
                    Some((_, incumbent)) => self.metric.direction().is_better(value, incumbent),
                };
                if better {
                    best = Some((s.index, value));
                }
            }
        }
        let (best_trial, metric_value) = match best {
            Some(b) => b,
            None => return Err(FitError::AllTrialsFailed { failures }.into()),
        };

        let params = match &plan[best_trial].params {
            Ok(p) => p.clone(),
            Err(e) => return Err(FitError::Learn(e.clone()).into()),
        };
        info!(
            trial = best_trial,
            model = %params.algorithm(),
            params = %params,
            metric = metric_value,
            "best trial selected, retraining on all rows"
        );
        let model = params.fit(&data.training_set(&classes)?)?;

        Ok(ValidationOutcome {
            best: SelectedModel {
                params,
                classes,
                model,
                thresholds: self.thresholds.clone(),
            },
            best_trial,
            metric_key: self.metric.key(),
            metric_value,
            trials: summaries,
            trials_run,
        })
    }

    fn run_job(
        &self,
        trial: &PlannedTrial,
        fold: &PreparedFold,
        classes: &ClassSet,
    ) -> Result<FoldScore, String> {
        let params = trial.params.as_ref().map_err(|e| e.to_string())?;
        let model = params.fit(&fold.train).map_err(|e| e.to_string())?;
        let selected = SelectedModel {
            params: params.clone(),
            classes: classes.clone(),
            model,
            thresholds: self.thresholds.clone(),
        };
        let scored = selected.evaluation_data(&fold.validation);

        let values = self
            .metric
            .evaluator()
            .evaluate(&scored)
            .map_err(|e| e.to_string())?;
        let metric = values
            .get(self.metric.metric())
            .copied()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("metric {} unavailable", self.metric.key()))?;

        Ok(FoldScore {
            metric,
            aux: evaluate_all(&self.auxiliary, &scored),
        })
    }

    fn reduce_trial(
        &self,
        index: usize,
        trial: &PlannedTrial,
        outcomes: Vec<JobOutcome>,
        failures: &mut Vec<TrialFailure>,
    ) -> TrialSummary {
        let mut summary = TrialSummary {
            index,
            model_name: trial.algorithm.name().to_string(),
            params: trial
                .params
                .as_ref()
                .map(|p| p.assignment())
                .unwrap_or_default(),
            metric: None,
            aux_metrics: BTreeMap::new(),
            error: None,
            skipped: false,
        };

        if let Err(e) = &trial.params {
            summary.error = Some(e.to_string());
            self.record_failure(index, trial, None, e.to_string(), failures);
            return summary;
        }

        let mut scores = Vec::with_capacity(outcomes.len());
        for (fold, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                JobOutcome::Skipped => {
                    summary.skipped = true;
                    return summary;
                }
                JobOutcome::Done(Err(reason)) => {
                    summary.error = Some(reason.clone());
                    self.record_failure(index, trial, Some(fold), reason, failures);
                    return summary;
                }
                JobOutcome::Done(Ok(score)) => scores.push(score),
            }
        }

        let n = scores.len() as f64;
        summary.metric = Some(scores.iter().map(|s| s.metric).sum::<f64>() / n);
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for score in &scores {
            for (key, value) in &score.aux {
                let entry = sums.entry(key.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        summary.aux_metrics = sums
            .into_iter()
            .map(|(k, (sum, count))| (k, sum / count as f64))
            .collect();

        debug!(
            trial = index,
            model = %summary.model_name,
            params = %trial.description,
            metric = ?summary.metric,
            "trial finished"
        );
        summary
    }

    fn record_failure(
        &self,
        index: usize,
        trial: &PlannedTrial,
        fold: Option<usize>,
        reason: String,
        failures: &mut Vec<TrialFailure>,
    ) {
        let failure = TrialFailure {
            trial: index,
            model: trial.algorithm.name().to_string(),
            params: trial.description.clone(),
            fold,
            reason,
        };
        warn!(%failure, "trial failed");
        failures.push(failure);
    }
}
