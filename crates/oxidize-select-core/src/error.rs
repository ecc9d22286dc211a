use std::fmt;

use thiserror::Error;

use crate::params::ParamKind;

/// Errors raised by an individual trainer while fitting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LearnError {
    #[error("Invalid hyperparameter {name}: {reason}")]
    InvalidHyperparameter { name: String, reason: String },

    #[error("Empty training set")]
    EmptyTrainingSet,

    #[error("Dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Class index {index} out of range for {n_classes} classes")]
    ClassOutOfRange { index: usize, n_classes: usize },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type LearnResult<T> = Result<T, LearnError>;

/// Invalid setup detected before or at the start of fitting. Never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Input column '{column}' has type {got}, expected {expected}")]
    InvalidInput {
        column: String,
        expected: String,
        got: String,
    },

    #[error("Label and feature inputs must be set before fitting")]
    InputsNotSet,

    #[error("No candidate models enabled")]
    NoCandidates,

    #[error("Cross-validation needs at least 2 folds, got {0}")]
    TooFewFolds(usize),

    #[error("{name} must lie in {range}, got {value}")]
    InvalidRatio {
        name: &'static str,
        range: &'static str,
        value: f64,
    },

    #[error("Unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("{algorithm} has no hyperparameter named '{name}'")]
    UnknownParameter { algorithm: String, name: String },

    #[error("{algorithm}.{name} expects {expected} values, got {got}")]
    ParameterKind {
        algorithm: String,
        name: String,
        expected: ParamKind,
        got: ParamKind,
    },

    #[error("{algorithm}.{name} was given an empty value list")]
    EmptyValueList { algorithm: String, name: String },

    #[error("Stage {stage} inputs must be {expected:?}, got {got:?}")]
    StageInputMismatch {
        stage: &'static str,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Invalid model thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Model thresholds cannot be combined with a manually supplied best estimator")]
    ThresholdsWithOverride,

    #[error("Row {row} has {got} features, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("{needed} rows needed for {purpose}, got {rows}")]
    NotEnoughRows {
        purpose: &'static str,
        needed: usize,
        rows: usize,
    },

    #[error("Row {row} is invalid: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Unknown evaluator '{0}'")]
    UnknownEvaluator(String),

    #[error("Invalid selector parameters: {0}")]
    InvalidParams(String),

    #[error("Evaluator '{evaluator}' does not declare metric '{metric}'")]
    UnknownMetric { evaluator: String, metric: String },

    #[error("Thread pool: {0}")]
    ThreadPool(String),

    #[error("No evaluators configured")]
    NoEvaluators,
}

/// One (candidate, hyperparameter, fold) combination that failed to train or score.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialFailure {
    pub trial: usize,
    pub model: String,
    pub params: String,
    pub fold: Option<usize>,
    pub reason: String,
}

impl fmt::Display for TrialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trial {} {}({})", self.trial, self.model, self.params)?;
        if let Some(fold) = self.fold {
            write!(f, " fold {}", fold)?;
        }
        write!(f, ": {}", self.reason)
    }
}

fn list_failures(failures: &[TrialFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  - {}", f))
        .collect::<String>()
}

/// Fatal failure of a single fit call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("Need at least 2 distinct label classes, found {found}")]
    TooFewClasses { found: usize },

    #[error("Training partition is empty after splitting")]
    EmptyTrainingPartition,

    #[error("All {} attempted trials failed:{}", .failures.len(), list_failures(.failures))]
    AllTrialsFailed { failures: Vec<TrialFailure> },

    #[error("Training the selected model failed: {0}")]
    Learn(#[from] LearnError),
}

/// An evaluator could not compute its metrics for the given data.
/// Non-fatal: the metric is dropped from the record.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Evaluator '{evaluator}' skipped: {reason}")]
pub struct EvaluationError {
    pub evaluator: String,
    pub reason: String,
}

impl EvaluationError {
    pub fn new(evaluator: impl Into<String>, reason: impl Into<String>) -> Self {
        EvaluationError {
            evaluator: evaluator.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error returned by the model selector.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Fit error: {0}")]
    Fit(#[from] FitError),
}

impl From<LearnError> for SelectorError {
    fn from(e: LearnError) -> Self {
        SelectorError::Fit(FitError::Learn(e))
    }
}

pub type SelectorResult<T> = Result<T, SelectorError>;
