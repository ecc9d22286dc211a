//! Evaluator framework.
//!
//! Every evaluator returns a map from metric name to value, so single-metric
//! and multi-metric evaluators share one contract. The optimization direction
//! of each metric is declared by the evaluator and consumed by model
//! selection; it is never guessed from the metric name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use oxidize_select_core::{ClassSet, EvaluationError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classification::{accuracy, f1_macro, log_loss, precision_macro, recall_macro};

/// Whether larger or smaller metric values are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    LargerIsBetter,
    SmallerIsBetter,
}

impl Direction {
    /// Strictly better: equal values never replace the incumbent.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::LargerIsBetter => candidate > incumbent,
            Direction::SmallerIsBetter => candidate < incumbent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub direction: Direction,
}

impl MetricDescriptor {
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        MetricDescriptor {
            name: name.into(),
            direction,
        }
    }
}

pub type MetricValues = BTreeMap<String, f64>;

/// One scored row: true label, predicted label and the class-indexed vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub label: f64,
    pub prediction: f64,
    pub raw_scores: Vec<f64>,
    pub probability: Vec<f64>,
}

/// Input of an evaluator: scored rows plus the class indexing of their vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationData {
    pub classes: ClassSet,
    pub points: Vec<ScoredPoint>,
}

impl EvaluationData {
    pub fn new(classes: ClassSet, points: Vec<ScoredPoint>) -> Self {
        EvaluationData { classes, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.label).collect()
    }

    pub fn predictions(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.prediction).collect()
    }

    pub fn probabilities(&self) -> Vec<Vec<f64>> {
        self.points.iter().map(|p| p.probability.clone()).collect()
    }
}

pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    /// Metrics this evaluator produces, with their directions.
    fn metrics(&self) -> Vec<MetricDescriptor>;

    fn evaluate(&self, data: &EvaluationData) -> Result<MetricValues, EvaluationError>;

    fn direction(&self, metric: &str) -> Option<Direction> {
        self.metrics()
            .into_iter()
            .find(|m| m.name == metric)
            .map(|m| m.direction)
    }
}

impl fmt::Debug for dyn Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Evaluator({})", self.name())
    }
}

// ─── Built-in evaluators ────────────────────────────────────────────────────

/// Macro-averaged precision, recall, F1 and error rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiClassEvaluator;

impl MultiClassEvaluator {
    pub const NAME: &'static str = "MultiClass";
    pub const PRECISION: &'static str = "Precision";
    pub const RECALL: &'static str = "Recall";
    pub const F1: &'static str = "F1";
    pub const ERROR: &'static str = "Error";
}

impl Evaluator for MultiClassEvaluator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metrics(&self) -> Vec<MetricDescriptor> {
        vec![
            MetricDescriptor::new(Self::PRECISION, Direction::LargerIsBetter),
            MetricDescriptor::new(Self::RECALL, Direction::LargerIsBetter),
            MetricDescriptor::new(Self::F1, Direction::LargerIsBetter),
            MetricDescriptor::new(Self::ERROR, Direction::SmallerIsBetter),
        ]
    }

    fn evaluate(&self, data: &EvaluationData) -> Result<MetricValues, EvaluationError> {
        if data.is_empty() {
            return Err(EvaluationError::new(Self::NAME, "no rows to evaluate"));
        }
        let y_true = data.labels();
        let y_pred = data.predictions();
        let mut out = MetricValues::new();
        out.insert(Self::PRECISION.into(), precision_macro(&y_true, &y_pred));
        out.insert(Self::RECALL.into(), recall_macro(&y_true, &y_pred));
        out.insert(Self::F1.into(), f1_macro(&y_true, &y_pred));
        out.insert(Self::ERROR.into(), 1.0 - accuracy(&y_true, &y_pred));
        Ok(out)
    }
}

/// Multiclass cross entropy of the predicted probabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLossEvaluator;

impl LogLossEvaluator {
    pub const NAME: &'static str = "LogLoss";
    pub const CROSS_ENTROPY: &'static str = "CrossEntropy";
}

impl Evaluator for LogLossEvaluator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metrics(&self) -> Vec<MetricDescriptor> {
        vec![MetricDescriptor::new(
            Self::CROSS_ENTROPY,
            Direction::SmallerIsBetter,
        )]
    }

    fn evaluate(&self, data: &EvaluationData) -> Result<MetricValues, EvaluationError> {
        if data.is_empty() {
            return Err(EvaluationError::new(Self::NAME, "no rows to evaluate"));
        }
        if data
            .points
            .iter()
            .any(|p| p.probability.len() != data.classes.len())
        {
            return Err(EvaluationError::new(
                Self::NAME,
                "probability vectors do not match the class set",
            ));
        }
        let value = log_loss(&data.labels(), &data.probabilities(), &data.classes);
        Ok(MetricValues::from([(Self::CROSS_ENTROPY.to_string(), value)]))
    }
}

type ScoreFn = dyn Fn(&EvaluationData) -> Result<f64, String> + Send + Sync;

/// Single-metric evaluator around a user-supplied scoring function.
#[derive(Clone)]
pub struct CustomEvaluator {
    name: String,
    metric: String,
    direction: Direction,
    func: Arc<ScoreFn>,
}

impl CustomEvaluator {
    pub fn new<F>(
        name: impl Into<String>,
        metric: impl Into<String>,
        direction: Direction,
        func: F,
    ) -> Self
    where
        F: Fn(&EvaluationData) -> Result<f64, String> + Send + Sync + 'static,
    {
        CustomEvaluator {
            name: name.into(),
            metric: metric.into(),
            direction,
            func: Arc::new(func),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }
}

impl fmt::Debug for CustomEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvaluator")
            .field("name", &self.name)
            .field("metric", &self.metric)
            .field("direction", &self.direction)
            .finish()
    }
}

impl Evaluator for CustomEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> Vec<MetricDescriptor> {
        vec![MetricDescriptor::new(self.metric.clone(), self.direction)]
    }

    fn evaluate(&self, data: &EvaluationData) -> Result<MetricValues, EvaluationError> {
        let value = (self.func)(data).map_err(|reason| EvaluationError::new(&self.name, reason))?;
        Ok(MetricValues::from([(self.metric.clone(), value)]))
    }
}

/// Record key of one metric: `{evaluator}_{metric}`.
pub fn metric_key(evaluator: &str, metric: &str) -> String {
    format!("{}_{}", evaluator, metric)
}

/// Run every evaluator and flatten the results under `metric_key`.
///
/// Evaluators that fail, and non-finite values, are logged and left out.
pub fn evaluate_all(
    evaluators: &[Arc<dyn Evaluator>],
    data: &EvaluationData,
) -> BTreeMap<String, f64> {
    let mut record = BTreeMap::new();
    for evaluator in evaluators {
        match evaluator.evaluate(data) {
            Ok(values) => {
                for (metric, value) in values {
                    if value.is_finite() {
                        record.insert(metric_key(evaluator.name(), &metric), value);
                    } else {
                        warn!(
                            evaluator = evaluator.name(),
                            metric = %metric,
                            value,
                            "dropping non-finite metric"
                        );
                    }
                }
            }
            Err(e) => warn!(error = %e, "evaluation skipped"),
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn data() -> EvaluationData {
        let classes = ClassSet::from_labels(vec![0.0, 1.0]);
        let points = vec![
            ScoredPoint {
                label: 0.0,
                prediction: 0.0,
                raw_scores: vec![2.0, 0.0],
                probability: vec![0.8, 0.2],
            },
            ScoredPoint {
                label: 1.0,
                prediction: 0.0,
                raw_scores: vec![1.0, 0.0],
                probability: vec![0.6, 0.4],
            },
            ScoredPoint {
                label: 1.0,
                prediction: 1.0,
                raw_scores: vec![0.0, 3.0],
                probability: vec![0.1, 0.9],
            },
        ];
        EvaluationData::new(classes, points)
    }

    #[test]
    fn test_multiclass_evaluator() {
        let values = MultiClassEvaluator.evaluate(&data()).unwrap();
        assert_eq!(values.len(), 4);
        assert_abs_diff_eq!(values["Error"], 1.0 / 3.0, epsilon = 1e-12);
        // class 0: P=1/2 R=1; class 1: P=1 R=1/2
        assert_abs_diff_eq!(values["Precision"], 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(values["Recall"], 0.75, epsilon = 1e-12);
        assert_eq!(
            MultiClassEvaluator.direction("Error"),
            Some(Direction::SmallerIsBetter)
        );
        assert_eq!(MultiClassEvaluator.direction("AuROC"), None);
    }

    #[test]
    fn test_custom_evaluator_declares_direction() {
        let eval = CustomEvaluator::new("Loss", "loss", Direction::SmallerIsBetter, |d| {
            Ok(d.len() as f64)
        });
        assert_eq!(eval.direction("loss"), Some(Direction::SmallerIsBetter));
        assert_eq!(eval.evaluate(&data()).unwrap()["loss"], 3.0);
    }

    #[test]
    fn test_evaluate_all_omits_failures() {
        let failing = CustomEvaluator::new("Broken", "x", Direction::LargerIsBetter, |_| {
            Err("degenerate class distribution".into())
        });
        let nan = CustomEvaluator::new("Nan", "x", Direction::LargerIsBetter, |_| Ok(f64::NAN));
        let evaluators: Vec<Arc<dyn Evaluator>> = vec![
            Arc::new(MultiClassEvaluator),
            Arc::new(LogLossEvaluator),
            Arc::new(failing),
            Arc::new(nan),
        ];
        let record = evaluate_all(&evaluators, &data());
        assert_eq!(record.len(), 5);
        assert!(record.contains_key("MultiClass_F1"));
        assert!(record.contains_key("LogLoss_CrossEntropy"));
        assert!(!record.keys().any(|k| k.starts_with("Broken") || k.starts_with("Nan")));
    }

    #[test]
    fn test_direction_is_strict() {
        assert!(!Direction::LargerIsBetter.is_better(0.5, 0.5));
        assert!(Direction::SmallerIsBetter.is_better(0.4, 0.5));
    }
}
