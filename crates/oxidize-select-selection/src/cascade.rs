//! Output cascade: prediction, raw scores and probabilities as three aligned
//! columns, whatever the algorithm or the number of classes.
//!
//! Stage 1 is `FittedModelSelector::predict_row`. Stage 2 re-runs the model's
//! scoring path to emit raw per-class scores, stage 3 normalizes those into
//! probabilities. Each stage declares its inputs, and the declaration is
//! checked when the stage is built.

use std::sync::Arc;

use oxidize_select_core::{ConfigurationError, Dataset, Features, LabeledRow};
use serde::{Deserialize, Serialize};

use crate::registry::SelectedModel;
use crate::selector::FittedModelSelector;

/// Names of the three output columns of one fitted selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputColumns {
    pub prediction: String,
    pub raw_prediction: String,
    pub probability: String,
}

impl OutputColumns {
    /// `{label}-{features}_{uid}_prediction` and siblings.
    pub fn new(label: &str, features: &str, uid: &str) -> Self {
        let stem = format!("{}-{}_{}", label, features, uid);
        OutputColumns {
            prediction: format!("{}_prediction", stem),
            raw_prediction: format!("{}_rawPrediction", stem),
            probability: format!("{}_probability", stem),
        }
    }
}

fn check_inputs(
    stage: &'static str,
    expected: Vec<String>,
    inputs: &[&str],
) -> Result<Vec<String>, ConfigurationError> {
    if expected.iter().map(String::as_str).eq(inputs.iter().copied()) {
        Ok(expected)
    } else {
        Err(ConfigurationError::StageInputMismatch {
            stage,
            expected,
            got: inputs.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Stage 2: `(label, features, prediction) -> raw scores`.
#[derive(Debug, Clone)]
pub struct RawScoreStage {
    model: Arc<SelectedModel>,
    inputs: Vec<String>,
    output: String,
}

impl RawScoreStage {
    pub const NAME: &'static str = "RawScoreStage";
    pub const ARITY: usize = 3;

    /// `inputs` must be exactly `[label, features, prediction]` of `selector`.
    pub fn new(
        selector: &FittedModelSelector,
        inputs: &[&str],
    ) -> Result<Self, ConfigurationError> {
        let expected = vec![
            selector.label().name.clone(),
            selector.features().name.clone(),
            selector.columns().prediction.clone(),
        ];
        Ok(RawScoreStage {
            model: selector.shared_model(),
            inputs: check_inputs(Self::NAME, expected, inputs)?,
            output: selector.columns().raw_prediction.clone(),
        })
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn transform(&self, _label: f64, features: &Features, _prediction: f64) -> Vec<f64> {
        self.model.predict_raw(&features.to_dense())
    }
}

/// Stage 3: `(label, features, prediction, raw scores) -> probabilities`.
#[derive(Debug, Clone)]
pub struct ProbabilityStage {
    model: Arc<SelectedModel>,
    inputs: Vec<String>,
    output: String,
}

impl ProbabilityStage {
    pub const NAME: &'static str = "ProbabilityStage";
    pub const ARITY: usize = 4;

    /// `inputs` must be exactly `[label, features, prediction, raw scores]`.
    pub fn new(
        selector: &FittedModelSelector,
        inputs: &[&str],
    ) -> Result<Self, ConfigurationError> {
        let columns = selector.columns();
        let expected = vec![
            selector.label().name.clone(),
            selector.features().name.clone(),
            columns.prediction.clone(),
            columns.raw_prediction.clone(),
        ];
        Ok(ProbabilityStage {
            model: selector.shared_model(),
            inputs: check_inputs(Self::NAME, expected, inputs)?,
            output: columns.probability.clone(),
        })
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn transform(
        &self,
        _label: f64,
        _features: &Features,
        _prediction: f64,
        raw_scores: &[f64],
    ) -> Vec<f64> {
        self.model.raw_to_probability(raw_scores)
    }
}

/// One scored row of the cascade output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: f64,
    pub prediction: f64,
    pub raw_scores: Vec<f64>,
    pub probability: Vec<f64>,
}

/// The three stages wired together.
#[derive(Debug, Clone)]
pub struct OutputCascade {
    model: Arc<SelectedModel>,
    columns: OutputColumns,
    raw: RawScoreStage,
    probability: ProbabilityStage,
}

impl OutputCascade {
    pub fn new(selector: &FittedModelSelector) -> Result<Self, ConfigurationError> {
        let columns = selector.columns().clone();
        let label = selector.label().name.as_str();
        let features = selector.features().name.as_str();
        let raw = RawScoreStage::new(selector, &[label, features, &columns.prediction])?;
        let probability = ProbabilityStage::new(
            selector,
            &[label, features, &columns.prediction, &columns.raw_prediction],
        )?;
        Ok(OutputCascade {
            model: selector.shared_model(),
            columns,
            raw,
            probability,
        })
    }

    pub fn columns(&self) -> &OutputColumns {
        &self.columns
    }

    pub fn score_row(&self, row: &LabeledRow) -> ScoredRow {
        let prediction = self.model.predict(&row.features.to_dense());
        let raw_scores = self.raw.transform(row.label, &row.features, prediction);
        let probability = self
            .probability
            .transform(row.label, &row.features, prediction, &raw_scores);
        ScoredRow {
            id: row.id.clone(),
            label: row.label,
            prediction,
            raw_scores,
            probability,
        }
    }

    /// Score every row; the feature dimensionality must match the model.
    pub fn score(&self, data: &Dataset) -> Result<Vec<ScoredRow>, ConfigurationError> {
        let expected = self.model.num_features();
        if !data.is_empty() && data.dim() != expected {
            return Err(ConfigurationError::DimensionMismatch {
                row: 0,
                expected,
                got: data.dim(),
            });
        }
        Ok(data.iter().map(|row| self.score_row(row)).collect())
    }
}
