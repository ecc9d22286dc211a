//! Selection provenance and evaluation records attached to a fitted selector.

use std::collections::BTreeMap;

use oxidize_select_core::ParamValue;
use oxidize_select_preprocessing::SplitSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::registry::Algorithm;
use crate::validator::{TrialSummary, ValidationStrategy};

/// `{evaluator}_{metric}` -> value.
pub type MetricsRecord = BTreeMap<String, f64>;

/// Which rows the training metrics were computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrainingEvalSource {
    /// The partition reserved by the data splitter.
    TestPartition,
    /// The training partition, used when nothing was reserved.
    TrainPartition,
}

/// Keys owned by `SelectorSummary` itself.
pub const RESERVED_SUMMARY_KEYS: &[&str] = &[
    "bestModelName",
    "bestModelType",
    "bestHyperparameters",
    "validation",
    "evaluationMetric",
    "bestValidationMetric",
    "validationResults",
    "dataSplit",
    "trainingEvalSource",
    "trialsRun",
    "customParams",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSummary {
    pub best_model_name: String,
    pub best_model_type: Algorithm,
    pub best_hyperparameters: BTreeMap<String, ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_validation_metric: Option<f64>,
    #[serde(default)]
    pub validation_results: Vec<TrialSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_split: Option<SplitSummary>,
    pub training_eval_source: TrainingEvalSource,
    pub trials_run: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_params: BTreeMap<String, Value>,
    /// Open-ended provenance, e.g. the metadata of an injected estimator.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SelectorSummary {
    /// Merge `entries` into the extra bag; keys owned by the summary are skipped.
    pub fn merge_extra(&mut self, entries: &BTreeMap<String, Value>) {
        for (key, value) in entries {
            if RESERVED_SUMMARY_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "ignoring metadata entry that shadows a summary key");
                continue;
            }
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Metadata tree of a fitted selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorMetadata {
    pub summary: SelectorSummary,
    #[serde(rename = "TrainingEval")]
    pub training_eval: MetricsRecord,
    #[serde(rename = "HoldOutEval", default, skip_serializing_if = "Option::is_none")]
    pub holdout_eval: Option<MetricsRecord>,
}

impl SelectorMetadata {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
