//! Serializable selector configuration, for building a `ModelSelector` from
//! a JSON document instead of setter calls.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use oxidize_select_core::{ConfigurationError, ParamValue};
use oxidize_select_metrics::{Evaluator, LogLossEvaluator, MultiClassEvaluator};
use oxidize_select_preprocessing::DataSplitter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::Algorithm;
use crate::selector::{InputColumn, ModelSelector};
use crate::validator::{ValidationMetric, ValidationStrategy};

/// `{ "evaluator": "MultiClass", "metric": "F1" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricChoice {
    pub evaluator: String,
    pub metric: String,
}

/// Everything a `ModelSelector` can be configured with, minus custom
/// evaluators and injected estimators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectorParams {
    pub label: Option<InputColumn>,
    pub features: Option<InputColumn>,
    pub models_to_try: Option<Vec<Algorithm>>,
    /// Per-algorithm value lists, layered over the default grids.
    pub grids: BTreeMap<Algorithm, BTreeMap<String, Vec<ParamValue>>>,
    pub validation: Option<ValidationStrategy>,
    pub validation_metric: Option<MetricChoice>,
    /// Extra built-in evaluators by name.
    pub evaluators: Vec<String>,
    /// `None` keeps the default splitter.
    pub splitter: Option<DataSplitter>,
    pub disable_splitter: bool,
    pub parallelism: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub model_thresholds: Option<Vec<f64>>,
    pub custom_params: BTreeMap<String, Value>,
}

impl SelectorParams {
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidParams(e.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Built-in evaluator by name, case-insensitive.
pub fn builtin_evaluator(name: &str) -> Result<Arc<dyn Evaluator>, ConfigurationError> {
    if name.eq_ignore_ascii_case(MultiClassEvaluator::NAME) {
        Ok(Arc::new(MultiClassEvaluator))
    } else if name.eq_ignore_ascii_case(LogLossEvaluator::NAME) {
        Ok(Arc::new(LogLossEvaluator))
    } else {
        Err(ConfigurationError::UnknownEvaluator(name.to_string()))
    }
}

impl ModelSelector {
    /// Build a selector from `params`. Every value is checked here, so a
    /// selector built this way only fails at fit time on data problems.
    pub fn from_params(params: &SelectorParams) -> Result<Self, ConfigurationError> {
        let mut selector = ModelSelector::new();
        match (&params.label, &params.features) {
            (Some(label), Some(features)) => {
                selector.set_input(label.clone(), features.clone())?;
            }
            (None, None) => {}
            _ => return Err(ConfigurationError::InputsNotSet),
        }
        if let Some(models) = &params.models_to_try {
            selector.set_models_to_try(models);
        }
        for (&algorithm, grid) in &params.grids {
            for (name, values) in grid {
                selector.set_param(algorithm, name, values.clone())?;
            }
        }
        if let Some(strategy) = &params.validation {
            strategy.validate()?;
            selector.set_validation(strategy.clone());
        }
        if let Some(choice) = &params.validation_metric {
            let metric = ValidationMetric::new(builtin_evaluator(&choice.evaluator)?, &choice.metric)?;
            selector.set_validation_metric(metric);
        }
        for name in &params.evaluators {
            selector.add_evaluator(builtin_evaluator(name)?);
        }
        if params.disable_splitter {
            selector.set_splitter(None);
        } else if let Some(splitter) = &params.splitter {
            splitter.validate()?;
            selector.set_splitter(Some(splitter.clone()));
        }
        if let Some(threads) = params.parallelism {
            selector.set_parallelism(threads);
        }
        if let Some(ms) = params.timeout_ms {
            selector.set_timeout(Duration::from_millis(ms));
        }
        if let Some(thresholds) = &params.model_thresholds {
            selector.set_model_thresholds(thresholds.clone());
        }
        for (key, value) in &params.custom_params {
            selector.set_custom_param(key.clone(), value.clone());
        }
        Ok(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = r#"{
        "label": { "name": "label", "feature_type": "RealNN" },
        "features": { "name": "features", "feature_type": "Vector" },
        "modelsToTry": ["DecisionTree", "NaiveBayes"],
        "grids": { "DecisionTree": { "max_depth": [2, 4] } },
        "validation": { "type": "TrainValidationSplit", "train_ratio": 0.75, "seed": 3, "stratify": true },
        "validationMetric": { "evaluator": "multiclass", "metric": "Error" },
        "evaluators": ["LogLoss"],
        "timeoutMs": 5000,
        "customParams": { "owner": "fraud" }
    }"#;

    #[test]
    fn test_params_build_selector() {
        let params = SelectorParams::from_json(PARAMS).unwrap();
        let selector = ModelSelector::from_params(&params).unwrap();
        assert_eq!(
            selector.registry().enabled(),
            &[Algorithm::DecisionTree, Algorithm::NaiveBayes]
        );
        // max_depth {2, 4} x default impurity {gini, entropy}, plus 2 NB points
        assert_eq!(selector.trial_count(), 4 + 2);
        assert_eq!(selector.validator().metric.key(), "MultiClass_Error");
        assert_eq!(selector.validator().timeout, Some(Duration::from_secs(5)));
        let names: Vec<String> = selector
            .evaluators()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["MultiClass", "LogLoss"]);
    }

    #[test]
    fn test_unknown_evaluator() {
        let params = SelectorParams {
            evaluators: vec!["AUROC".into()],
            ..SelectorParams::default()
        };
        assert_eq!(
            ModelSelector::from_params(&params).unwrap_err(),
            ConfigurationError::UnknownEvaluator("AUROC".into())
        );
    }

    #[test]
    fn test_unknown_grid_parameter() {
        let params = SelectorParams {
            grids: BTreeMap::from([(
                Algorithm::NaiveBayes,
                BTreeMap::from([("alpha".to_string(), vec![ParamValue::Float(1.0)])]),
            )]),
            ..SelectorParams::default()
        };
        assert!(matches!(
            ModelSelector::from_params(&params),
            Err(ConfigurationError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_half_set_inputs_rejected() {
        let params = SelectorParams {
            label: Some(InputColumn::real_nn("label")),
            ..SelectorParams::default()
        };
        assert_eq!(
            ModelSelector::from_params(&params).unwrap_err(),
            ConfigurationError::InputsNotSet
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SelectorParams::from_json("{ \"parallelism\": \"lots\" }"),
            Err(ConfigurationError::InvalidParams(_))
        ));
    }
}
