use std::fs;
use std::path::Path;

use oxidize_select_selection::{FittedModelSelector, SelectorParams};
use tracing::info;

use crate::error::IoResult;

/// Save a fitted selector (model, columns and metadata) as pretty JSON.
pub fn save_selector(selector: &FittedModelSelector, path: impl AsRef<Path>) -> IoResult<()> {
    let json = serde_json::to_string_pretty(selector)?;
    fs::write(path.as_ref(), json)?;
    info!(path = %path.as_ref().display(), uid = selector.uid(), "saved selector");
    Ok(())
}

/// Load a selector written by [`save_selector`].
///
/// Built-in evaluators are restored by name. Custom ones are not; call
/// `set_evaluators` to bring them back before `evaluate_model`.
pub fn load_selector(path: impl AsRef<Path>) -> IoResult<FittedModelSelector> {
    let json = fs::read_to_string(path.as_ref())?;
    let selector: FittedModelSelector = serde_json::from_str(&json)?;
    Ok(selector)
}

/// Read selector parameters from a JSON file.
pub fn load_params(path: impl AsRef<Path>) -> IoResult<SelectorParams> {
    let json = fs::read_to_string(path.as_ref())?;
    Ok(SelectorParams::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidize_select_core::ConfigurationError;
    use oxidize_select_datasets::three_clusters;
    use oxidize_select_metrics::{CustomEvaluator, Direction, Evaluator};
    use oxidize_select_selection::{Algorithm, InputColumn, ModelSelector, ValidationMetric};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("oxidize-select-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_selector_round_trip() {
        let data = three_clusters();
        let mut selector = ModelSelector::new();
        selector
            .set_input(InputColumn::real_nn("label"), InputColumn::vector("features"))
            .unwrap();
        selector.set_models_to_try(&[Algorithm::NaiveBayes]);
        let fitted = selector.fit(&data).unwrap();

        let path = temp_path("selector.json");
        save_selector(&fitted, &path).unwrap();
        let loaded = load_selector(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.uid(), fitted.uid());
        assert_eq!(loaded.metadata(), fitted.metadata());
        assert_eq!(loaded.columns(), fitted.columns());
        assert_eq!(loaded.evaluators().len(), 1);
        for row in data.iter() {
            assert_eq!(loaded.predict_row(&row.features), fitted.predict_row(&row.features));
            assert_eq!(
                loaded.model().predict_raw(&row.features.to_dense()),
                fitted.model().predict_raw(&row.features.to_dense())
            );
        }
    }

    #[test]
    fn test_reloaded_selector_reevaluates() {
        let data = three_clusters();
        let mut selector = ModelSelector::new();
        selector
            .set_input(InputColumn::real_nn("label"), InputColumn::vector("features"))
            .unwrap();
        selector.set_models_to_try(&[Algorithm::DecisionTree]);
        let mut fitted = selector.fit(&data).unwrap();

        let path = temp_path("reevaluate.json");
        save_selector(&fitted, &path).unwrap();
        let mut loaded = load_selector(&path).unwrap();
        fs::remove_file(&path).ok();

        let expected = fitted.evaluate_model(&data).unwrap().clone();
        let holdout = loaded.evaluate_model(&data).unwrap();
        assert!(!holdout.is_empty());
        assert_eq!(holdout, &expected);
    }

    #[test]
    fn test_custom_evaluator_needs_restoring() {
        let data = three_clusters();
        let custom: Arc<dyn Evaluator> = Arc::new(CustomEvaluator::new(
            "Rows",
            "count",
            Direction::LargerIsBetter,
            |d| Ok(d.len() as f64),
        ));
        let mut selector = ModelSelector::new();
        selector
            .set_input(InputColumn::real_nn("label"), InputColumn::vector("features"))
            .unwrap();
        selector
            .set_models_to_try(&[Algorithm::NaiveBayes])
            .set_validation_metric(ValidationMetric::new(custom.clone(), "count").unwrap());
        let fitted = selector.fit(&data).unwrap();

        let path = temp_path("custom.json");
        save_selector(&fitted, &path).unwrap();
        let mut loaded = load_selector(&path).unwrap();
        fs::remove_file(&path).ok();

        assert!(loaded.evaluators().is_empty());
        assert_eq!(
            loaded.evaluate_model(&data).unwrap_err(),
            ConfigurationError::NoEvaluators
        );
        assert!(loaded.holdout_eval().is_none());

        loaded.set_evaluators(vec![custom]);
        assert_eq!(loaded.evaluate_model(&data).unwrap()["Rows_count"], 22.0);
    }

    #[test]
    fn test_load_params_file() {
        let path = temp_path("params.json");
        fs::write(&path, r#"{ "modelsToTry": ["NaiveBayes"], "parallelism": 2 }"#).unwrap();
        let params = load_params(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(params.models_to_try, Some(vec![Algorithm::NaiveBayes]));
        assert_eq!(params.parallelism, Some(2));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_selector(temp_path("missing.json")),
            Err(crate::IoError::Io(_))
        ));
    }
}
