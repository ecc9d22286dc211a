use std::sync::Arc;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use oxidize_select::datasets::{load_iris, three_clusters};
use oxidize_select::io::{load_selector, save_selector};
use oxidize_select::metrics::{metric_key, EvaluationData};
use oxidize_select::prelude::*;
use oxidize_select::selection::{OutputCascade, TrainingEvalSource};
use serde_json::json;

fn selector_for(models: &[Algorithm]) -> ModelSelector {
    let mut selector = ModelSelector::new();
    selector
        .set_input(InputColumn::real_nn("label"), InputColumn::vector("features"))
        .unwrap()
        .set_models_to_try(models);
    selector
}

/// Mean negative log probability of the true class.
fn cross_entropy(data: &EvaluationData) -> Result<f64, String> {
    if data.points.is_empty() {
        return Err("no rows".into());
    }
    let mut total = 0.0;
    for p in &data.points {
        let c = data
            .classes
            .index_of(p.label)
            .ok_or_else(|| format!("label {} not in class set", p.label))?;
        total -= p.probability[c].max(1e-15).ln();
    }
    Ok(total / data.points.len() as f64)
}

#[test]
fn test_three_clusters_cross_validation_is_perfect() {
    let data = three_clusters();
    let mut selector = selector_for(&[Algorithm::LogisticRegression, Algorithm::RandomForest]);
    selector.set_validation(ValidationStrategy::cross_validation(4));
    let fitted = selector.fit(&data).unwrap();

    for row in data.iter() {
        assert_eq!(fitted.predict_row(&row.features), Ok(row.label));
    }

    let summary = &fitted.metadata().summary;
    assert!(["LogisticRegression", "RandomForest"].contains(&summary.best_model_name.as_str()));
    // 3 LR points + 2x2 RF points
    assert_eq!(summary.validation_results.len(), 7);
    assert_eq!(summary.trials_run, 7);
    assert_eq!(summary.evaluation_metric.as_deref(), Some("MultiClass_F1"));
    assert_eq!(summary.training_eval_source, TrainingEvalSource::TestPartition);

    let eval = fitted.training_eval();
    for descriptor in MultiClassEvaluator.metrics() {
        let key = metric_key(MultiClassEvaluator::NAME, &descriptor.name);
        assert!(eval.contains_key(&key), "missing {}", key);
    }
    assert_abs_diff_eq!(eval["MultiClass_Error"], 0.0);
}

#[test]
fn test_train_validation_split_with_custom_cross_entropy() {
    let data = three_clusters();
    let evaluator: Arc<dyn Evaluator> = Arc::new(CustomEvaluator::new(
        "MyLogLoss",
        "CrossEntropy",
        Direction::SmallerIsBetter,
        cross_entropy,
    ));
    let mut selector = selector_for(&[Algorithm::LogisticRegression, Algorithm::NaiveBayes]);
    selector
        .set_validation(ValidationStrategy::train_validation_split(0.8))
        .set_validation_metric(ValidationMetric::new(evaluator, "CrossEntropy").unwrap());
    let mut fitted = selector.fit(&data).unwrap();

    let summary = &fitted.metadata().summary;
    assert_eq!(
        summary.evaluation_metric.as_deref(),
        Some("MyLogLoss_CrossEntropy")
    );
    // the winner has the smallest loss among the trials that scored
    let best = summary.best_validation_metric.unwrap();
    for trial in &summary.validation_results {
        if let Some(m) = trial.metric {
            assert!(best <= m);
        }
    }
    assert!(fitted.training_eval().contains_key("MyLogLoss_CrossEntropy"));

    let holdout = fitted.evaluate_model(&data).unwrap().clone();
    assert!(holdout["MyLogLoss_CrossEntropy"] >= 0.0);
    assert_eq!(
        fitted.metadata().holdout_eval.as_ref().map(|r| r.len()),
        Some(fitted.training_eval().len())
    );
}

#[test]
fn test_grid_cardinality() {
    let mut selector = selector_for(&[Algorithm::RandomForest, Algorithm::NaiveBayes]);
    selector
        .set_random_forest_num_trees(&[5, 10])
        .unwrap()
        .set_random_forest_max_depth(&[3, 6, 9])
        .unwrap()
        .set_naive_bayes_var_smoothing(&[1e-9])
        .unwrap();
    // num_trees x max_depth x default impurity {gini, entropy}, plus NB
    assert_eq!(selector.trial_count(), 2 * 3 * 2 + 1);
}

#[test]
fn test_ties_go_to_the_earliest_trial() {
    let mut selector = selector_for(&[Algorithm::DecisionTree]);
    selector
        .set_decision_tree_max_depth(&[5, 6])
        .unwrap()
        .set_param(Algorithm::DecisionTree, "impurity", vec!["gini".into()])
        .unwrap();
    let fitted = selector.fit(&three_clusters()).unwrap();
    let summary = &fitted.metadata().summary;
    let metrics: Vec<Option<f64>> = summary.validation_results.iter().map(|t| t.metric).collect();
    assert_eq!(metrics[0], metrics[1]);
    assert_eq!(summary.best_hyperparameters["max_depth"], ParamValue::Int(5));
}

#[test]
fn test_fit_is_reproducible_across_thread_counts() {
    let data = load_iris();
    let mut sequential = selector_for(&[Algorithm::DecisionTree, Algorithm::NaiveBayes]);
    sequential.set_parallelism(1);
    let mut parallel = sequential.clone();
    parallel.set_parallelism(4);

    let a = sequential.fit(&data).unwrap();
    let b = parallel.fit(&data).unwrap();
    assert_eq!(a.metadata(), b.metadata());
    assert_eq!(a.model(), b.model());
}

#[test]
fn test_cascade_over_non_contiguous_labels() {
    let rows: Vec<LabeledRow> = three_clusters()
        .iter()
        .map(|r| {
            let label = [0.0, 2.0, 7.0][r.label as usize];
            LabeledRow::new(label, r.features.clone())
        })
        .collect();
    let data = Dataset::new(rows).unwrap();
    let mut selector = selector_for(&[Algorithm::NaiveBayes]);
    selector.set_splitter(None);
    let fitted = selector.fit(&data).unwrap();
    assert_eq!(fitted.metadata().summary.training_eval_source, TrainingEvalSource::TrainPartition);

    let cascade = OutputCascade::new(&fitted).unwrap();
    for scored in cascade.score(&data).unwrap() {
        assert_eq!(scored.prediction, scored.label);
        assert_eq!(scored.raw_scores.len(), 3);
        assert_eq!(scored.probability.len(), 3);
        assert_abs_diff_eq!(scored.probability.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }
    assert!(cascade.columns().probability.ends_with("_probability"));
}

#[test]
fn test_injected_estimator_runs_no_trials() {
    let data = three_clusters();
    let donor = selector_for(&[Algorithm::NaiveBayes]).fit(&data).unwrap();

    let mut selector = selector_for(&[Algorithm::LogisticRegression, Algorithm::RandomForest]);
    selector.set_best_estimator(
        BestEstimator::new("ChampionNB", donor.model().clone()).with_metadata("source", json!("donor")),
    );
    assert_eq!(selector.trial_count(), 0);
    let fitted = selector.fit(&data).unwrap();
    assert_eq!(fitted.trials_run(), 0);
    assert_eq!(fitted.best_model_name(), "ChampionNB");
    assert!(!fitted.training_eval().is_empty());

    let value = serde_json::to_value(fitted.metadata()).unwrap();
    assert_eq!(value["summary"]["bestModelName"], "ChampionNB");
    assert_eq!(value["summary"]["source"], "donor");
}

#[test]
fn test_zero_timeout_still_selects_a_model() {
    let mut selector = selector_for(&[Algorithm::NaiveBayes, Algorithm::DecisionTree]);
    selector.set_timeout(Duration::ZERO);
    let fitted = selector.fit(&three_clusters()).unwrap();
    assert_eq!(fitted.trials_run(), 1);
    assert!(fitted
        .metadata()
        .summary
        .validation_results
        .iter()
        .skip(1)
        .all(|t| t.skipped));
}

#[test]
fn test_all_failed_trials_are_listed() {
    let mut selector = selector_for(&[Algorithm::LogisticRegression]);
    selector.set_logistic_regression_max_iter(&[0]).unwrap();
    match selector.fit(&three_clusters()) {
        Err(SelectorError::Fit(FitError::AllTrialsFailed { failures })) => {
            // one per default reg_param value
            assert_eq!(failures.len(), 3);
            assert!(failures.iter().all(|f| f.model == "LogisticRegression"));
            assert!(failures.iter().all(|f| f.params.contains("max_iter=0")));
        }
        other => panic!("expected AllTrialsFailed, got {:?}", other),
    }
}

#[test]
fn test_saved_selector_predicts_and_reevaluates() {
    let data = three_clusters();
    let mut selector = selector_for(&[Algorithm::DecisionTree]);
    selector.add_evaluator(Arc::new(LogLossEvaluator));
    let fitted = selector.fit(&data).unwrap();
    assert!(fitted.training_eval().contains_key("LogLoss_CrossEntropy"));

    let path = std::env::temp_dir().join(format!("oxidize-select-e2e-{}.json", std::process::id()));
    save_selector(&fitted, &path).unwrap();
    let mut loaded = load_selector(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let original = fitted.transform(&data).unwrap();
    assert_eq!(loaded.transform(&data).unwrap(), original);

    let holdout = loaded.evaluate_model(&data).unwrap().clone();
    assert!(holdout.contains_key("MultiClass_F1"));
    assert!(holdout.contains_key("LogLoss_CrossEntropy"));
    assert_eq!(holdout, fitted.clone().evaluate_model(&data).unwrap().clone());
}

#[test]
fn test_selector_from_json_params() {
    let params = SelectorParams::from_json(
        r#"{
            "label": { "name": "y", "feature_type": "Integral" },
            "features": { "name": "x", "feature_type": "Vector" },
            "modelsToTry": ["NaiveBayes"],
            "validation": { "type": "CrossValidation", "num_folds": 3, "seed": 11, "stratify": true },
            "splitter": { "reserve_test_fraction": 0.2, "seed": 5 },
            "customParams": { "run": 17 }
        }"#,
    )
    .unwrap();
    let fitted = ModelSelector::from_params(&params).unwrap().fit(&load_iris()).unwrap();
    assert!(fitted.columns().prediction.starts_with("y-x_ModelSelector_"));
    let summary = &fitted.metadata().summary;
    assert_eq!(summary.custom_params["run"], json!(17));
    assert_eq!(summary.data_split.as_ref().map(|s| s.test_count), Some(6));
}
