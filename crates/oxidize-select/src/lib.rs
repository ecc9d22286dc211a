//! # OxidizeSelect
//!
//! Automatic model selection for classification, in pure Rust.
//!
//! ## Modules
//!
//! - **core**: Labeled rows, datasets, class sets, typed hyperparameters, trainer contract, errors
//! - **linear**: Multinomial logistic regression
//! - **tree**: Decision tree (CART) and random forest classifiers
//! - **naive_bayes**: Gaussian naive Bayes
//! - **metrics**: Evaluator framework: multiclass, log loss, custom evaluators
//! - **preprocessing**: Reserve-test split, label filtering, k-fold and train/validation folds
//! - **selection**: Candidate registry, grids, validator, model selector, output cascade
//! - **io**: CSV reader, JSON persistence of fitted selectors and parameters
//! - **datasets**: Seeded Gaussian clusters and a small Iris subset
//!
//! ## Example
//!
//! ```no_run
//! use oxidize_select::prelude::*;
//!
//! let data = oxidize_select::datasets::three_clusters();
//! let mut selector = ModelSelector::new();
//! selector
//!     .set_input(InputColumn::real_nn("label"), InputColumn::vector("features"))
//!     .unwrap()
//!     .set_models_to_try(&[Algorithm::LogisticRegression, Algorithm::RandomForest])
//!     .set_validation(ValidationStrategy::cross_validation(4));
//! let fitted = selector.fit(&data).unwrap();
//! println!("{}", fitted.best_model_name());
//! ```

/// Data model, hyperparameters and errors.
pub use oxidize_select_core as core;

/// Logistic regression.
pub use oxidize_select_linear as linear;

/// Tree-based models.
pub use oxidize_select_tree as tree;

/// Naive Bayes classifiers.
pub use oxidize_select_naive_bayes as naive_bayes;

/// Evaluators and metrics.
pub use oxidize_select_metrics as metrics;

/// Splitting and fold generation.
pub use oxidize_select_preprocessing as preprocessing;

/// Model selection.
pub use oxidize_select_selection as selection;

/// I/O utilities.
pub use oxidize_select_io as io;

/// Built-in datasets.
pub use oxidize_select_datasets as datasets;

/// The types most callers need.
pub mod prelude {
    pub use oxidize_select_core::{
        ConfigurationError, Dataset, Features, FitError, LabeledRow, ParamValue, SelectorError,
    };
    pub use oxidize_select_metrics::{
        CustomEvaluator, Direction, Evaluator, LogLossEvaluator, MultiClassEvaluator,
    };
    pub use oxidize_select_preprocessing::DataSplitter;
    pub use oxidize_select_selection::{
        Algorithm, BestEstimator, FittedModelSelector, InputColumn, ModelSelector, SelectorParams,
        ValidationMetric, ValidationStrategy,
    };
}
