pub mod dataset;
pub mod error;
pub mod model;
pub mod params;
pub mod vector;

pub use dataset::{ClassSet, Dataset, Features, LabeledRow, TrainingSet};
pub use error::{
    ConfigurationError, EvaluationError, FitError, LearnError, LearnResult, SelectorError,
    SelectorResult, TrialFailure,
};
pub use model::{ClassificationModel, Trainer};
pub use params::{Hyperparameters, ParamKind, ParamSpec, ParamValue};
