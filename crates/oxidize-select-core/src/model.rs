use crate::dataset::TrainingSet;
use crate::error::LearnResult;
use crate::params::Hyperparameters;
use crate::vector;

/// A fitted multiclass model.
///
/// `predict_raw` returns the algorithm's native per-class scores (margins,
/// vote mass, log-likelihoods, ...). `raw_to_probability` turns them into a
/// distribution over the same class indices.
pub trait ClassificationModel: Send + Sync {
    fn num_classes(&self) -> usize;
    fn num_features(&self) -> usize;
    fn predict_raw(&self, x: &[f64]) -> Vec<f64>;
    fn raw_to_probability(&self, raw: &[f64]) -> Vec<f64>;

    fn predict_probability(&self, x: &[f64]) -> Vec<f64> {
        self.raw_to_probability(&self.predict_raw(x))
    }

    /// Most probable class index.
    fn predict_class(&self, x: &[f64]) -> usize {
        vector::argmax(&self.predict_probability(x))
    }
}

/// Binds a hyperparameter type to a model type.
pub trait Trainer {
    type Params: Hyperparameters;
    type Model: ClassificationModel;

    /// Display name of the algorithm.
    const NAME: &'static str;

    fn fit(&self, data: &TrainingSet, params: &Self::Params) -> LearnResult<Self::Model>;
}
