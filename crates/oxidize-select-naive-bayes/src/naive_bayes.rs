use oxidize_select_core::error::LearnResult;
use oxidize_select_core::params::{
    ensure, expect_f64, unknown_param, Hyperparameters, ParamKind, ParamSpec, ParamValue,
};
use oxidize_select_core::vector::softmax;
use oxidize_select_core::{ClassificationModel, LearnError, Trainer, TrainingSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesParams {
    /// Fraction of the largest feature variance added to every variance.
    pub var_smoothing: f64,
}

impl Default for NaiveBayesParams {
    fn default() -> Self {
        NaiveBayesParams {
            var_smoothing: 1e-9,
        }
    }
}

impl Hyperparameters for NaiveBayesParams {
    const SPECS: &'static [ParamSpec] = &[ParamSpec::new("var_smoothing", ParamKind::Float)];

    fn set(&mut self, name: &str, value: &ParamValue) -> LearnResult<()> {
        match name {
            "var_smoothing" => self.var_smoothing = expect_f64(name, value)?,
            _ => return Err(unknown_param(name)),
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        match name {
            "var_smoothing" => Some(self.var_smoothing.into()),
            _ => None,
        }
    }

    fn validate(&self) -> LearnResult<()> {
        ensure(
            self.var_smoothing >= 0.0 && self.var_smoothing.is_finite(),
            "var_smoothing",
            format!("must be non-negative, got {}", self.var_smoothing),
        )
    }
}

/// Gaussian Naive Bayes classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianNaiveBayes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNaiveBayesModel {
    pub class_priors: Vec<f64>,
    pub class_means: Vec<Vec<f64>>,
    pub class_vars: Vec<Vec<f64>>,
}

impl Trainer for GaussianNaiveBayes {
    type Params = NaiveBayesParams;
    type Model = GaussianNaiveBayesModel;

    const NAME: &'static str = "NaiveBayes";

    fn fit(&self, data: &TrainingSet, params: &Self::Params) -> LearnResult<Self::Model> {
        params.validate()?;
        if data.is_empty() {
            return Err(LearnError::EmptyTrainingSet);
        }
        let n = data.len();
        let p = data.n_features;
        let k = data.n_classes;
        let class_counts = data.class_counts();

        // Compute means
        let mut class_means = vec![vec![0.0; p]; k];
        for (xi, &c) in data.x.iter().zip(data.y.iter()) {
            for j in 0..p {
                class_means[c][j] += xi[j];
            }
        }
        for c in 0..k {
            if class_counts[c] > 0 {
                let cnt = class_counts[c] as f64;
                for m in &mut class_means[c] {
                    *m /= cnt;
                }
            }
        }

        // Compute variances
        let mut class_vars = vec![vec![0.0; p]; k];
        for (xi, &c) in data.x.iter().zip(data.y.iter()) {
            for j in 0..p {
                let diff = xi[j] - class_means[c][j];
                class_vars[c][j] += diff * diff;
            }
        }

        let mut max_var: f64 = 0.0;
        for j in 0..p {
            let mean = data.x.iter().map(|r| r[j]).sum::<f64>() / n as f64;
            let var = data.x.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n as f64;
            max_var = max_var.max(var);
        }
        // Floor keeps single-point classes from producing zero variance
        let epsilon = (params.var_smoothing * max_var).max(1e-9);

        for c in 0..k {
            let cnt = class_counts[c].max(1) as f64;
            for v in &mut class_vars[c] {
                *v = *v / cnt + epsilon;
            }
        }

        let class_priors = class_counts
            .iter()
            .map(|&cnt| cnt as f64 / n as f64)
            .collect();

        Ok(GaussianNaiveBayesModel {
            class_priors,
            class_means,
            class_vars,
        })
    }
}

impl GaussianNaiveBayesModel {
    /// log p(x | c) under independent Gaussians.
    fn log_likelihood(&self, x: &[f64], class: usize) -> f64 {
        let two_pi_ln = (2.0 * std::f64::consts::PI).ln();
        let mut log_prob = 0.0;
        for (j, &xj) in x.iter().enumerate() {
            let mean = self.class_means[class][j];
            let var = self.class_vars[class][j];
            let diff = xj - mean;
            // log N(x|μ,σ²) = -0.5 * (log(2π) + log(σ²) + (x-μ)²/σ²)
            log_prob -= 0.5 * (two_pi_ln + var.ln() + diff * diff / var);
        }
        log_prob
    }
}

impl ClassificationModel for GaussianNaiveBayesModel {
    fn num_classes(&self) -> usize {
        self.class_priors.len()
    }

    fn num_features(&self) -> usize {
        self.class_means.first().map(|m| m.len()).unwrap_or(0)
    }

    /// Joint log-likelihood `log p(c) + log p(x | c)`; `-inf` for unseen classes.
    fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        (0..self.num_classes())
            .map(|c| {
                let prior = self.class_priors[c];
                if prior > 0.0 {
                    prior.ln() + self.log_likelihood(x, c)
                } else {
                    f64::NEG_INFINITY
                }
            })
            .collect()
    }

    fn raw_to_probability(&self, raw: &[f64]) -> Vec<f64> {
        softmax(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gaussian_nb() {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.5, 0.5],
            vec![1.0, 0.0],
            vec![5.0, 5.0],
            vec![5.5, 5.5],
            vec![6.0, 5.0],
        ];
        let data = TrainingSet::new(x, vec![0, 0, 0, 1, 1, 1], 2, 2).unwrap();
        let model = GaussianNaiveBayes
            .fit(&data, &NaiveBayesParams::default())
            .unwrap();

        for (xi, &yi) in data.x.iter().zip(data.y.iter()) {
            assert_eq!(model.predict_class(xi), yi);
        }
        assert_abs_diff_eq!(model.class_priors[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_unseen_class_gets_zero_probability() {
        let data = TrainingSet::new(
            vec![vec![0.0], vec![0.2], vec![4.0], vec![4.2]],
            vec![0, 0, 2, 2],
            3,
            1,
        )
        .unwrap();
        let model = GaussianNaiveBayes
            .fit(&data, &NaiveBayesParams::default())
            .unwrap();
        let proba = model.predict_probability(&[0.1]);
        assert_eq!(proba.len(), 3);
        assert_eq!(proba[1], 0.0);
        assert_abs_diff_eq!(proba.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}
