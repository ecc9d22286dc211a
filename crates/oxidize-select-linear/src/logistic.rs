use oxidize_select_core::error::LearnResult;
use oxidize_select_core::params::{
    ensure, expect_bool, expect_f64, expect_usize, unknown_param, Hyperparameters, ParamKind,
    ParamSpec, ParamValue,
};
use oxidize_select_core::vector::{dot, softmax};
use oxidize_select_core::{ClassificationModel, LearnError, Trainer, TrainingSet};
use serde::{Deserialize, Serialize};

/// Hyperparameters of multinomial logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionParams {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// L2 penalty strength.
    pub reg_param: f64,
    pub tol: f64,
    pub fit_intercept: bool,
    /// Train on z-scored features; weights are mapped back afterwards.
    pub standardize: bool,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        LogisticRegressionParams {
            learning_rate: 0.5,
            max_iter: 300,
            reg_param: 0.0,
            tol: 1e-6,
            fit_intercept: true,
            standardize: true,
        }
    }
}

impl Hyperparameters for LogisticRegressionParams {
    const SPECS: &'static [ParamSpec] = &[
        ParamSpec::new("learning_rate", ParamKind::Float),
        ParamSpec::new("max_iter", ParamKind::Int),
        ParamSpec::new("reg_param", ParamKind::Float),
        ParamSpec::new("tol", ParamKind::Float),
        ParamSpec::new("fit_intercept", ParamKind::Bool),
        ParamSpec::new("standardize", ParamKind::Bool),
    ];

    fn set(&mut self, name: &str, value: &ParamValue) -> LearnResult<()> {
        match name {
            "learning_rate" => self.learning_rate = expect_f64(name, value)?,
            "max_iter" => self.max_iter = expect_usize(name, value)?,
            "reg_param" => self.reg_param = expect_f64(name, value)?,
            "tol" => self.tol = expect_f64(name, value)?,
            "fit_intercept" => self.fit_intercept = expect_bool(name, value)?,
            "standardize" => self.standardize = expect_bool(name, value)?,
            _ => return Err(unknown_param(name)),
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "learning_rate" => self.learning_rate.into(),
            "max_iter" => self.max_iter.into(),
            "reg_param" => self.reg_param.into(),
            "tol" => self.tol.into(),
            "fit_intercept" => self.fit_intercept.into(),
            "standardize" => self.standardize.into(),
            _ => return None,
        })
    }

    fn validate(&self) -> LearnResult<()> {
        ensure(
            self.learning_rate > 0.0 && self.learning_rate.is_finite(),
            "learning_rate",
            format!("must be positive, got {}", self.learning_rate),
        )?;
        ensure(self.max_iter > 0, "max_iter", "must be positive")?;
        ensure(
            self.reg_param >= 0.0,
            "reg_param",
            format!("must be non-negative, got {}", self.reg_param),
        )?;
        ensure(
            self.tol >= 0.0,
            "tol",
            format!("must be non-negative, got {}", self.tol),
        )
    }
}

/// Multinomial logistic regression trained by full-batch gradient descent
/// on the softmax cross-entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegression;

/// Fitted logistic regression: one weight row and intercept per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionModel {
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub iterations: usize,
}

impl LogisticRegression {
    fn column_stats(data: &TrainingSet) -> (Vec<f64>, Vec<f64>) {
        let p = data.n_features;
        let n = data.len() as f64;
        let mut mean = vec![0.0; p];
        for row in &data.x {
            for j in 0..p {
                mean[j] += row[j];
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut std = vec![0.0; p];
        for row in &data.x {
            for j in 0..p {
                let d = row[j] - mean[j];
                std[j] += d * d;
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
            // Constant columns keep their raw scale
            if *s < 1e-12 {
                *s = 1.0;
            }
        }
        (mean, std)
    }
}

impl Trainer for LogisticRegression {
    type Params = LogisticRegressionParams;
    type Model = LogisticRegressionModel;

    const NAME: &'static str = "LogisticRegression";

    fn fit(&self, data: &TrainingSet, params: &Self::Params) -> LearnResult<Self::Model> {
        params.validate()?;
        if data.is_empty() {
            return Err(LearnError::EmptyTrainingSet);
        }
        let k = data.n_classes;
        let p = data.n_features;
        let n_t = data.len() as f64;

        let (mean, std) = if params.standardize {
            Self::column_stats(data)
        } else {
            (vec![0.0; p], vec![1.0; p])
        };
        let x: Vec<Vec<f64>> = data
            .x
            .iter()
            .map(|row| (0..p).map(|j| (row[j] - mean[j]) / std[j]).collect())
            .collect();

        let mut w = vec![vec![0.0; p]; k];
        let mut b = vec![0.0; k];
        let mut iterations = 0;

        for _iter in 0..params.max_iter {
            iterations += 1;
            let mut dw = vec![vec![0.0; p]; k];
            let mut db = vec![0.0; k];

            for (xi, &yi) in x.iter().zip(data.y.iter()) {
                let z: Vec<f64> = (0..k).map(|c| dot(&w[c], xi) + b[c]).collect();
                let a = softmax(&z);
                for c in 0..k {
                    let target = if c == yi { 1.0 } else { 0.0 };
                    let error = a[c] - target;
                    for j in 0..p {
                        dw[c][j] += error * xi[j];
                    }
                    db[c] += error;
                }
            }

            let mut max_grad: f64 = 0.0;
            for c in 0..k {
                for j in 0..p {
                    let grad = dw[c][j] / n_t + params.reg_param * w[c][j];
                    w[c][j] -= params.learning_rate * grad;
                    max_grad = max_grad.max(grad.abs());
                }
                if params.fit_intercept {
                    let grad = db[c] / n_t;
                    b[c] -= params.learning_rate * grad;
                    max_grad = max_grad.max(grad.abs());
                }
            }

            if max_grad < params.tol {
                break;
            }
        }

        // Fold the standardization back into the weights
        let mut intercepts = b;
        for c in 0..k {
            for j in 0..p {
                w[c][j] /= std[j];
                intercepts[c] -= w[c][j] * mean[j];
            }
        }

        Ok(LogisticRegressionModel {
            weights: w,
            intercepts,
            iterations,
        })
    }
}

impl ClassificationModel for LogisticRegressionModel {
    fn num_classes(&self) -> usize {
        self.intercepts.len()
    }

    fn num_features(&self) -> usize {
        self.weights.first().map(|w| w.len()).unwrap_or(0)
    }

    /// Per-class margins `w_c · x + b_c`.
    fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.intercepts.iter())
            .map(|(w, &b)| dot(w, x) + b)
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

    fn three_bands() -> TrainingSet {
        let x = vec![
            vec![-6.0, -5.0],
            vec![-5.5, -6.0],
            vec![-5.0, -5.5],
            vec![0.0, 0.5],
            vec![0.5, -0.5],
            vec![-0.5, 0.0],
            vec![5.0, 6.0],
            vec![5.5, 5.0],
            vec![6.0, 5.5],
        ];
        let y = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        TrainingSet::new(x, y, 3, 2).unwrap()
    }

    #[test]
    fn test_logistic_regression_multiclass() {
        let data = three_bands();
        let model = LogisticRegression
            .fit(&data, &LogisticRegressionParams::default())
            .unwrap();

        for (xi, &yi) in data.x.iter().zip(data.y.iter()) {
            assert_eq!(model.predict_class(xi), yi, "row {:?}", xi);
            let proba = model.predict_probability(xi);
            assert_eq!(proba.len(), 3);
            assert_abs_diff_eq!(proba.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_binary_without_standardization() {
        // Linearly separable data
        let x = vec![
            vec![0.0, 0.0],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![5.5, 5.5],
            vec![6.0, 6.0],
        ];
        let data = TrainingSet::new(x, vec![0, 0, 0, 1, 1, 1], 2, 2).unwrap();
        let params = LogisticRegressionParams {
            learning_rate: 0.1,
            max_iter: 1000,
            standardize: false,
            ..Default::default()
        };
        let model = LogisticRegression.fit(&data, &params).unwrap();
        for i in 0..3 {
            assert_eq!(model.predict_class(&data.x[i]), 0, "Expected 0 at {}", i);
        }
        for i in 3..6 {
            assert_eq!(model.predict_class(&data.x[i]), 1, "Expected 1 at {}", i);
        }
    }

    #[test]
    fn test_rejects_out_of_domain_params() {
        let data = three_bands();
        let params = LogisticRegressionParams {
            max_iter: 0,
            ..Default::default()
        };
        let err = LogisticRegression.fit(&data, &params).unwrap_err();
        assert!(matches!(err, LearnError::InvalidHyperparameter { ref name, .. } if name == "max_iter"));
    }

    #[test]
    fn test_set_by_name_checks_kind() {
        let mut params = LogisticRegressionParams::default();
        params.set("reg_param", &ParamValue::Float(0.1)).unwrap();
        assert_eq!(params.reg_param, 0.1);
        assert!(params.set("max_iter", &ParamValue::Float(1.5)).is_err());
        assert!(params.set("nope", &ParamValue::Int(1)).is_err());
        assert_eq!(params.get("max_iter"), Some(ParamValue::Int(300)));
    }
}
