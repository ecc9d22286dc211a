//! Multiclass classification metrics over label / prediction slices.
//!
//! Labels and predictions are class values (not indices); two values match
//! when they are exactly equal.

use oxidize_select_core::ClassSet;

/// Compute accuracy: fraction of correct predictions.
pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    assert_eq!(y_true.len(), y_pred.len(), "Length mismatch");
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(a, b)| a == b)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Confusion matrix indexed by position in `classes`: `matrix[true][pred]`.
/// Values outside `classes` are ignored.
pub fn confusion_matrix(y_true: &[f64], y_pred: &[f64], classes: &ClassSet) -> Vec<Vec<usize>> {
    let k = classes.len();
    let mut matrix = vec![vec![0usize; k]; k];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if let (Some(ti), Some(pi)) = (classes.index_of(t), classes.index_of(p)) {
            matrix[ti][pi] += 1;
        }
    }
    matrix
}

/// Precision for a specific class value.
pub fn precision_class(y_true: &[f64], y_pred: &[f64], class: f64) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if p == class {
            if t == class {
                tp += 1;
            } else {
                fp += 1;
            }
        }
    }
    if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    }
}

/// Recall for a specific class value.
pub fn recall_class(y_true: &[f64], y_pred: &[f64], class: f64) -> f64 {
    let mut tp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t == class {
            if p == class {
                tp += 1;
            } else {
                fn_ += 1;
            }
        }
    }
    if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    }
}

/// F1 score for a specific class value.
pub fn f1_score_class(y_true: &[f64], y_pred: &[f64], class: f64) -> f64 {
    let p = precision_class(y_true, y_pred, class);
    let r = recall_class(y_true, y_pred, class);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Classes appearing in either labels or predictions.
pub fn observed_classes(y_true: &[f64], y_pred: &[f64]) -> ClassSet {
    ClassSet::from_labels(y_true.iter().chain(y_pred.iter()).copied())
}

fn macro_average<F: Fn(&[f64], &[f64], f64) -> f64>(y_true: &[f64], y_pred: &[f64], f: F) -> f64 {
    let classes = observed_classes(y_true, y_pred);
    if classes.is_empty() {
        return 0.0;
    }
    let sum: f64 = classes.labels().iter().map(|&c| f(y_true, y_pred, c)).sum();
    sum / classes.len() as f64
}

/// Macro-averaged precision across observed classes.
pub fn precision_macro(y_true: &[f64], y_pred: &[f64]) -> f64 {
    macro_average(y_true, y_pred, precision_class)
}

/// Macro-averaged recall across observed classes.
pub fn recall_macro(y_true: &[f64], y_pred: &[f64]) -> f64 {
    macro_average(y_true, y_pred, recall_class)
}

/// Macro-averaged F1 score.
pub fn f1_macro(y_true: &[f64], y_pred: &[f64]) -> f64 {
    macro_average(y_true, y_pred, f1_score_class)
}

/// Multiclass log loss: `-mean(log p[true class])`, clipped at 1e-15.
///
/// `probabilities[i]` is indexed by position in `classes`; a label outside
/// `classes` counts as probability zero.
pub fn log_loss(y_true: &[f64], probabilities: &[Vec<f64>], classes: &ClassSet) -> f64 {
    let eps = 1e-15;
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for (&y, proba) in y_true.iter().zip(probabilities.iter()) {
        let p = classes
            .index_of(y)
            .and_then(|c| proba.get(c).copied())
            .unwrap_or(0.0)
            .max(eps)
            .min(1.0);
        total -= p.ln();
    }
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_accuracy() {
        let y_true = [0.0, 1.0, 2.0, 1.0, 0.0];
        let y_pred = [0.0, 1.0, 2.0, 0.0, 0.0];
        assert_abs_diff_eq!(accuracy(&y_true, &y_pred), 0.8, epsilon = 1e-10);
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = [0.0, 0.0, 1.0, 1.0];
        let y_pred = [0.0, 1.0, 0.0, 1.0];
        let classes = ClassSet::from_labels(vec![0.0, 1.0]);
        let cm = confusion_matrix(&y_true, &y_pred, &classes);
        assert_eq!(cm[0][0], 1); // TN
        assert_eq!(cm[0][1], 1); // FP
        assert_eq!(cm[1][0], 1); // FN
        assert_eq!(cm[1][1], 1); // TP
    }

    #[test]
    fn test_precision_recall() {
        let y_true = [1.0, 1.0, 0.0, 0.0, 1.0];
        let y_pred = [1.0, 0.0, 0.0, 1.0, 1.0];
        // TP=2, FP=1, FN=1 → P=2/3, R=2/3
        assert_abs_diff_eq!(precision_class(&y_true, &y_pred, 1.0), 2.0 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(recall_class(&y_true, &y_pred, 1.0), 2.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_macro_scores_perfect() {
        let y = [3.0, 5.0, 5.0, 9.0];
        assert_eq!(precision_macro(&y, &y), 1.0);
        assert_eq!(recall_macro(&y, &y), 1.0);
        assert_eq!(f1_macro(&y, &y), 1.0);
    }

    #[test]
    fn test_log_loss() {
        let classes = ClassSet::from_labels(vec![0.0, 1.0]);
        let y = [0.0, 1.0];
        let proba = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        assert_abs_diff_eq!(log_loss(&y, &proba, &classes), 2f64.ln(), epsilon = 1e-12);

        let certain = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_abs_diff_eq!(log_loss(&y, &certain, &classes), 0.0, epsilon = 1e-12);
    }
}
