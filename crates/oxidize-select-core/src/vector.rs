//! Small numeric helpers over per-class score vectors.

/// Numerically stable softmax. `-inf` entries map to zero.
pub fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return uniform(raw.len());
    }
    let exps: Vec<f64> = raw.iter().map(|&v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Scale non-negative scores to sum to one. An all-zero vector becomes uniform.
pub fn normalize(raw: &[f64]) -> Vec<f64> {
    let sum: f64 = raw.iter().map(|v| v.max(0.0)).sum();
    if sum <= 0.0 || !sum.is_finite() {
        return uniform(raw.len());
    }
    raw.iter().map(|v| v.max(0.0) / sum).collect()
}

pub fn uniform(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Index of the largest value; the first one wins on ties, NaN never wins.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
