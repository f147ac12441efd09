//! Loss function(s)

use crate::values::Value;

/// Max-margin (hinge) loss for binary classification with targets in {-1, 1}
/// `mean(relu(1 - y_i * score_i))`
pub struct MaxMarginLoss;

impl MaxMarginLoss {
    pub fn call<T>(scores: &[T], targets: &[f64]) -> Value
    where
        T: AsRef<Value>,
    {
        debug_assert_eq!(scores.len(), targets.len());
        if scores.is_empty() {
            return Value::new(0.0);
        }
        let loss = scores
            .iter()
            .zip(targets.iter())
            .map(|(s, &y)| (1.0 - s.as_ref() * y).relu())
            .sum::<Value>();
        loss * (1.0 / scores.len() as f64)
    }
}

/// L2 penalty on a set of parameters, `alpha * sum(p^2)`
pub struct L2Regularization;

impl L2Regularization {
    pub fn call<T>(params: &[T], alpha: f64) -> Value
    where
        T: AsRef<Value>,
    {
        let sum_sq = params
            .iter()
            .map(|p| p.as_ref() * p.as_ref())
            .sum::<Value>();
        alpha * sum_sq
    }
}

/// Fraction of scores whose sign agrees with the target
pub fn accuracy<T>(scores: &[T], targets: &[f64]) -> f64
where
    T: AsRef<Value>,
{
    if scores.is_empty() {
        return 0.0;
    }
    let correct = scores
        .iter()
        .zip(targets.iter())
        .filter(|&(s, &y)| (y > 0.0) == (s.as_ref().data() > 0.0))
        .count();
    correct as f64 / scores.len() as f64
}
