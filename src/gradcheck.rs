//! Finite-difference checks for gradients computed by backprop

use crate::values::Value;

/// Gradient of `f` at `x` computed by backpropagation
pub fn analytic_grad<F>(f: F, x: f64) -> f64
where
    F: Fn(&Value) -> Value,
{
    let x = Value::new(x);
    f(&x).backward();
    x.grad()
}

/// Central difference estimate `(f(x + eps) - f(x - eps)) / 2eps`
pub fn numeric_grad<F>(f: F, x: f64, eps: f64) -> f64
where
    F: Fn(&Value) -> Value,
{
    let plus = f(&Value::new(x + eps)).data();
    let minus = f(&Value::new(x - eps)).data();
    (plus - minus) / (2.0 * eps)
}

/// Absolute difference between the analytic and numeric gradients of `f` at `x`
pub fn grad_error<F>(f: F, x: f64, eps: f64) -> f64
where
    F: Fn(&Value) -> Value,
{
    (analytic_grad(&f, x) - numeric_grad(&f, x, eps)).abs()
}
