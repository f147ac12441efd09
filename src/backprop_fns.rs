//! Incremental gradient update functions for backprop
//!
//! Applied depending on the operation which created outputs from inputs. Corresponds to
//! a node in the computation graph.
//!
//! Every rule reads the values it needs into locals before taking a mutable borrow, since
//! both operands may be the same node (e.g. `x * x`).

use std::fmt::{self, Display};

use crate::values::Value;

/// Represents the function in the computation graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackpropFunc {
    Add,
    Sub,
    Mul,
    Neg,
    /// Power with a constant exponent
    Pow(f64),
    Exp,
    Tanh,
    ReLU,
}

impl BackpropFunc {
    pub fn n_operands(&self) -> usize {
        match self {
            BackpropFunc::Add | BackpropFunc::Sub | BackpropFunc::Mul => 2,
            BackpropFunc::Neg
            | BackpropFunc::Pow(_)
            | BackpropFunc::Exp
            | BackpropFunc::Tanh
            | BackpropFunc::ReLU => 1,
        }
    }
}

impl Display for BackpropFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackpropFunc::Add => write!(f, "+"),
            BackpropFunc::Sub => write!(f, "-"),
            BackpropFunc::Mul => write!(f, "*"),
            BackpropFunc::Neg => write!(f, "neg"),
            BackpropFunc::Pow(p) => write!(f, "**{}", p),
            BackpropFunc::Exp => write!(f, "exp"),
            BackpropFunc::Tanh => write!(f, "tanh"),
            BackpropFunc::ReLU => write!(f, "ReLU"),
        }
    }
}

fn accumulate(value: &Value, delta: f64) {
    value.0.borrow_mut().grad += delta;
}

/// Takes two values and updates their gradients
/// Represents backprop for the operation `in1 + in2 = out`
pub fn add(in1: &Value, in2: &Value, out: &Value) {
    let grad = out.grad();
    accumulate(in1, grad);
    accumulate(in2, grad);
}

/// Represents backprop for the operation `in1 - in2 = out`
pub fn sub(in1: &Value, in2: &Value, out: &Value) {
    let grad = out.grad();
    accumulate(in1, grad);
    accumulate(in2, -grad);
}

/// Represents backprop for the operation `in1 * in2 = out`
pub fn mul(in1: &Value, in2: &Value, out: &Value) {
    let grad = out.grad();
    let (in1_data, in2_data) = (in1.data(), in2.data());
    accumulate(in1, in2_data * grad);
    accumulate(in2, in1_data * grad);
}

/// Represents backprop for the operation `-in = out`
pub fn neg(in1: &Value, out: &Value) {
    accumulate(in1, -out.grad());
}

/// Represents backprop for the operation `in^exponent = out`
/// The exponent is a constant so it receives no gradient. At `in = 0` with `exponent < 1`
/// the local derivative is inf or NaN and is propagated as such.
pub fn pow(in1: &Value, exponent: f64, out: &Value) {
    let grad = out.grad();
    let in1_data = in1.data();
    accumulate(in1, exponent * in1_data.powf(exponent - 1.0) * grad);
}

/// Represents backprop for the operation `exp(in) = out`
pub fn exp(in1: &Value, out: &Value) {
    let grad = out.grad(); // accumulated gradient
    let out_data = out.data(); // exp(in)
    accumulate(in1, out_data * grad);
}

/// Represents backprop for the operation `tanh(in) = out`
pub fn tanh(in1: &Value, out: &Value) {
    let grad = out.grad();
    let t = out.data();
    accumulate(in1, (1.0 - t * t) * grad);
}

/// Represents backprop for the operation `relu(in) = out`
pub fn relu(in1: &Value, out: &Value) {
    let grad = out.grad();
    accumulate(in1, if out.data() > 0.0 { grad } else { 0.0 });
}

/// Applies a backprop function for operators with two operands
pub fn update_gradients_two_operands(in1: &Value, in2: &Value, out: &Value) {
    match out.backprop_fn() {
        Some(BackpropFunc::Add) => add(in1, in2, out),
        Some(BackpropFunc::Sub) => sub(in1, in2, out),
        Some(BackpropFunc::Mul) => mul(in1, in2, out),
        None => {}
        Some(f) => unreachable!("{:?} does not take two operands", f),
    }
}

/// Applies a backprop function for operators with one operand
pub fn update_gradients_one_operand(in1: &Value, out: &Value) {
    match out.backprop_fn() {
        Some(BackpropFunc::Neg) => neg(in1, out),
        Some(BackpropFunc::Pow(exponent)) => pow(in1, exponent, out),
        Some(BackpropFunc::Exp) => exp(in1, out),
        Some(BackpropFunc::Tanh) => tanh(in1, out),
        Some(BackpropFunc::ReLU) => relu(in1, out),
        None => {}
        Some(f) => unreachable!("{:?} does not take one operand", f),
    }
}
