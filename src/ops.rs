//! Named operations accepting either a [`Value`] or a bare literal on either side
//!
//! Literals are promoted to leaf values before the operation is applied.

use thiserror::Error;

use crate::values::Value;

/// Errors raised while building an operation
#[derive(Debug, Error, PartialEq)]
pub enum OperandError {
    #[error("Invalid operand for {op}: {reason}")]
    InvalidOperand { op: &'static str, reason: &'static str },
}

/// Either side of an operation
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Literal(f64),
}

impl Operand {
    /// Promotes a literal to a new leaf, values are passed through
    pub fn into_value(self) -> Value {
        match self {
            Operand::Value(v) => v,
            Operand::Literal(x) => Value::new(x),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<&Value> for Operand {
    fn from(value: &Value) -> Self {
        Operand::Value(value.clone())
    }
}

impl From<f64> for Operand {
    fn from(x: f64) -> Self {
        Operand::Literal(x)
    }
}

pub fn add(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Value {
    &lhs.into().into_value() + &rhs.into().into_value()
}

pub fn sub(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Value {
    &lhs.into().into_value() - &rhs.into().into_value()
}

pub fn mul(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Value {
    &lhs.into().into_value() * &rhs.into().into_value()
}

pub fn div(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Value {
    &lhs.into().into_value() / &rhs.into().into_value()
}

/// Raises `base` to `exponent`. The exponent must be a literal: raising to a value from the
/// graph is not supported and is rejected instead of silently dropping its gradient.
pub fn pow(base: impl Into<Operand>, exponent: impl Into<Operand>) -> Result<Value, OperandError> {
    match exponent.into() {
        Operand::Literal(p) => Ok(base.into().into_value().pow(p)),
        Operand::Value(_) => Err(OperandError::InvalidOperand {
            op: "pow",
            reason: "exponent must be a literal, not a value",
        }),
    }
}

pub fn exp(x: impl Into<Operand>) -> Value {
    x.into().into_value().exp()
}

pub fn tanh(x: impl Into<Operand>) -> Value {
    x.into().into_value().tanh()
}

pub fn relu(x: impl Into<Operand>) -> Value {
    x.into().into_value().relu()
}
