//! Scalar values which form a computation graph
use std::{
    cell::RefCell,
    collections::HashSet,
    fmt::{self, Debug, Display},
    iter::Sum,
    ops::{Add, Div, Mul, Neg, Sub},
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::backprop_fns::{
    BackpropFunc, update_gradients_one_operand, update_gradients_two_operands,
};

type SharedValue = Rc<RefCell<InnerValue>>;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Newtype representing a shared value in a computation graph
///
/// Cloning is cheap and yields another handle to the same node.
#[derive(Clone)]
pub struct Value(pub(crate) SharedValue);

impl Value {
    /// Create a new value, not derived from any other values
    pub fn new(data: f64) -> Self {
        Self(Rc::new(RefCell::new(InnerValue::new(data, None, vec![]))))
    }

    /// Create one leaf per literal, e.g. for an input row
    pub fn from_slice(data: &[f64]) -> Vec<Value> {
        data.iter().map(|&d| Value::new(d)).collect()
    }

    /// Create a new value derived from an operation on other values (i.e. not a leaf node)
    fn new_derived(data: f64, backprop_fn: BackpropFunc, children: &[&Value]) -> Self {
        debug_assert_eq!(backprop_fn.n_operands(), children.len());
        let children = children.iter().map(|c| c.0.clone()).collect();
        Self(Rc::new(RefCell::new(InnerValue::new(
            data,
            Some(backprop_fn),
            children,
        ))))
    }

    pub fn data(&self) -> f64 {
        self.0.borrow().data
    }

    pub fn grad(&self) -> f64 {
        self.0.borrow().grad
    }

    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    /// The operation which produced this value, `None` for leaves
    pub fn backprop_fn(&self) -> Option<BackpropFunc> {
        self.0.borrow().backprop_fn
    }

    /// Operands this value was computed from, in construction order
    pub fn children(&self) -> Vec<Value> {
        self.0
            .borrow()
            .children
            .iter()
            .map(|c| Value(c.clone()))
            .collect()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.borrow().children.is_empty()
    }

    /// Overwrites the data of a leaf, used by optimizers to update parameters.
    /// Derived values keep the data computed at construction.
    // Strictly, &mut isn't needed since the value is behind a shared mutable type,
    // but it indicates that the value should be excusively mutable
    pub fn set_data(&mut self, data: f64) {
        debug_assert!(self.is_leaf(), "set_data called on a derived value");
        self.0.borrow_mut().data = data;
    }

    /// Unlike PyTorch which only zeros out the gradients of the leaf nodes, this zeros out
    /// all gradients in the computation graph which are children of this node
    pub fn zero_grad(&mut self) {
        for value in self.topological_order() {
            value.0.borrow_mut().grad = 0.0;
        }
    }

    /// Backpropagates from this value, accumulating into the gradient of every value it
    /// depends on. Only the gradient of `self` is reset (to 1), all others accumulate.
    pub fn backward(&self) {
        let backprop_order = self.topological_order();
        log::trace!("backward over {} values", backprop_order.len());

        // d out / d out = 1
        self.0.borrow_mut().grad = 1.0;

        // apply backprop, reversed to start from root first
        for value in backprop_order.iter().rev() {
            let children = value.children();
            if let Some(f) = value.backprop_fn() {
                debug_assert_eq!(f.n_operands(), children.len());
            }
            match children.as_slice() {
                [] => {}
                [in1] => update_gradients_one_operand(in1, value),
                [in1, in2] => update_gradients_two_operands(in1, in2, value),
                _ => unreachable!("Unsupported number of operands: {}", children.len()),
            }
        }
    }

    /// Values reachable from `self` in post order: every value appears after all of its
    /// children, and `self` comes last.
    fn topological_order(&self) -> Vec<Value> {
        let mut order = vec![];
        let mut visited: HashSet<u64> = HashSet::new();
        self.build_topo(&mut order, &mut visited);
        order
    }

    fn build_topo(&self, order: &mut Vec<Value>, visited: &mut HashSet<u64>) {
        if !visited.insert(self.id()) {
            return;
        }
        for child in self.children() {
            child.build_topo(order, visited);
        }
        order.push(self.clone());
    }
}

// Various operations on values
impl Value {
    /// Raises the value to a constant power
    pub fn pow(&self, exponent: f64) -> Value {
        Value::new_derived(
            self.data().powf(exponent),
            BackpropFunc::Pow(exponent),
            &[self],
        )
    }

    pub fn exp(&self) -> Value {
        Value::new_derived(self.data().exp(), BackpropFunc::Exp, &[self])
    }

    pub fn tanh(&self) -> Value {
        Value::new_derived(self.data().tanh(), BackpropFunc::Tanh, &[self])
    }

    pub fn relu(&self) -> Value {
        let data = self.data();
        // NaN passes through rather than being clamped
        let data = if data < 0.0 { 0.0 } else { data };
        Value::new_derived(data, BackpropFunc::ReLU, &[self])
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value(data={}, grad={})", self.data(), self.grad())
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Value")
            .field("id", &inner.id)
            .field("data", &inner.data)
            .field("grad", &inner.grad)
            .field("backprop_fn", &inner.backprop_fn)
            .field("n_children", &inner.children.len())
            .finish()
    }
}

impl Add for &Value {
    type Output = Value;

    fn add(self, other: &Value) -> Value {
        Value::new_derived(self.data() + other.data(), BackpropFunc::Add, &[self, other])
    }
}

impl Sub for &Value {
    type Output = Value;

    fn sub(self, other: &Value) -> Value {
        Value::new_derived(self.data() - other.data(), BackpropFunc::Sub, &[self, other])
    }
}

impl Mul for &Value {
    type Output = Value;

    fn mul(self, other: &Value) -> Value {
        Value::new_derived(self.data() * other.data(), BackpropFunc::Mul, &[self, other])
    }
}

impl Div for &Value {
    type Output = Value;

    /// `a / b = a * b^-1`, a zero divisor yields inf or NaN
    fn div(self, other: &Value) -> Value {
        self * &other.pow(-1.0)
    }
}

impl Neg for &Value {
    type Output = Value;

    fn neg(self) -> Value {
        Value::new_derived(-self.data(), BackpropFunc::Neg, &[self])
    }
}

impl Neg for Value {
    type Output = Value;

    fn neg(self) -> Value {
        -&self
    }
}

impl Sum for Value {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Value::new(0.0), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Value> for Value {
    fn sum<I: Iterator<Item = &'a Value>>(iter: I) -> Self {
        iter.fold(Value::new(0.0), |acc, v| &acc + v)
    }
}

/// Implements an operator for the owned/borrowed combinations of `[Value]` by delegating to
/// the `&Value op &Value` impl
macro_rules! impl_arithmetic(
    ($trait:ident, $trait_method:ident, $operator:tt) => {
        impl $trait for Value {
            type Output = Value;

            fn $trait_method(self, other: Value) -> Value {
                &self $operator &other
            }
        }

        impl $trait<&Value> for Value {
            type Output = Value;

            fn $trait_method(self, other: &Value) -> Value {
                &self $operator other
            }
        }

        impl $trait<Value> for &Value {
            type Output = Value;

            fn $trait_method(self, other: Value) -> Value {
                self $operator &other
            }
        }
    }
);
impl_arithmetic!(Add, add, +);
impl_arithmetic!(Sub, sub, -);
impl_arithmetic!(Mul, mul, *);
impl_arithmetic!(Div, div, /);

/// Implements an operator between `[Value]` and a `f64` literal on either side. The literal
/// is promoted to a leaf, so `2.0 - &x` keeps the operand order of the subtraction.
macro_rules! impl_scalar_arithmetic(
    ($trait:ident, $trait_method:ident, $operator:tt) => {
        impl $trait<f64> for &Value {
            type Output = Value;

            fn $trait_method(self, other: f64) -> Value {
                self $operator &Value::new(other)
            }
        }

        impl $trait<f64> for Value {
            type Output = Value;

            fn $trait_method(self, other: f64) -> Value {
                &self $operator &Value::new(other)
            }
        }

        impl $trait<&Value> for f64 {
            type Output = Value;

            fn $trait_method(self, other: &Value) -> Value {
                &Value::new(self) $operator other
            }
        }

        impl $trait<Value> for f64 {
            type Output = Value;

            fn $trait_method(self, other: Value) -> Value {
                &Value::new(self) $operator &other
            }
        }
    }
);
impl_scalar_arithmetic!(Add, add, +);
impl_scalar_arithmetic!(Sub, sub, -);
impl_scalar_arithmetic!(Mul, mul, *);
impl_scalar_arithmetic!(Div, div, /);

// unfortunate that there isn't a blanket impl for AsRef<T> for T
// <https://doc.rust-lang.org/std/convert/trait.AsRef.html#reflexivity>
impl AsRef<Value> for Value {
    fn as_ref(&self) -> &Value {
        self
    }
}

impl From<f64> for Value {
    fn from(data: f64) -> Self {
        Value::new(data)
    }
}

pub(crate) struct InnerValue {
    pub(crate) data: f64,
    /// gradient of the output of the last backward pass with respect to this value
    pub(crate) grad: f64,
    /// List of the node inputs in the forward pass
    /// These nodes are "children" in the backwards pass
    children: Vec<SharedValue>,
    /// Unique identifier for the node
    id: u64,
    /// The function which created this value from its children
    /// `None` when the value is a leaf node
    pub(crate) backprop_fn: Option<BackpropFunc>,
}

impl InnerValue {
    fn new(data: f64, backprop_fn: Option<BackpropFunc>, children: Vec<SharedValue>) -> Self {
        Self {
            data,
            grad: 0.0,
            children,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            backprop_fn,
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[macro_export]
    macro_rules! assert_eq_float {
        ($a:expr, $b:expr) => {
            $crate::assert_eq_float!($a, $b, 1e-6)
        };
        ($a:expr, $b:expr, $tol:expr) => {{
            let (a, b) = ($a, $b);
            assert!((a - b).abs() < $tol, "{} != {} (tolerance {})", a, b, $tol);
        }};
    }

    #[test]
    fn test_leaf() {
        let a = Value::new(2.5);
        assert_eq!(a.data(), 2.5);
        assert_eq!(a.grad(), 0.0);
        assert!(a.is_leaf());
        assert!(a.backprop_fn().is_none());
        a.backward();
        assert_eq!(a.grad(), 1.0);
    }

    #[test]
    fn test_from_slice() {
        let xs = Value::from_slice(&[1.0, -2.0, 3.5]);
        assert_eq!(
            xs.iter().map(Value::data).collect::<Vec<_>>(),
            vec![1.0, -2.0, 3.5]
        );
        assert!(xs.iter().all(Value::is_leaf));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Value::new(1.0);
        let b = Value::new(1.0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_add() {
        let a = Value::new(2.0);
        let b = Value::new(3.0);

        let c = &a + &b;
        assert_eq!(c.data(), 5.0);
        assert_eq!(c.backprop_fn(), Some(BackpropFunc::Add));
        c.backward();

        // dc/da = 1
        // dc/db = 1
        assert_eq!(a.grad(), 1.0);
        assert_eq!(b.grad(), 1.0);
    }

    #[test]
    fn test_mul() {
        let a = Value::new(2.0);
        let b = Value::new(3.0);

        let c = &a * &b;
        assert_eq!(c.data(), 6.0);

        c.backward();

        // dc/da = b
        // dc/db = a
        assert_eq!(a.grad(), 3.0);
        assert_eq!(b.grad(), 2.0);
    }

    #[test]
    fn test_neg() {
        let a = Value::new(2.0);
        let b = -&a;
        assert_eq!(b.data(), -2.0);

        b.backward();

        assert_eq!(a.grad(), -1.0);
    }

    #[test]
    fn test_sub() {
        let a = Value::new(2.0);
        let b = Value::new(3.0);

        let c = &a - &b;
        assert_eq!(c.data(), -1.0);

        c.backward();

        // dc/da = 1
        // dc/db = -1
        assert_eq!(a.grad(), 1.0);
        assert_eq!(b.grad(), -1.0);
    }

    #[test]
    fn test_div() {
        let a = Value::new(2.0);
        let b = Value::new(3.0);

        let c = &a / &b;
        assert_eq_float!(c.data(), 2.0 / 3.0);
        assert_eq!(c.backprop_fn(), Some(BackpropFunc::Mul));

        c.backward();

        // dc/da = 1/b
        // dc/db = -a/b^2
        assert_eq_float!(a.grad(), 1.0 / 3.0);
        assert_eq_float!(b.grad(), -2.0 / 9.0);
    }

    #[test]
    fn test_div_by_zero_is_not_finite() {
        let a = Value::new(1.0);
        let b = Value::new(0.0);
        let c = &a / &b;
        assert!(c.data().is_infinite());

        let zero = Value::new(0.0);
        let d = &zero / &b;
        assert!(d.data().is_nan());
    }

    #[test]
    fn test_pow() {
        let a = Value::new(2.0);
        let c = a.pow(3.0);
        assert_eq_float!(c.data(), 8.0);
        assert_eq!(c.backprop_fn(), Some(BackpropFunc::Pow(3.0)));

        c.backward();

        // dc/da = 3a^2
        assert_eq_float!(a.grad(), 12.0);
    }

    #[test]
    fn test_pow_negative_base_integer_exponent() {
        let a = Value::new(-3.0);
        let c = a.pow(2.0);
        assert_eq_float!(c.data(), 9.0);
        c.backward();
        assert_eq_float!(a.grad(), -6.0);
    }

    #[test]
    fn test_pow_at_zero_propagates_non_finite() {
        let a = Value::new(0.0);
        let c = a.pow(0.5);
        assert_eq!(c.data(), 0.0);
        c.backward();
        assert!(a.grad().is_infinite());

        let b = Value::new(-4.0);
        assert!(b.pow(0.5).data().is_nan());
    }

    #[test]
    fn test_exp() {
        let a = Value::new(1.5);
        let c = a.exp();
        assert_eq_float!(c.data(), 1.5f64.exp());
        c.backward();
        assert_eq_float!(a.grad(), 1.5f64.exp());
    }

    #[test]
    fn test_tanh() {
        let a = Value::new(0.5);
        let c = a.tanh();
        let t = ((2.0f64 * 0.5).exp() - 1.0) / ((2.0f64 * 0.5).exp() + 1.0);
        assert_eq_float!(c.data(), t);
        c.backward();
        assert_eq_float!(a.grad(), 1.0 - t * t);
    }

    #[test]
    fn test_tanh_saturates() {
        let a = Value::new(1000.0);
        let c = a.tanh();
        assert_eq!(c.data(), 1.0);
        c.backward();
        assert_eq!(a.grad(), 0.0);
    }

    #[test]
    fn test_relu() {
        let a = Value::new(1.0);
        let b = Value::new(2.0);
        let c = &a * &b;
        let z = c.relu();
        assert_eq_float!(z.data(), 2.0);

        z.backward();

        // dz/dc = 1
        // dc/da = b
        // dc/db = a
        assert_eq_float!(a.grad(), 2.0);
        assert_eq_float!(b.grad(), 1.0);
        assert_eq_float!(c.grad(), 1.0);
    }

    #[test]
    fn test_relu_activation_scenario() {
        let x = Value::new(-1.0);
        let y = x.relu();
        assert_eq!(y.data(), 0.0);
        y.backward();
        assert_eq!(x.grad(), 0.0);

        let x = Value::new(2.0);
        let y = x.relu();
        assert_eq!(y.data(), 2.0);
        y.backward();
        assert_eq!(x.grad(), 1.0);
    }

    #[test]
    fn test_relu_keeps_nan() {
        let x = Value::new(f64::NAN);
        assert!(x.relu().data().is_nan());
    }

    #[test]
    fn test_expression_graph() {
        let a = Value::new(2.0);
        let b = Value::new(-3.0);
        let c = Value::new(10.0);
        let e = &a * &b;
        let d = &e + &c;
        let f = Value::new(-2.0);
        let l = &d * &f;
        assert_eq!(l.data(), -8.0);

        l.backward();

        assert_eq!(l.grad(), 1.0);
        assert_eq!(a.grad(), 6.0);
        assert_eq!(b.grad(), -4.0);
        assert_eq!(c.grad(), -2.0);
        assert_eq!(d.grad(), -2.0);
        assert_eq!(e.grad(), -2.0);
        assert_eq!(f.grad(), 4.0);
    }

    #[test]
    fn test_same_value_used_twice() {
        let x = Value::new(3.0);
        let y = &x + &x;
        assert_eq!(y.data(), 6.0);
        y.backward();
        assert_eq!(x.grad(), 2.0);

        let x = Value::new(3.0);
        let y = &x * &x;
        y.backward();
        assert_eq!(x.grad(), 6.0);
    }

    #[test]
    fn test_diamond_accumulates_all_paths() {
        // y = (x * 2) + (x * 3) + x
        let x = Value::new(1.5);
        let a = &x * 2.0;
        let b = &x * 3.0;
        let y = &(&a + &b) + &x;
        y.backward();
        assert_eq!(x.grad(), 6.0);
    }

    #[test]
    fn test_scalar_operands_either_side() {
        let x = Value::new(4.0);

        let y = 2.0 - &x;
        assert_eq!(y.data(), -2.0);
        y.backward();
        assert_eq!(x.grad(), -1.0);

        let x = Value::new(4.0);
        let y = &x - 2.0;
        assert_eq!(y.data(), 2.0);
        y.backward();
        assert_eq!(x.grad(), 1.0);

        let x = Value::new(4.0);
        let y = 3.0 * &x + 1.0;
        assert_eq!(y.data(), 13.0);
        y.backward();
        assert_eq!(x.grad(), 3.0);

        let x = Value::new(4.0);
        let y = 2.0 / &x;
        assert_eq_float!(y.data(), 0.5);
        y.backward();
        assert_eq_float!(x.grad(), -2.0 / 16.0);
    }

    #[test]
    fn test_value_is_fixed_after_construction() {
        let a = Value::new(2.0);
        let b = &a * 3.0;
        let first = b.data();
        b.backward();
        b.backward();
        assert_eq!(b.data(), first);
        assert_eq!(b.data(), b.data());
    }

    #[test]
    fn test_backward_accumulates_without_zeroing() {
        let a = Value::new(2.0);
        let b = &a * 3.0;
        b.backward();
        b.backward();
        assert_eq!(a.grad(), 6.0);
        // the root itself is reset, not accumulated
        assert_eq!(b.grad(), 1.0);
    }

    #[test]
    fn test_zero_grad_then_backward_matches_fresh() {
        let a = Value::new(2.0);
        let b = Value::new(-3.0);
        let mut l = (&a * &b + a.tanh()).exp();
        l.backward();
        let (first_a, first_b) = (a.grad(), b.grad());

        l.zero_grad();
        assert_eq!(a.grad(), 0.0);
        assert_eq!(b.grad(), 0.0);
        assert_eq!(l.grad(), 0.0);

        l.backward();
        assert_eq!(a.grad(), first_a);
        assert_eq!(b.grad(), first_b);
    }

    #[test]
    fn test_sum() {
        let xs = Value::from_slice(&[1.0, 2.0, 3.0]);
        let total: Value = xs.iter().sum();
        assert_eq!(total.data(), 6.0);
        total.backward();
        assert!(xs.iter().all(|x| x.grad() == 1.0));
    }

    #[test]
    fn test_children_in_construction_order() {
        let a = Value::new(1.0);
        let b = Value::new(2.0);
        let c = &a - &b;
        let ids = c.children().iter().map(Value::id).collect::<Vec<_>>();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn test_display() {
        let a = Value::new(2.0);
        assert_eq!(a.to_string(), "Value(data=2, grad=0)");
    }

    #[test]
    fn test_set_data() {
        let mut a = Value::new(2.0);
        a.set_data(5.0);
        assert_eq!(a.data(), 5.0);
    }
}
