//! Optimizer(s)

use crate::values::Value;

/// Common interface for optimizers
/// Analogous to the torch.optim.Optimizer interface
/// <https://pytorch.org/docs/stable/optim.html#base-class>
pub trait Optim {
    /// Performs a single optimization step with accumulated gradients
    fn step(&mut self);
    /// Zeros gradients for all parameters
    fn zero_grad(&mut self);
}

/// SGD with momentum, a momentum of 0 gives plain `p -= lr * grad`
pub struct SGD {
    params: Vec<Value>,
    lr: f64,
    momentum: f64,
    // velocity per parameter
    velocity: Vec<f64>,
}

impl SGD {
    pub fn new(params: Vec<Value>, lr: f64, momentum: f64) -> Self {
        let velocity = vec![0.0; params.len()];
        Self {
            params,
            lr,
            momentum,
            velocity,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Updates the learning rate used by subsequent steps, e.g. from a schedule
    pub fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }

    #[cfg(test)]
    fn velocities(&self) -> &[f64] {
        &self.velocity
    }
}

impl Optim for SGD {
    fn step(&mut self) {
        for (idx, param) in self.params.iter_mut().enumerate() {
            // SGD with momentum
            let velocity = self.momentum * self.velocity[idx] - self.lr * param.grad();
            let new_val = param.data() + velocity;
            self.velocity[idx] = velocity;
            param.set_data(new_val);
        }
    }

    fn zero_grad(&mut self) {
        for param in self.params.iter_mut() {
            param.zero_grad();
        }
    }
}

/// Learning rate decaying linearly from `start` at step 0 towards `end` at `total_steps`
pub fn linear_decay(start: f64, end: f64, step: usize, total_steps: usize) -> f64 {
    if total_steps == 0 {
        return start;
    }
    start - (start - end) * step as f64 / total_steps as f64
}

#[cfg(test)]
mod tests {
    use crate::assert_eq_float;

    use super::*;

    #[test]
    fn test_sgd_no_momentum() {
        let a = Value::new(1.0);
        let b = Value::new(2.0);
        let c = &a * &b;
        c.backward();

        let mut optim = SGD::new(vec![a.clone(), b.clone()], 0.1, 0.0);
        optim.step();
        assert_eq!(a.grad(), 2.0);
        assert_eq!(b.grad(), 1.0);
        assert_eq_float!(a.data(), 0.8);
        assert_eq_float!(b.data(), 1.9);
    }

    #[test]
    fn test_sgd_with_momentum() {
        let a = Value::new(1.0);
        let b = Value::new(2.0);
        let c = &a + &b;
        c.backward();

        let mut optim = SGD::new(vec![a.clone(), b.clone()], 0.1, 0.9);
        optim.step();
        assert_eq_float!(a.data(), 0.9);
        assert_eq_float!(b.data(), 1.9);
        assert_eq_float!(optim.velocities()[0], -0.1);
        optim.step();
        assert_eq_float!(a.data(), 0.71);
        assert_eq_float!(b.data(), 1.71);
        assert_eq_float!(optim.velocities()[1], -0.19);
    }

    #[test]
    fn test_zero_grad() {
        let a = Value::new(1.0);
        let c = &a * 3.0;
        c.backward();
        let mut optim = SGD::new(vec![a.clone()], 0.1, 0.0);
        optim.zero_grad();
        assert_eq!(a.grad(), 0.0);
    }

    #[test]
    fn test_set_lr() {
        let mut optim = SGD::new(vec![], 1.0, 0.0);
        optim.set_lr(0.5);
        assert_eq!(optim.lr(), 0.5);
    }

    #[test]
    fn test_linear_decay() {
        assert_eq_float!(linear_decay(1.0, 0.1, 0, 100), 1.0);
        assert_eq_float!(linear_decay(1.0, 0.1, 50, 100), 0.55);
        assert_eq_float!(linear_decay(1.0, 0.1, 100, 100), 0.1);
        assert_eq_float!(linear_decay(1.0, 0.1, 3, 0), 1.0);
    }
}
