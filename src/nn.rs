//! Components to build a neural network

use std::{
    fmt::{self, Display},
    sync::atomic::{self, AtomicUsize},
};

use clap::ValueEnum;
use rand::Rng;
use thiserror::Error;

use crate::values::Value;

/// Errors for the neural network
#[derive(Debug, Error)]
pub enum NNError {
    #[error("Input size mismatch: expected {expected}, got {got}")]
    InputSizeMismatch { expected: usize, got: usize },
    #[error("Expected one activation per layer ({layers}), got {activations}")]
    ActivationCountMismatch { layers: usize, activations: usize },
    #[error("A network needs at least one layer")]
    EmptyNetwork,
}

/// Represents the torch.nn.Module. NNs should implement this trait.
/// <https://github.com/pytorch/pytorch/blob/v2.6.0/torch/nn/modules/module.py#L402>
pub trait Module {
    fn zero_grad(&mut self) {
        for p in self.parameters().iter_mut() {
            p.zero_grad();
        }
    }

    fn parameters(&self) -> Vec<Value>;
    fn forward(&self, inputs: &[Value]) -> Result<Vec<Value>, NNError>;
}

/// Nonlinearity applied to the output of a neuron
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Activation {
    Linear,
    #[value(name = "relu")]
    ReLU,
    Tanh,
}

impl Activation {
    pub fn apply(&self, v: Value) -> Value {
        match self {
            Activation::Linear => v,
            Activation::ReLU => v.relu(),
            Activation::Tanh => v.tanh(),
        }
    }
}

impl Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Linear => write!(f, "Linear"),
            Activation::ReLU => write!(f, "ReLU"),
            Activation::Tanh => write!(f, "Tanh"),
        }
    }
}

/// A single neuron in a layer of a NN
pub struct Neuron {
    /// weights of the neuron
    pub weights: Vec<Value>,
    /// bias of the neuron
    pub bias: Value,
    pub activation: Activation,
}

impl Neuron {
    /// Weights and bias are drawn uniformly from [-1, 1)
    pub fn new<R: Rng>(n_inputs: usize, activation: Activation, rng: &mut R) -> Self {
        let weights = (0..n_inputs)
            .map(|_| Value::new(rng.random_range(-1.0..1.0)))
            .collect();
        Self {
            weights,
            bias: Value::new(rng.random_range(-1.0..1.0)),
            activation,
        }
    }

    // Testing utility for a deterministic and simple neuron
    #[cfg(test)]
    fn new_ones(n_inputs: usize, activation: Activation) -> Self {
        Self {
            weights: (0..n_inputs).map(|_| Value::new(1.0)).collect(),
            bias: Value::new(1.0),
            activation,
        }
    }

    pub fn parameters(&self) -> Vec<Value> {
        self.weights
            .iter()
            .chain(std::iter::once(&self.bias))
            .cloned()
            .collect()
    }

    /// `activation(bias + sum(w_i * x_i))`
    pub fn forward(&self, inputs: &[Value]) -> Result<Value, NNError> {
        if inputs.len() != self.weights.len() {
            return Err(NNError::InputSizeMismatch {
                expected: self.weights.len(),
                got: inputs.len(),
            });
        }
        let act = self
            .weights
            .iter()
            .zip(inputs.iter())
            .fold(self.bias.clone(), |acc, (w, x)| acc + w * x);
        Ok(self.activation.apply(act))
    }
}

impl Display for Neuron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Neuron({})", self.activation, self.weights.len())
    }
}

/// A layer of a neural network
pub struct Layer {
    neurons: Vec<Neuron>,
    n_output_nans: AtomicUsize,
}

impl Layer {
    /// Creates a new layer with the given number of inputs and outputs
    pub fn new<R: Rng>(
        n_inputs: usize,
        n_outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let neurons = (0..n_outputs)
            .map(|_| Neuron::new(n_inputs, activation, rng))
            .collect();
        Self {
            neurons,
            n_output_nans: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    fn new_ones(n_inputs: usize, n_outputs: usize, activation: Activation) -> Self {
        let neurons = (0..n_outputs)
            .map(|_| Neuron::new_ones(n_inputs, activation))
            .collect();
        Self {
            neurons,
            n_output_nans: AtomicUsize::new(0),
        }
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// Returns all the parameters in the layer
    pub fn parameters(&self) -> Vec<Value> {
        self.neurons.iter().flat_map(|n| n.parameters()).collect()
    }

    /// Computes forward pass for a layer
    pub fn forward(&self, inputs: &[Value]) -> Result<Vec<Value>, NNError> {
        let outputs = self
            .neurons
            .iter()
            .map(|n| n.forward(inputs))
            .collect::<Result<Vec<_>, _>>()?;
        let n_output_nans = outputs.iter().filter(|v| v.data().is_nan()).count();
        self.n_output_nans
            .store(n_output_nans, atomic::Ordering::Relaxed);
        if n_output_nans > 0 {
            log::debug!("n_output_nans: {}", n_output_nans);
        }
        Ok(outputs)
    }

    /// Number of NaN outputs in the last forward pass (used for debugging)
    pub fn n_output_nans(&self) -> usize {
        self.n_output_nans.load(atomic::Ordering::Relaxed)
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let neurons = self
            .neurons
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>();
        write!(f, "[Layer of [{}]]", neurons.join(", "))
    }
}

/// A multi-layer perceptron, a stack of fully connected layers
pub struct MLP {
    layers: Vec<Layer>,
}

impl MLP {
    /// `layer_sizes` lists the number of outputs of each layer. Without explicit
    /// `activations` every layer uses ReLU except the last, which is linear.
    pub fn new<R: Rng>(
        n_inputs: usize,
        layer_sizes: &[usize],
        activations: Option<&[Activation]>,
        rng: &mut R,
    ) -> Result<Self, NNError> {
        if layer_sizes.is_empty() {
            return Err(NNError::EmptyNetwork);
        }
        let activations = match activations {
            Some(a) if a.len() != layer_sizes.len() => {
                return Err(NNError::ActivationCountMismatch {
                    layers: layer_sizes.len(),
                    activations: a.len(),
                });
            }
            Some(a) => a.to_vec(),
            None => {
                let mut a = vec![Activation::ReLU; layer_sizes.len() - 1];
                a.push(Activation::Linear);
                a
            }
        };

        let sizes = std::iter::once(n_inputs)
            .chain(layer_sizes.iter().copied())
            .collect::<Vec<_>>();
        let layers = sizes
            .windows(2)
            .zip(activations)
            .map(|(io, activation)| Layer::new(io[0], io[1], activation, rng))
            .collect();
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

impl Module for MLP {
    fn forward(&self, inputs: &[Value]) -> Result<Vec<Value>, NNError> {
        let mut x = inputs.to_vec();
        for layer in self.layers.iter() {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }

    fn parameters(&self) -> Vec<Value> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }
}

impl Display for MLP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layers = self
            .layers
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>();
        write!(f, "MLP of [{}]", layers.join(",\n "))
    }
}
