//! Fully connected layers, used for both `dense` and `output`.

use crate::graph::TensorBatch;
use crate::layers::Activation;
use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::backend::Backend,
};

/// Parameters of a `dense` or `output` layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseParams {
    /// Output features.
    pub units: usize,
    /// Applied to `x @ W + b`.
    pub activation: Activation,
    pub use_bias: bool,
}

impl DenseParams {
    /// Linear activation with a bias.
    pub fn new(units: usize) -> Self {
        Self {
            units,
            activation: Activation::None,
            use_bias: true,
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Builds the layer for samples of `input_size` features.
    pub fn init<B: Backend>(&self, input_size: usize, device: &B::Device) -> Dense<B> {
        let linear = LinearConfig::new(input_size, self.units)
            .with_bias(self.use_bias)
            .init(device);

        Dense {
            linear,
            input_size,
            output_size: self.units,
            activation_id: self.activation.to_id(),
        }
    }
}

/// `activation(x @ W + b)` over a batch collapsed to `[batch, features]`.
#[derive(Module, Debug)]
pub struct Dense<B: Backend> {
    linear: Linear<B>,
    input_size: usize,
    output_size: usize,
    /// See [`Activation::to_id`].
    activation_id: u8,
}

impl<B: Backend> Dense<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let output = self.linear.forward(input.into_flat());
        TensorBatch::Flat(self.activation().apply(output))
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn activation(&self) -> Activation {
        Activation::from_id(self.activation_id)
    }
}
