//! Shape-preserving regularization layers.

use crate::graph::TensorBatch;
use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig},
    tensor::backend::Backend,
};

/// Layer normalization over the last axis of each sample.
#[derive(Module, Debug)]
pub struct LayerNormLayer<B: Backend> {
    norm: LayerNorm<B>,
}

impl<B: Backend> LayerNormLayer<B> {
    pub fn new(features: usize, epsilon: f64, device: &B::Device) -> Self {
        Self {
            norm: LayerNormConfig::new(features)
                .with_epsilon(epsilon)
                .init(device),
        }
    }

    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        match input {
            TensorBatch::Flat(x) => TensorBatch::Flat(self.norm.forward(x)),
            TensorBatch::Sequence(x) => TensorBatch::Sequence(self.norm.forward(x)),
            TensorBatch::Spatial(x) => TensorBatch::Spatial(self.norm.forward(x)),
        }
    }
}

/// Dropout that is only active while training on an autodiff backend.
#[derive(Module, Clone, Debug)]
pub struct DropoutLayer {
    dropout: Dropout,
}

impl DropoutLayer {
    pub fn new(rate: f64) -> Self {
        Self {
            dropout: DropoutConfig::new(rate).init(),
        }
    }

    pub fn forward<B: Backend>(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        match input {
            TensorBatch::Flat(x) => TensorBatch::Flat(self.dropout.forward(x)),
            TensorBatch::Sequence(x) => TensorBatch::Sequence(self.dropout.forward(x)),
            TensorBatch::Spatial(x) => TensorBatch::Spatial(self.dropout.forward(x)),
        }
    }
}
