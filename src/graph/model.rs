//! Compiled networks and the handle returned to training and inference code.

use std::sync::{Arc, Weak};

use burn::module::Module;
use burn::tensor::backend::Backend;

use crate::attention::{MultiHeadSelfAttention, PositionalEncoding, TransformerBlock};
use crate::errors::ModelError;
use crate::layer_spec::LayerKind;
use crate::layers::{
    Conv2dLayer, Dense, DropoutLayer, EmbeddingLayer, Flatten, GlobalAvgPool1d, LayerNormLayer,
    MaxPool2dLayer,
};
use crate::shape::ShapeVector;

use super::TensorBatch;

/// One concrete operator of a compiled network.
#[derive(Module, Debug)]
pub enum Operator<B: Backend> {
    Dense(Dense<B>),
    Conv2d(Conv2dLayer<B>),
    MaxPool2d(MaxPool2dLayer),
    Dropout(DropoutLayer),
    Flatten(Flatten),
    Embedding(EmbeddingLayer<B>),
    SelfAttention(MultiHeadSelfAttention<B>),
    LayerNorm(LayerNormLayer<B>),
    PositionalEncoding(PositionalEncoding<B>),
    TransformerBlock(TransformerBlock<B>),
    GlobalAvgPool1d(GlobalAvgPool1d),
}

impl<B: Backend> Operator<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        match self {
            Operator::Dense(layer) => layer.forward(input),
            Operator::Conv2d(layer) => layer.forward(input),
            Operator::MaxPool2d(layer) => layer.forward(input),
            Operator::Dropout(layer) => layer.forward(input),
            Operator::Flatten(layer) => layer.forward(input),
            Operator::Embedding(layer) => layer.forward(input),
            Operator::SelfAttention(layer) => layer.forward(input),
            Operator::LayerNorm(layer) => layer.forward(input),
            Operator::PositionalEncoding(layer) => layer.forward(input),
            Operator::TransformerBlock(layer) => layer.forward(input),
            Operator::GlobalAvgPool1d(layer) => layer.forward(input),
        }
    }
}

/// The operators of a compiled layer list, applied in order.
#[derive(Module, Debug)]
pub struct Network<B: Backend> {
    operators: Vec<Operator<B>>,
}

impl<B: Backend> Network<B> {
    pub fn new(operators: Vec<Operator<B>>) -> Self {
        Self { operators }
    }

    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        self.operators
            .iter()
            .fold(input, |batch, operator| operator.forward(batch))
    }

    pub fn operators(&self) -> &[Operator<B>] {
        &self.operators
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Per-operator row of a model summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub kind: LayerKind,
    pub output_shape: ShapeVector,
    pub parameters: usize,
}

/// Observes whether the weights of a [`CompiledModel`] are still alive.
#[derive(Debug, Clone)]
pub struct ReleaseHandle(Weak<()>);

impl ReleaseHandle {
    pub fn is_released(&self) -> bool {
        self.0.strong_count() == 0
    }
}

/// A ready-to-run network together with its resolved shapes.
#[derive(Debug)]
pub struct CompiledModel<B: Backend> {
    network: Network<B>,
    summary: Vec<LayerSummary>,
    input_shape: ShapeVector,
    output_shape: ShapeVector,
    lease: Arc<()>,
}

impl<B: Backend> CompiledModel<B> {
    pub(crate) fn new(
        network: Network<B>,
        summary: Vec<LayerSummary>,
        input_shape: ShapeVector,
        output_shape: ShapeVector,
    ) -> Self {
        Self {
            network,
            summary,
            input_shape,
            output_shape,
            lease: Arc::new(()),
        }
    }

    /// Runs a batch through the network after checking it against the input
    /// shape.
    ///
    /// Any batch whose samples hold as many elements as the input shape is
    /// accepted and reshaped, so `[h, w]` images feed a model that promoted
    /// its input to `[h, w, 1]`.
    pub fn predict(&self, batch: TensorBatch<B>) -> Result<TensorBatch<B>, ModelError> {
        let batch = batch.reshape_samples(&self.input_shape)?;
        Ok(self.network.forward(batch))
    }

    /// Forward pass without shape checking.
    pub fn forward(&self, batch: TensorBatch<B>) -> TensorBatch<B> {
        self.network.forward(batch)
    }

    /// Number of trainable parameters.
    pub fn parameter_count(&self) -> usize {
        self.network.num_params()
    }

    /// Sample shape the first operator receives.
    pub fn input_shape(&self) -> &ShapeVector {
        &self.input_shape
    }

    /// Sample shape of the final output, batch dimension excluded.
    pub fn output_shape(&self) -> &ShapeVector {
        &self.output_shape
    }

    /// Returns one row per compiled layer, `input` excluded.
    pub fn summary(&self) -> &[LayerSummary] {
        &self.summary
    }

    /// Returns the underlying operator chain.
    pub fn network(&self) -> &Network<B> {
        &self.network
    }

    pub(crate) fn replace_network(&mut self, network: Network<B>) {
        self.network = network;
    }

    /// Returns a handle that reports once this model has been dropped.
    pub fn release_handle(&self) -> ReleaseHandle {
        ReleaseHandle(Arc::downgrade(&self.lease))
    }

    /// Drops the model and its weights, returning how many parameters were
    /// released.
    pub fn dispose(self) -> usize {
        let released = self.parameter_count();
        log::debug!("Disposed model with {released} parameters");
        released
    }
}
