//! Layers that only change how samples are laid out.

use crate::graph::TensorBatch;
use burn::{module::Module, tensor::backend::Backend};

/// Collapses every sample into a single feature axis.
#[derive(Module, Clone, Debug)]
pub struct Flatten {
    output_size: usize,
}

impl Flatten {
    pub fn new(output_size: usize) -> Self {
        Self { output_size }
    }

    pub fn forward<B: Backend>(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        TensorBatch::Flat(input.into_flat())
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }
}

/// Averages `[sequence, embedding]` samples over the sequence axis.
#[derive(Module, Clone, Debug)]
pub struct GlobalAvgPool1d {
    sequence_length: usize,
    embedding_dim: usize,
}

impl GlobalAvgPool1d {
    pub fn new(sequence_length: usize, embedding_dim: usize) -> Self {
        Self {
            sequence_length,
            embedding_dim,
        }
    }

    pub fn forward<B: Backend>(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let batch = input.batch_size();
        let pooled = input
            .into_sequence([self.sequence_length, self.embedding_dim])
            .mean_dim(1)
            .reshape([batch, self.embedding_dim]);
        TensorBatch::Flat(pooled)
    }
}
