//! Token embedding lookup.

use crate::graph::TensorBatch;
use burn::{
    module::Module,
    nn::{Embedding, EmbeddingConfig},
    tensor::backend::Backend,
};

/// Parameters of an `embedding` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingParams {
    /// Vocabulary size.
    pub input_dim: usize,
    /// Width of each embedding vector.
    pub output_dim: usize,
}

impl EmbeddingParams {
    pub fn init<B: Backend>(&self, seq_len: usize, device: &B::Device) -> EmbeddingLayer<B> {
        EmbeddingLayer {
            embedding: EmbeddingConfig::new(self.input_dim, self.output_dim).init(device),
            input_dim: self.input_dim,
            seq_len,
        }
    }
}

/// Maps `[batch, sequence]` token ids to `[batch, sequence, output_dim]`.
///
/// Ids arrive as floats and are truncated, then clamped into the vocabulary.
#[derive(Module, Debug)]
pub struct EmbeddingLayer<B: Backend> {
    embedding: Embedding<B>,
    input_dim: usize,
    seq_len: usize,
}

impl<B: Backend> EmbeddingLayer<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let ids = input
            .into_flat()
            .int()
            .clamp(0, self.input_dim.saturating_sub(1) as i64);
        TensorBatch::Sequence(self.embedding.forward(ids))
    }

    pub fn sequence_length(&self) -> usize {
        self.seq_len
    }
}
