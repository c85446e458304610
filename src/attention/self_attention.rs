use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{Tensor, activation::softmax, backend::Backend},
};

use super::{dropout_rate, sequence_dims};
use crate::errors::OperatorError;
use crate::graph::TensorBatch;

/// Hyperparameters of a multi-head self-attention operator.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfAttentionConfig {
    pub num_heads: usize,
    /// Width of each head's query/key/value projection.
    pub key_dim: usize,
    /// Dropout applied to the attention weights while training.
    pub dropout: f64,
}

impl SelfAttentionConfig {
    pub fn new(num_heads: usize, key_dim: usize) -> Self {
        Self {
            num_heads,
            key_dim,
            dropout: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Allocates the projections for samples of `[sequence, embedding]`.
    pub fn build<B: Backend>(
        &self,
        input_shape: &[usize],
        device: &B::Device,
    ) -> Result<MultiHeadSelfAttention<B>, OperatorError> {
        let [seq_len, embed_dim] = sequence_dims("multiHeadAttention", input_shape)?;
        let dropout = dropout_rate("multiHeadAttention", self.dropout)?;
        let inner = self.num_heads * self.key_dim;
        log::debug!(
            "Building attention: {} heads x {} over [{seq_len}, {embed_dim}]",
            self.num_heads,
            self.key_dim
        );

        Ok(MultiHeadSelfAttention {
            query: LinearConfig::new(embed_dim, inner).init(device),
            key: LinearConfig::new(embed_dim, inner).init(device),
            value: LinearConfig::new(embed_dim, inner).init(device),
            output: LinearConfig::new(inner, embed_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            num_heads: self.num_heads,
            head_dim: self.key_dim,
            seq_len,
            embed_dim,
        })
    }
}

/// Scaled dot-product self-attention with learned projections.
#[derive(Module, Debug)]
pub struct MultiHeadSelfAttention<B: Backend> {
    query: Linear<B>,
    key: Linear<B>,
    value: Linear<B>,
    output: Linear<B>,
    dropout: Dropout,
    num_heads: usize,
    head_dim: usize,
    seq_len: usize,
    embed_dim: usize,
}

impl<B: Backend> MultiHeadSelfAttention<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let x = input.into_sequence([self.seq_len, self.embed_dim]);
        TensorBatch::Sequence(self.attend(x))
    }

    /// Attends over `[batch, sequence, embedding]` and returns the same shape.
    pub fn attend(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = x.dims();

        let q = self.split_heads(self.query.forward(x.clone()));
        let k = self.split_heads(self.key.forward(x.clone()));
        let v = self.split_heads(self.value.forward(x));

        let scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((self.head_dim as f64).sqrt());
        let weights = self.dropout.forward(softmax(scores, 3));

        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq_len, self.num_heads * self.head_dim]);
        self.output.forward(context)
    }

    /// `[batch, seq, heads * head_dim]` to `[batch, heads, seq, head_dim]`.
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, seq_len, _] = x.dims();
        x.reshape([batch, seq_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }
}
