use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    tensor::{Tensor, activation::relu, backend::Backend},
};

use super::{MultiHeadSelfAttention, SelfAttentionConfig, dropout_rate, sequence_dims};
use crate::errors::OperatorError;
use crate::graph::TensorBatch;

/// Hyperparameters of a post-norm transformer encoder block.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerBlockConfig {
    pub num_heads: usize,
    /// Hidden width of the feed-forward network.
    pub ff_dim: usize,
    /// Per-head width; `None` splits the embedding evenly across heads.
    pub key_dim: Option<usize>,
    pub dropout: f64,
}

impl TransformerBlockConfig {
    pub fn new(num_heads: usize, ff_dim: usize) -> Self {
        Self {
            num_heads,
            ff_dim,
            key_dim: None,
            dropout: 0.1,
        }
    }

    pub fn with_key_dim(mut self, key_dim: usize) -> Self {
        self.key_dim = Some(key_dim);
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Per-head width for an embedding of `embedding_dim`.
    pub fn head_dim(&self, embedding_dim: usize) -> Result<usize, OperatorError> {
        match self.key_dim {
            Some(key_dim) => Ok(key_dim),
            None if self.num_heads > 0 && embedding_dim % self.num_heads == 0 => {
                Ok(embedding_dim / self.num_heads)
            }
            None => Err(OperatorError::IndivisibleHeads {
                embedding_dim,
                num_heads: self.num_heads,
            }),
        }
    }

    pub fn build<B: Backend>(
        &self,
        input_shape: &[usize],
        device: &B::Device,
    ) -> Result<TransformerBlock<B>, OperatorError> {
        let [seq_len, embed_dim] = sequence_dims("transformerBlock", input_shape)?;
        let dropout = dropout_rate("transformerBlock", self.dropout)?;
        let head_dim = self.head_dim(embed_dim)?;

        let attention = SelfAttentionConfig::new(self.num_heads, head_dim)
            .with_dropout(dropout)
            .build(&[seq_len, embed_dim], device)?;

        Ok(TransformerBlock {
            attention,
            ffn_in: LinearConfig::new(embed_dim, self.ff_dim).init(device),
            ffn_out: LinearConfig::new(self.ff_dim, embed_dim).init(device),
            norm1: LayerNormConfig::new(embed_dim).with_epsilon(1e-6).init(device),
            norm2: LayerNormConfig::new(embed_dim).with_epsilon(1e-6).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            seq_len,
            embed_dim,
        })
    }
}

/// Self-attention and a feed-forward network, each wrapped in dropout, a
/// residual connection and layer normalization (post-norm).
#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    attention: MultiHeadSelfAttention<B>,
    ffn_in: Linear<B>,
    ffn_out: Linear<B>,
    norm1: LayerNorm<B>,
    norm2: LayerNorm<B>,
    dropout: Dropout,
    seq_len: usize,
    embed_dim: usize,
}

impl<B: Backend> TransformerBlock<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let x = input.into_sequence([self.seq_len, self.embed_dim]);
        TensorBatch::Sequence(self.encode(x))
    }

    pub fn encode(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attended = self.attention.attend(x.clone());
        let x = self.norm1.forward(x + self.dropout.forward(attended));

        let hidden = self
            .ffn_out
            .forward(relu(self.ffn_in.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(hidden))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_head_dim() {
        let config = TransformerBlockConfig::new(4, 32);
        assert_eq!(config.head_dim(64), Ok(16));
        assert_eq!(
            config.head_dim(30),
            Err(OperatorError::IndivisibleHeads {
                embedding_dim: 30,
                num_heads: 4
            })
        );
        assert_eq!(config.with_key_dim(7).head_dim(30), Ok(7));
    }

    #[test]
    fn test_block_preserves_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let block: TransformerBlock<TestBackend> = TransformerBlockConfig::new(2, 32)
            .build(&[7, 16], &device)
            .unwrap();

        let input = Tensor::<TestBackend, 3>::random(
            [2, 7, 16],
            burn::tensor::Distribution::Default,
            &device,
        );
        assert_eq!(block.encode(input).dims(), [2, 7, 16]);
    }

    #[test]
    fn test_block_output_is_normalized() {
        let device = <TestBackend as Backend>::Device::default();
        let block: TransformerBlock<TestBackend> = TransformerBlockConfig::new(2, 8)
            .build(&[3, 4], &device)
            .unwrap();

        let input = Tensor::<TestBackend, 3>::ones([1, 3, 4], &device);
        let means: Vec<f32> = block
            .encode(input)
            .mean_dim(2)
            .to_data()
            .to_vec()
            .unwrap();
        for mean in means {
            assert!(mean.abs() < 1e-4);
        }
    }

    #[test]
    fn test_block_parameter_count() {
        let device = <TestBackend as Backend>::Device::default();
        let block: TransformerBlock<TestBackend> = TransformerBlockConfig::new(2, 32)
            .build(&[5, 16], &device)
            .unwrap();

        let attention = 3 * (16 * 16 + 16) + (16 * 16 + 16);
        let ffn = (16 * 32 + 32) + (32 * 16 + 16);
        let norms = 2 * (16 + 16);
        assert_eq!(block.num_params(), attention + ffn + norms);
    }

    #[test]
    fn test_indivisible_heads_fail_to_build() {
        let device = <TestBackend as Backend>::Device::default();
        let result = TransformerBlockConfig::new(3, 8).build::<TestBackend>(&[4, 16], &device);
        assert!(matches!(result, Err(OperatorError::IndivisibleHeads { .. })));
    }

    #[test]
    fn test_out_of_range_dropout_fails_to_build() {
        let device = <TestBackend as Backend>::Device::default();
        let result = TransformerBlockConfig::new(2, 8)
            .with_dropout(1.5)
            .build::<TestBackend>(&[4, 16], &device);
        assert!(matches!(
            result,
            Err(OperatorError::InvalidDropout { operator: "transformerBlock", .. })
        ));
    }
}
