use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};

use super::sequence_dims;
use crate::errors::OperatorError;
use crate::graph::TensorBatch;
use crate::shape::ShapeVector;

/// Hyperparameters of a sinusoidal positional encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalEncodingConfig {
    /// Longest sequence the precomputed table covers.
    pub max_length: usize,
}

impl PositionalEncodingConfig {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Precomputes the encoding table for samples of `[sequence, embedding]`.
    ///
    /// A leading batch axis is tolerated, so `[batch, sequence, embedding]`
    /// builds the same operator.
    pub fn build<B: Backend>(
        &self,
        input_shape: &[usize],
        device: &B::Device,
    ) -> Result<PositionalEncoding<B>, OperatorError> {
        let [seq_len, embedding_dim] = match input_shape.len() {
            2 => sequence_dims("positionalEncoding", input_shape)?,
            3 => sequence_dims("positionalEncoding", &input_shape[1..])?,
            _ => {
                return Err(OperatorError::UnsupportedRank {
                    operator: "positionalEncoding",
                    expected: "2 or 3",
                    shape: ShapeVector::from(input_shape.to_vec()),
                });
            }
        };
        if seq_len > self.max_length {
            return Err(OperatorError::SequenceTooLong {
                seq_len,
                max_length: self.max_length,
            });
        }

        let table = sinusoid_table(self.max_length, embedding_dim);
        let encoding = Tensor::<B, 1>::from_floats(table.as_slice(), device)
            .reshape([self.max_length, embedding_dim]);

        Ok(PositionalEncoding {
            encoding,
            seq_len,
            embedding_dim,
        })
    }
}

/// Row-major `[max_length, dim]` table: `sin` on even features, `cos` on odd
/// ones, of `position / 10000^(2 * floor(i / 2) / dim)`.
pub fn sinusoid_table(max_length: usize, dim: usize) -> Vec<f32> {
    let mut table = Vec::with_capacity(max_length * dim);
    for position in 0..max_length {
        for i in 0..dim {
            let exponent = (2 * (i / 2)) as f64 / dim as f64;
            let angle = position as f64 / 10000f64.powf(exponent);
            let value = if i % 2 == 0 { angle.sin() } else { angle.cos() };
            table.push(value as f32);
        }
    }
    table
}

/// Adds a fixed sinusoidal table to `[batch, sequence, embedding]` batches.
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    encoding: Tensor<B, 2>,
    seq_len: usize,
    embedding_dim: usize,
}

impl<B: Backend> PositionalEncoding<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let x = input.into_sequence([self.seq_len, self.embedding_dim]);
        TensorBatch::Sequence(self.encode(x))
    }

    pub fn encode(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, seq_len, _] = x.dims();
        let rows = self.encoding.clone().slice([0..seq_len]);
        x + rows.unsqueeze::<3>()
    }

    pub fn max_length(&self) -> usize {
        self.encoding.dims()[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_table_values() {
        let table = sinusoid_table(4, 4);
        // position 0: sin(0), cos(0)
        assert_eq!(&table[0..4], &[0.0, 1.0, 0.0, 1.0]);
        // position 1, features 0 and 1
        assert!((table[4] - 1f32.sin()).abs() < 1e-6);
        assert!((table[5] - 1f32.cos()).abs() < 1e-6);
        // features 2 and 3 share the frequency 1 / 10000^(2/4)
        assert!((table[6] - 0.01f32.sin()).abs() < 1e-6);
        assert!((table[7] - 0.01f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn test_zero_input_becomes_non_zero() {
        let device = <TestBackend as Backend>::Device::default();
        let encoding: PositionalEncoding<TestBackend> = PositionalEncodingConfig::new(512)
            .build(&[10, 16], &device)
            .unwrap();

        let output = encoding.encode(Tensor::zeros([1, 10, 16], &device));
        assert_eq!(output.dims(), [1, 10, 16]);
        let values: Vec<f32> = output.to_data().to_vec().unwrap();
        assert!(values.iter().any(|v| *v != 0.0));
        assert_eq!(encoding.max_length(), 512);
        assert_eq!(encoding.num_params(), 0);
    }

    #[test]
    fn test_accepts_batched_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let encoding = PositionalEncodingConfig::new(8).build::<TestBackend>(&[2, 8, 4], &device);
        assert!(encoding.is_ok());
    }

    #[test]
    fn test_build_errors() {
        let device = <TestBackend as Backend>::Device::default();
        let config = PositionalEncodingConfig::new(8);

        assert_eq!(
            config.build::<TestBackend>(&[9, 4], &device).err(),
            Some(OperatorError::SequenceTooLong {
                seq_len: 9,
                max_length: 8
            })
        );
        assert!(matches!(
            config.build::<TestBackend>(&[16], &device),
            Err(OperatorError::UnsupportedRank { .. })
        ));
        assert!(matches!(
            config.build::<TestBackend>(&[1, 2, 3, 4], &device),
            Err(OperatorError::UnsupportedRank { .. })
        ));
    }
}
