//! Batches of samples whose rank is only known at compile time.

use std::ops::Range;

use burn::tensor::{
    Tensor,
    backend::{AutodiffBackend, Backend},
};

use crate::errors::ModelError;
use crate::shape::ShapeVector;

/// A batch flowing between compiled operators.
///
/// The leading dimension is always the batch. Spatial batches are
/// channels-last.
#[derive(Debug, Clone)]
pub enum TensorBatch<B: Backend> {
    /// `[batch, features]`
    Flat(Tensor<B, 2>),
    /// `[batch, sequence, embedding]`
    Sequence(Tensor<B, 3>),
    /// `[batch, height, width, channels]`
    Spatial(Tensor<B, 4>),
}

impl<B: Backend> TensorBatch<B> {
    /// Builds a batch from row-major data, inferring the batch size from the
    /// sample shape.
    pub fn from_floats(
        data: &[f32],
        sample_shape: &[usize],
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        let per_sample: usize = sample_shape.iter().product();
        if per_sample == 0 || data.is_empty() || data.len() % per_sample != 0 {
            return Err(ModelError::InputShapeMismatch {
                expected: ShapeVector::from(sample_shape.to_vec()),
                actual: ShapeVector::from([data.len()]),
            });
        }
        let batch = data.len() / per_sample;
        let flat = Tensor::<B, 1>::from_floats(data, device).reshape([batch, per_sample]);
        TensorBatch::Flat(flat).reshape_samples(sample_shape)
    }

    /// A batch of zeros.
    pub fn zeros(
        batch: usize,
        sample_shape: &[usize],
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        let per_sample: usize = sample_shape.iter().product();
        TensorBatch::Flat(Tensor::zeros([batch, per_sample], device)).reshape_samples(sample_shape)
    }

    pub fn batch_size(&self) -> usize {
        match self {
            TensorBatch::Flat(tensor) => tensor.dims()[0],
            TensorBatch::Sequence(tensor) => tensor.dims()[0],
            TensorBatch::Spatial(tensor) => tensor.dims()[0],
        }
    }

    /// Shape of one sample, without the batch dimension.
    pub fn sample_shape(&self) -> ShapeVector {
        match self {
            TensorBatch::Flat(tensor) => ShapeVector::from([tensor.dims()[1]]),
            TensorBatch::Sequence(tensor) => {
                let [_, seq, dim] = tensor.dims();
                ShapeVector::from([seq, dim])
            }
            TensorBatch::Spatial(tensor) => {
                let [_, height, width, channels] = tensor.dims();
                ShapeVector::from([height, width, channels])
            }
        }
    }

    pub fn device(&self) -> B::Device {
        match self {
            TensorBatch::Flat(tensor) => tensor.device(),
            TensorBatch::Sequence(tensor) => tensor.device(),
            TensorBatch::Spatial(tensor) => tensor.device(),
        }
    }

    /// Collapses every sample into a single feature axis.
    pub fn into_flat(self) -> Tensor<B, 2> {
        let batch = self.batch_size();
        let features = self.sample_shape().num_elements();
        match self {
            TensorBatch::Flat(tensor) => tensor,
            TensorBatch::Sequence(tensor) => tensor.reshape([batch, features]),
            TensorBatch::Spatial(tensor) => tensor.reshape([batch, features]),
        }
    }

    /// Views every sample as `[sequence, embedding]`.
    pub fn into_sequence(self, [seq, dim]: [usize; 2]) -> Tensor<B, 3> {
        let batch = self.batch_size();
        match self {
            TensorBatch::Flat(tensor) => tensor.reshape([batch, seq, dim]),
            TensorBatch::Sequence(tensor) => tensor.reshape([batch, seq, dim]),
            TensorBatch::Spatial(tensor) => tensor.reshape([batch, seq, dim]),
        }
    }

    /// Views every sample as `[height, width, channels]`.
    pub fn into_spatial(self, [height, width, channels]: [usize; 3]) -> Tensor<B, 4> {
        let batch = self.batch_size();
        match self {
            TensorBatch::Flat(tensor) => tensor.reshape([batch, height, width, channels]),
            TensorBatch::Sequence(tensor) => tensor.reshape([batch, height, width, channels]),
            TensorBatch::Spatial(tensor) => tensor.reshape([batch, height, width, channels]),
        }
    }

    /// Reshapes every sample to `sample_shape`, which must hold the same
    /// number of elements.
    pub fn reshape_samples(self, sample_shape: &[usize]) -> Result<Self, ModelError> {
        let actual = self.sample_shape();
        let expected = ShapeVector::from(sample_shape.to_vec());
        if actual.num_elements() != expected.num_elements() {
            return Err(ModelError::InputShapeMismatch { expected, actual });
        }
        match *sample_shape {
            [_] => Ok(TensorBatch::Flat(self.into_flat())),
            [seq, dim] => Ok(TensorBatch::Sequence(self.into_sequence([seq, dim]))),
            [height, width, channels] => Ok(TensorBatch::Spatial(
                self.into_spatial([height, width, channels]),
            )),
            _ => Err(ModelError::UnsupportedRank {
                rank: sample_shape.len(),
            }),
        }
    }

    /// Selects the samples in `range`.
    pub fn slice_batch(&self, range: Range<usize>) -> Self {
        match self {
            TensorBatch::Flat(tensor) => TensorBatch::Flat(tensor.clone().slice([range])),
            TensorBatch::Sequence(tensor) => TensorBatch::Sequence(tensor.clone().slice([range])),
            TensorBatch::Spatial(tensor) => TensorBatch::Spatial(tensor.clone().slice([range])),
        }
    }

    /// Copies the batch to a row-major vector.
    pub fn to_vec(&self) -> Result<Vec<f32>, ModelError> {
        let data = match self {
            TensorBatch::Flat(tensor) => tensor.to_data(),
            TensorBatch::Sequence(tensor) => tensor.to_data(),
            TensorBatch::Spatial(tensor) => tensor.to_data(),
        };
        data.to_vec::<f32>().map_err(|err| ModelError::TensorData {
            message: format!("{err:?}"),
        })
    }
}

impl<B: AutodiffBackend> TensorBatch<B> {
    /// Detaches the batch from the autodiff graph.
    pub fn inner(self) -> TensorBatch<B::InnerBackend> {
        match self {
            TensorBatch::Flat(tensor) => TensorBatch::Flat(tensor.inner()),
            TensorBatch::Sequence(tensor) => TensorBatch::Sequence(tensor.inner()),
            TensorBatch::Spatial(tensor) => TensorBatch::Spatial(tensor.inner()),
        }
    }
}
