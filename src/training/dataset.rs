//! Train/test splits handed to the training driver.

use burn::tensor::{Tensor, backend::Backend};

use crate::errors::ModelError;
use crate::graph::TensorBatch;

/// Already batched inputs with one-hot labels.
#[derive(Debug, Clone)]
pub struct Dataset<B: Backend> {
    pub train_inputs: TensorBatch<B>,
    pub train_labels: Tensor<B, 2>,
    pub test_inputs: TensorBatch<B>,
    pub test_labels: Tensor<B, 2>,
}

impl<B: Backend> Dataset<B> {
    /// Checks that both splits are non-empty and agree on sizes.
    pub fn new(
        train_inputs: TensorBatch<B>,
        train_labels: Tensor<B, 2>,
        test_inputs: TensorBatch<B>,
        test_labels: Tensor<B, 2>,
    ) -> Result<Self, ModelError> {
        if train_inputs.batch_size() == 0 {
            return Err(ModelError::EmptyDataset);
        }
        check_split("train", &train_inputs, &train_labels)?;
        check_split("test", &test_inputs, &test_labels)?;

        let train_classes = train_labels.dims()[1];
        let test_classes = test_labels.dims()[1];
        if train_classes != test_classes {
            return Err(ModelError::DatasetMismatch {
                message: format!(
                    "train labels have {train_classes} classes but test labels have {test_classes}"
                ),
            });
        }
        if train_inputs.sample_shape() != test_inputs.sample_shape() {
            return Err(ModelError::DatasetMismatch {
                message: format!(
                    "train samples have shape {} but test samples have shape {}",
                    train_inputs.sample_shape(),
                    test_inputs.sample_shape()
                ),
            });
        }

        Ok(Self {
            train_inputs,
            train_labels,
            test_inputs,
            test_labels,
        })
    }

    /// Width of the one-hot label rows.
    pub fn num_classes(&self) -> usize {
        self.train_labels.dims()[1]
    }

    /// Returns the number of training samples.
    pub fn train_len(&self) -> usize {
        self.train_inputs.batch_size()
    }

    /// Returns the number of held-out samples.
    pub fn test_len(&self) -> usize {
        self.test_inputs.batch_size()
    }
}

fn check_split<B: Backend>(
    split: &str,
    inputs: &TensorBatch<B>,
    labels: &Tensor<B, 2>,
) -> Result<(), ModelError> {
    let samples = inputs.batch_size();
    let rows = labels.dims()[0];
    if samples != rows {
        return Err(ModelError::DatasetMismatch {
            message: format!("{split} split has {samples} samples but {rows} label rows"),
        });
    }
    Ok(())
}

/// One-hot encodes class indices into `[len, num_classes]` rows.
///
/// Indices outside `0..num_classes` yield an all-zero row.
pub fn one_hot<B: Backend>(classes: &[usize], num_classes: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut data = vec![0.0f32; classes.len() * num_classes];
    for (row, class) in classes.iter().enumerate() {
        if *class < num_classes {
            data[row * num_classes + class] = 1.0;
        }
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([classes.len(), num_classes])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_one_hot() {
        let device = <TestBackend as Backend>::Device::default();
        let labels = one_hot::<TestBackend>(&[2, 0, 7], 3, &device);
        let values: Vec<f32> = labels.to_data().to_vec().unwrap();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dataset_checks_sizes() {
        let device = <TestBackend as Backend>::Device::default();
        let inputs = TensorBatch::<TestBackend>::zeros(4, &[2], &device).unwrap();
        let labels = one_hot::<TestBackend>(&[0, 1, 0, 1], 2, &device);

        let dataset = Dataset::new(inputs.clone(), labels.clone(), inputs.clone(), labels.clone()).unwrap();
        assert_eq!(dataset.num_classes(), 2);
        assert_eq!(dataset.train_len(), 4);

        let short = one_hot::<TestBackend>(&[0, 1, 0], 2, &device);
        let result = Dataset::new(inputs.clone(), short, inputs.clone(), labels.clone());
        assert!(matches!(result, Err(ModelError::DatasetMismatch { .. })));

        let wide = TensorBatch::<TestBackend>::zeros(4, &[3], &device).unwrap();
        let result = Dataset::new(inputs, labels.clone(), wide, labels);
        assert!(matches!(result, Err(ModelError::DatasetMismatch { .. })));
    }
}
