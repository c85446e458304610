//! Model-related error types.

use thiserror::Error;

use super::CompileError;
use crate::shape::ShapeVector;

/// Errors that can occur while running or training a compiled model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Input shape mismatch: model expects samples of shape {expected}, got {actual}")]
    InputShapeMismatch {
        expected: ShapeVector,
        actual: ShapeVector,
    },

    #[error("Unsupported sample rank {rank}: samples must have 1 to 3 dimensions")]
    UnsupportedRank { rank: usize },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Dataset mismatch: {message}")]
    DatasetMismatch { message: String },

    #[error("No compiled model is available")]
    NoModel,

    #[error("Tensor data error: {message}")]
    TensorData { message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),
}
