//! Configuration, shape and operator build errors.

use thiserror::Error;

use crate::shape::ShapeVector;
use crate::validation::ValidationResult;

/// A layer whose input shape cannot be transformed by that layer.
///
/// Propagation stops at the first such layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Layer {layer_index} ({layer_type}): {reason}")]
pub struct ShapeError {
    pub layer_index: usize,
    pub layer_type: String,
    pub reason: String,
}

impl ShapeError {
    pub fn new(layer_index: usize, layer_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            layer_index,
            layer_type: layer_type.into(),
            reason: reason.into(),
        }
    }
}

/// Build-time failure of a composed attention operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    #[error("{operator} expects an input of rank {expected}, got shape {shape}")]
    UnsupportedRank {
        operator: &'static str,
        expected: &'static str,
        shape: ShapeVector,
    },

    #[error("{operator} cannot determine the embedding dimension of shape {shape}")]
    UnknownEmbeddingDim {
        operator: &'static str,
        shape: ShapeVector,
    },

    #[error("Sequence length {seq_len} exceeds maxLength {max_length}")]
    SequenceTooLong { seq_len: usize, max_length: usize },

    #[error("Embedding dimension {embedding_dim} is not divisible by {num_heads} heads")]
    IndivisibleHeads {
        embedding_dim: usize,
        num_heads: usize,
    },

    #[error("{operator} dropout rate {rate} is outside [0, 1]")]
    InvalidDropout { operator: &'static str, rate: f64 },
}

/// Errors that stop a layer list from being compiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Layer list is empty")]
    EmptyLayerList,

    #[error("First layer must be of type 'input', found '{found}'")]
    FirstLayerNotInput { found: String },

    #[error("Unknown layer type: {tag}")]
    UnknownLayerType { index: usize, tag: String },

    #[error("Layer {index} ({layer_type}) has invalid parameters: {errors}")]
    InvalidParameters {
        index: usize,
        layer_type: String,
        errors: ValidationResult,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The list holds only its `input` layer; reported against that layer.
    #[error("Layer 0 (input): no layers follow the input layer")]
    NoOperators,

    #[error("Layer {index} ({layer_type}) could not be built: {source}")]
    OperatorBuild {
        index: usize,
        layer_type: String,
        source: OperatorError,
    },
}

impl CompileError {
    /// Index of the offending layer, when the error is tied to one.
    pub fn layer_index(&self) -> Option<usize> {
        match self {
            CompileError::EmptyLayerList => None,
            CompileError::FirstLayerNotInput { .. } | CompileError::NoOperators => Some(0),
            CompileError::UnknownLayerType { index, .. }
            | CompileError::InvalidParameters { index, .. }
            | CompileError::OperatorBuild { index, .. } => Some(*index),
            CompileError::Shape(err) => Some(err.layer_index),
        }
    }
}
