//! Attention-family operators composed from tensor primitives.
//!
//! Each operator is split into an immutable configuration and a built
//! module. [`SelfAttentionConfig::build`], [`PositionalEncodingConfig::build`]
//! and [`TransformerBlockConfig::build`] take the sample shape the operator
//! will see (without the batch dimension) and allocate the weights once.
//! Building again always yields a fresh operator.

mod positional;
mod self_attention;
mod transformer;

pub use positional::{PositionalEncoding, PositionalEncodingConfig, sinusoid_table};
pub use self_attention::{MultiHeadSelfAttention, SelfAttentionConfig};
pub use transformer::{TransformerBlock, TransformerBlockConfig};

use crate::errors::OperatorError;
use crate::shape::ShapeVector;

/// Splits a sample shape into `[sequence, embedding]` using its two trailing
/// axes. Leading axes are folded into the sequence.
pub(crate) fn sequence_dims(
    operator: &'static str,
    shape: &[usize],
) -> Result<[usize; 2], OperatorError> {
    if shape.len() < 2 {
        return Err(OperatorError::UnsupportedRank {
            operator,
            expected: "at least 2",
            shape: ShapeVector::from(shape.to_vec()),
        });
    }
    let dim = shape[shape.len() - 1];
    if dim == 0 {
        return Err(OperatorError::UnknownEmbeddingDim {
            operator,
            shape: ShapeVector::from(shape.to_vec()),
        });
    }
    let seq = shape[..shape.len() - 1].iter().product();
    Ok([seq, dim])
}

pub(crate) fn dropout_rate(operator: &'static str, rate: f64) -> Result<f64, OperatorError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(OperatorError::InvalidDropout { operator, rate })
    }
}
