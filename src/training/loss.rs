//! Loss functions over `[batch, outputs]` predictions.

use burn::tensor::{Tensor, backend::Backend};

/// Keeps logarithms finite for saturated probabilities.
const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// `-mean(sum(y * log(p)))` over one-hot targets.
    CategoricalCrossEntropy,
    /// `mean((p - y)^2)`
    Mse,
    /// `-mean(y * log(p) + (1 - y) * log(1 - p))`
    BinaryCrossEntropy,
}

impl Loss {
    /// Reduces predictions against targets to a single-element tensor.
    pub fn compute<B: Backend>(
        &self,
        predictions: Tensor<B, 2>,
        targets: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        match self {
            Loss::CategoricalCrossEntropy => {
                let log_p = predictions.clamp(EPSILON, 1.0).log();
                (targets * log_p).sum_dim(1).mean().neg()
            }
            Loss::Mse => (predictions - targets).powf_scalar(2.0).mean(),
            Loss::BinaryCrossEntropy => {
                let p = predictions.clamp(EPSILON, 1.0 - EPSILON);
                let positive = targets.clone() * p.clone().log();
                let negative = targets.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log();
                (positive + negative).mean().neg()
            }
        }
    }
}
