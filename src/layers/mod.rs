//! Neural network layer implementations.
//!
//! Every layer consumes and produces a [`TensorBatch`](crate::graph::TensorBatch)
//! and remembers the sample shape it was built for, so a batch of any rank
//! with the right number of elements can be fed in.

pub mod activation;
pub mod conv;
pub mod dense;
pub mod embedding;
pub mod normalization;
pub mod reshape;

pub use activation::Activation;
pub use conv::{Conv2dLayer, Conv2dParams, MaxPool2dLayer, MaxPool2dParams, Padding};
pub use dense::{Dense, DenseParams};
pub use embedding::{EmbeddingLayer, EmbeddingParams};
pub use normalization::{DropoutLayer, LayerNormLayer};
pub use reshape::{Flatten, GlobalAvgPool1d};
