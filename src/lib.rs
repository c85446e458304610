//! # layerforge
//!
//! Compiles declarative neural-network layer lists into trainable burn models.
//!
//! A layer list is an ordered sequence of `{type, params}` records that starts
//! with an `input` layer. The crate validates every parameter bag against a
//! registry schema, propagates sample shapes through the list to catch
//! configuration errors before any weight exists, and instantiates a burn
//! [`Module`](burn::module::Module) per layer, including multi-head
//! self-attention, sinusoidal positional encoding and a post-norm transformer
//! encoder block built from tensor primitives.
//!
//! ## Features
//!
//! - **Validation**: field-indexed errors with lenient coercion of numeric and
//!   boolean strings.
//! - **Shape propagation**: layer-indexed [`ShapeError`](errors::ShapeError)s,
//!   with single-channel promotion of 2-D image inputs.
//! - **Compilation**: a [`CompiledModel`](graph::CompiledModel) with predict,
//!   parameter count and output shape, owned by a
//!   [`ModelSession`](graph::ModelSession) that disposes replaced models.
//! - **Training**: an Adam loop that appends a classification head sized to the
//!   dataset when needed and reports each epoch as an event.
//!
//! ## Example
//!
//! ```
//! use layerforge::prelude::*;
//! use burn::backend::NdArray;
//!
//! let device = Default::default();
//! let layers = layerforge::templates::mnist_cnn();
//!
//! let shapes = propagate_shapes(&layers).unwrap();
//! assert_eq!(shapes[1].dims(), &[28, 28, 32]);
//!
//! let model = compile_model::<NdArray>(&layers, &device).unwrap();
//! assert_eq!(model.output_shape().dims(), &[10]);
//! ```

pub mod attention;
pub mod errors;
pub mod graph;
pub mod layer_spec;
pub mod layers;
pub mod registry;
pub mod shape;
pub mod templates;
pub mod training;
pub mod validation;

// Re-exports for convenience
pub use errors::{CompileError, ModelError, ShapeError};
pub use graph::{CompiledModel, compile_model};
pub use layer_spec::{LayerKind, LayerList, LayerSpec};
pub use shape::{ShapeVector, propagate_shapes};
pub use validation::{ValidationResult, validate_layer};

/// Backend type alias for WGPU with autodiff support.
pub type Backend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Backend type for inference (no autodiff).
pub type InferenceBackend = burn::backend::Wgpu;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::errors::{CompileError, ModelError, ShapeError};
    pub use crate::graph::{
        CompileOptions, CompiledModel, CompilerState, ModelSession, TensorBatch, compile_model,
    };
    pub use crate::layer_spec::{LayerKind, LayerList, LayerSpec};
    pub use crate::layers::Activation;
    pub use crate::shape::{ShapeVector, propagate_shapes};
    pub use crate::training::{Dataset, Loss, TrainingConfig, TrainingEvent, fit};
    pub use crate::validation::{ValidationResult, validate_layer};
    pub use crate::{Backend, InferenceBackend};
}
