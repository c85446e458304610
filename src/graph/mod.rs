//! Model graph compiler.
//!
//! A [`LayerList`](crate::layer_spec::LayerList) is resolved, traced and
//! instantiated into a [`CompiledModel`], whose [`Network`] is a burn
//! [`Module`](burn::module::Module) and can be trained with burn's optimizers.
//!
//! # Example
//!
//! ```
//! use burn::backend::NdArray;
//! use layerforge::graph::{TensorBatch, compile_model};
//! use layerforge::layer_spec::{LayerKind, LayerList, LayerSpec};
//! use serde_json::json;
//!
//! let device = Default::default();
//! let layers = LayerList::with_input(&[4])
//!     .layer(LayerSpec::with_params(LayerKind::Dense, json!({"units": 8})))
//!     .layer(LayerSpec::with_params(LayerKind::Output, json!({"units": 3})));
//!
//! let model = compile_model::<NdArray>(&layers, &device).unwrap();
//! assert_eq!(model.output_shape().dims(), &[3]);
//!
//! let batch = TensorBatch::from_floats(&[0.5; 8], &[4], &device).unwrap();
//! let output = model.predict(batch).unwrap();
//! assert_eq!(output.batch_size(), 2);
//! ```

mod compile;
mod model;
mod session;
mod tensor;

pub use compile::{CompileOptions, compile_model, compile_with_options};
pub use model::{CompiledModel, LayerSummary, Network, Operator, ReleaseHandle};
pub use session::{CompilerState, ModelSession};
pub use tensor::TensorBatch;
