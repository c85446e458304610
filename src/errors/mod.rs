//! Error types.
//!
//! Configuration and shape problems are reported by [`CompileError`] and
//! [`ShapeError`]; failures while running or training a compiled model are
//! reported by [`ModelError`].

mod compile_error;
mod model_error;

pub use compile_error::{CompileError, OperatorError, ShapeError};
pub use model_error::ModelError;
