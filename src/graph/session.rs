//! Compiler lifecycle: at most one live model per session.

use std::fmt;

use burn::tensor::backend::Backend;

use crate::errors::CompileError;
use crate::layer_spec::LayerList;

use super::compile::{CompileOptions, compile_with_options};
use super::model::CompiledModel;

/// Lifecycle state of a [`ModelSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerState {
    Uninitialized,
    Compiling,
    Compiled,
    /// The last compile attempt failed; [`ModelSession::last_error`] says why.
    Failed,
}

impl fmt::Display for CompilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompilerState::Uninitialized => "uninitialized",
            CompilerState::Compiling => "compiling",
            CompilerState::Compiled => "compiled",
            CompilerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Owns the model currently used for training or inference.
///
/// Compiling again disposes the previous model before the replacement's
/// weights are allocated, so two models never coexist.
pub struct ModelSession<B: Backend> {
    device: B::Device,
    options: CompileOptions,
    model: Option<CompiledModel<B>>,
    state: CompilerState,
    last_error: Option<CompileError>,
}

impl<B: Backend> ModelSession<B> {
    /// Creates an uninitialized session that compiles on `device`.
    pub fn new(device: B::Device) -> Self {
        Self::with_options(device, CompileOptions::default())
    }

    /// Creates an uninitialized session with explicit compile options.
    pub fn with_options(device: B::Device, options: CompileOptions) -> Self {
        Self {
            device,
            options,
            model: None,
            state: CompilerState::Uninitialized,
            last_error: None,
        }
    }

    /// Compiles `layers`, replacing any live model.
    ///
    /// A failed session is reset first, so calling this again with a fixed
    /// list is the retry path.
    pub fn compile(&mut self, layers: &LayerList) -> Result<&mut CompiledModel<B>, CompileError> {
        if self.model.is_some() {
            log::warn!("Replacing the compiled model; disposing the previous one first");
        }
        self.reset();
        self.state = CompilerState::Compiling;

        match compile_with_options::<B>(layers, &self.device, &self.options) {
            Ok(model) => {
                self.state = CompilerState::Compiled;
                Ok(self.model.insert(model))
            }
            Err(err) => {
                log::debug!("Compilation failed: {err}");
                self.state = CompilerState::Failed;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Releases the live model and returns to `Uninitialized`.
    ///
    /// Returns the number of parameters released, if a model was live.
    pub fn dispose(&mut self) -> Option<usize> {
        let released = self.model.take().map(CompiledModel::dispose);
        self.state = CompilerState::Uninitialized;
        released
    }

    /// Drops any model and error and returns to `Uninitialized`.
    pub fn reset(&mut self) {
        self.dispose();
        self.last_error = None;
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> CompilerState {
        self.state
    }

    /// Returns the live model, if the last compile succeeded.
    pub fn model(&self) -> Option<&CompiledModel<B>> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut CompiledModel<B>> {
        self.model.as_mut()
    }

    /// Returns the error of the last failed compile.
    pub fn last_error(&self) -> Option<&CompileError> {
        self.last_error.as_ref()
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: Backend> fmt::Debug for ModelSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSession")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("has_model", &self.model.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer_spec::{LayerKind, LayerSpec};
    use burn::backend::NdArray;
    use serde_json::json;

    type TestBackend = NdArray;

    fn mlp() -> LayerList {
        LayerList::with_input(&[4])
            .layer(LayerSpec::with_params(LayerKind::Dense, json!({"units": 8})))
            .layer(LayerSpec::with_params(LayerKind::Output, json!({"units": 2})))
    }

    #[test]
    fn test_lifecycle() {
        let mut session = ModelSession::<TestBackend>::new(Default::default());
        assert_eq!(session.state(), CompilerState::Uninitialized);

        let count = session.compile(&mlp()).unwrap().parameter_count();
        assert_eq!(count, (4 * 8 + 8) + (8 * 2 + 2));
        assert_eq!(session.state(), CompilerState::Compiled);

        assert_eq!(session.dispose(), Some(count));
        assert_eq!(session.state(), CompilerState::Uninitialized);
        assert!(session.model().is_none());
        assert_eq!(session.dispose(), None);
    }

    #[test]
    fn test_failure_is_recorded_and_recoverable() {
        let mut session = ModelSession::<TestBackend>::new(Default::default());
        let broken = LayerList::with_input(&[4]).layer(LayerSpec::from_tag("bogus", json!({})));

        assert!(session.compile(&broken).is_err());
        assert_eq!(session.state(), CompilerState::Failed);
        assert!(matches!(
            session.last_error(),
            Some(CompileError::UnknownLayerType { .. })
        ));

        session.compile(&mlp()).unwrap();
        assert_eq!(session.state(), CompilerState::Compiled);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_recompiling_releases_previous_model() {
        let mut session = ModelSession::<TestBackend>::new(Default::default());
        let first = session.compile(&mlp()).unwrap().release_handle();
        assert!(!first.is_released());

        let second = session.compile(&mlp()).unwrap().release_handle();
        assert!(first.is_released());
        assert!(!second.is_released());

        session.reset();
        assert!(second.is_released());
    }

    #[test]
    fn test_failed_compile_drops_live_model() {
        let mut session = ModelSession::<TestBackend>::new(Default::default());
        let handle = session.compile(&mlp()).unwrap().release_handle();

        assert!(session.compile(&LayerList::new()).is_err());
        assert!(handle.is_released());
        assert!(session.model().is_none());
    }
}
