//! Turns a layer list into a [`CompiledModel`].

use burn::module::Module;
use burn::tensor::backend::Backend;

use crate::errors::{CompileError, OperatorError, ShapeError};
use crate::layer_spec::{LayerKind, LayerList};
use crate::layers::{DropoutLayer, Flatten, GlobalAvgPool1d, LayerNormLayer};
use crate::shape::{ShapeVector, trace_layers};
use crate::validation::{LayerConfig, resolve_spec};

use super::model::{CompiledModel, LayerSummary, Network, Operator};

/// Options applied while compiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Seeds the backend RNG before any weight is initialized.
    pub seed: Option<u64>,
}

impl CompileOptions {
    /// Creates options with no seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the RNG seed used for weight initialization.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Compiles a layer list with default options.
pub fn compile_model<B: Backend>(
    layers: &LayerList,
    device: &B::Device,
) -> Result<CompiledModel<B>, CompileError> {
    compile_with_options(layers, device, &CompileOptions::default())
}

/// Validates, traces and instantiates every layer of `layers`.
///
/// The `input` layer contributes no operator; the first concrete operator is
/// built for the (possibly channel-promoted) input shape and every later one
/// for the output shape of its predecessor.
pub fn compile_with_options<B: Backend>(
    layers: &LayerList,
    device: &B::Device,
    options: &CompileOptions,
) -> Result<CompiledModel<B>, CompileError> {
    let first = layers.first().ok_or(CompileError::EmptyLayerList)?;
    if first.kind() != Some(LayerKind::Input) {
        return Err(CompileError::FirstLayerNotInput {
            found: first.layer_type().to_string(),
        });
    }

    let (configs, trace) = trace_layers(layers, resolve_spec)?;
    if configs.len() < 2 {
        return Err(CompileError::NoOperators);
    }

    if let Some(seed) = options.seed {
        B::seed(seed);
    }

    let mut operators = Vec::with_capacity(configs.len() - 1);
    let mut summary = Vec::with_capacity(configs.len() - 1);
    for (index, (layer, config)) in layers.iter().zip(&configs).enumerate().skip(1) {
        let input = &trace.inputs[index];
        let operator = build_operator(index, config, input, device)?;
        let parameters = operator.num_params();
        log::debug!(
            "Built layer {index} ({}) for {input}: {parameters} parameters",
            config.kind()
        );

        summary.push(LayerSummary {
            name: layer.name().to_string(),
            kind: config.kind(),
            output_shape: trace.outputs[index].clone(),
            parameters,
        });
        operators.push(operator);
    }

    let model = CompiledModel::new(
        Network::new(operators),
        summary,
        trace.model_input().clone(),
        trace.output().clone(),
    );
    log::info!(
        "Compiled {} layers: {} -> {}, {} parameters",
        model.summary().len(),
        model.input_shape(),
        model.output_shape(),
        model.parameter_count()
    );
    Ok(model)
}

fn build_operator<B: Backend>(
    index: usize,
    config: &LayerConfig,
    input: &ShapeVector,
    device: &B::Device,
) -> Result<Operator<B>, CompileError> {
    let kind = config.kind();
    let operator_error = |source: OperatorError| CompileError::OperatorBuild {
        index,
        layer_type: kind.tag().to_string(),
        source,
    };
    let spatial = || -> Result<[usize; 3], CompileError> {
        <[usize; 3]>::try_from(input.dims()).map_err(|_| {
            ShapeError::new(index, kind.tag(), format!("expects [height, width, channels], got {input}"))
                .into()
        })
    };

    let operator = match config {
        LayerConfig::Input { .. } => {
            return Err(ShapeError::new(
                index,
                kind.tag(),
                "an input layer is only allowed as the first layer",
            )
            .into());
        }
        LayerConfig::Dense(params) | LayerConfig::Output(params) => {
            Operator::Dense(params.init(input.num_elements(), device))
        }
        LayerConfig::Conv2d(params) => Operator::Conv2d(params.init(spatial()?, device)),
        LayerConfig::Maxpool2d(params) => Operator::MaxPool2d(params.init(spatial()?)),
        LayerConfig::Dropout { rate } => Operator::Dropout(DropoutLayer::new(*rate)),
        LayerConfig::Flatten => Operator::Flatten(Flatten::new(input.num_elements())),
        LayerConfig::Embedding(params) => Operator::Embedding(params.init(input.num_elements(), device)),
        LayerConfig::MultiHeadAttention(config) => {
            Operator::SelfAttention(config.build(input, device).map_err(operator_error)?)
        }
        LayerConfig::LayerNorm { epsilon } => {
            let features = input.last().copied().unwrap_or(1);
            Operator::LayerNorm(LayerNormLayer::new(features, *epsilon, device))
        }
        LayerConfig::PositionalEncoding(config) => {
            Operator::PositionalEncoding(config.build(input, device).map_err(operator_error)?)
        }
        LayerConfig::TransformerBlock(config) => {
            Operator::TransformerBlock(config.build(input, device).map_err(operator_error)?)
        }
        LayerConfig::GlobalAvgPool1d => match input.dims() {
            [seq_len, dim] => Operator::GlobalAvgPool1d(GlobalAvgPool1d::new(*seq_len, *dim)),
            _ => {
                return Err(ShapeError::new(
                    index,
                    kind.tag(),
                    format!("expects [sequence_length, embedding_dim], got {input}"),
                )
                .into());
            }
        },
    };
    Ok(operator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer_spec::LayerSpec;
    use crate::shape::propagate_shapes;
    use burn::backend::NdArray;
    use serde_json::json;

    type TestBackend = NdArray;

    fn device() -> <TestBackend as Backend>::Device {
        Default::default()
    }

    fn cnn() -> LayerList {
        LayerList::with_input(&[28, 28])
            .layer(LayerSpec::with_params(
                LayerKind::Conv2d,
                json!({"filters": 32, "kernelSize": 3, "padding": "same"}),
            ))
            .layer(LayerSpec::with_params(LayerKind::Maxpool2d, json!({"poolSize": 2})))
            .layer(LayerSpec::new(LayerKind::Flatten))
            .layer(LayerSpec::with_params(LayerKind::Dense, json!({"units": 10})))
    }

    #[test]
    fn test_empty_and_headless_lists() {
        let result = compile_model::<TestBackend>(&LayerList::new(), &device());
        assert_eq!(result.err(), Some(CompileError::EmptyLayerList));

        let headless = LayerList::new().layer(LayerSpec::new(LayerKind::Flatten));
        let result = compile_model::<TestBackend>(&headless, &device());
        assert_eq!(
            result.err(),
            Some(CompileError::FirstLayerNotInput {
                found: "flatten".to_string()
            })
        );

        let input_only = LayerList::with_input(&[4]);
        let err = compile_model::<TestBackend>(&input_only, &device()).unwrap_err();
        assert_eq!(err, CompileError::NoOperators);
        assert_eq!(err.layer_index(), Some(0));
        assert!(propagate_shapes(&input_only).is_ok());
    }

    #[test]
    fn test_shape_failure_before_later_parameter_error() {
        let layers = LayerList::with_input(&[4])
            .layer(LayerSpec::with_params(
                LayerKind::Conv2d,
                json!({"filters": 4, "kernelSize": 3}),
            ))
            .layer(LayerSpec::with_params(LayerKind::Dense, json!({"units": 0})));
        let err = compile_model::<TestBackend>(&layers, &device()).unwrap_err();

        assert!(matches!(err, CompileError::Shape(ShapeError { layer_index: 1, .. })), "{err}");
    }

    #[test]
    fn test_cnn_compiles_to_propagated_shape() {
        let layers = cnn();
        let model = compile_model::<TestBackend>(&layers, &device()).unwrap();
        let shapes = propagate_shapes(&layers).unwrap();

        assert_eq!(model.output_shape(), shapes.last().unwrap());
        assert_eq!(model.input_shape(), &ShapeVector::from([28, 28, 1]));
        assert_eq!(model.network().len(), 4);

        let conv = 3 * 3 * 32 + 32;
        let dense = 14 * 14 * 32 * 10 + 10;
        assert_eq!(model.parameter_count(), conv + dense);

        let rows: Vec<_> = model.summary().iter().map(|row| row.parameters).collect();
        assert_eq!(rows, vec![conv, 0, 0, dense]);
    }

    #[test]
    fn test_unknown_type_names_the_tag() {
        let layers = LayerList::with_input(&[4]).layer(LayerSpec::from_tag("bogus", json!({})));
        let err = compile_model::<TestBackend>(&layers, &device()).unwrap_err();

        assert_eq!(err.layer_index(), Some(1));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_invalid_parameters_are_reported_per_layer() {
        let layers = LayerList::with_input(&[8])
            .layer(LayerSpec::with_params(LayerKind::Dropout, json!({"rate": 1.5})));
        let err = compile_model::<TestBackend>(&layers, &device()).unwrap_err();

        match err {
            CompileError::InvalidParameters { index, errors, .. } => {
                assert_eq!(index, 1);
                assert!(!errors.field_errors("rate").is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shape_errors_carry_the_layer() {
        let layers = LayerList::with_input(&[8])
            .layer(LayerSpec::with_params(
                LayerKind::Conv2d,
                json!({"filters": 4, "kernelSize": 3}),
            ));
        let err = compile_model::<TestBackend>(&layers, &device()).unwrap_err();
        assert!(matches!(err, CompileError::Shape(ShapeError { layer_index: 1, .. })));
    }

    #[test]
    fn test_text_pipeline_compiles() {
        let layers = LayerList::with_input(&[12])
            .layer(LayerSpec::with_params(
                LayerKind::Embedding,
                json!({"inputDim": 100, "outputDim": 16}),
            ))
            .layer(LayerSpec::with_params(LayerKind::PositionalEncoding, json!({"maxLength": 64})))
            .layer(LayerSpec::with_params(
                LayerKind::TransformerBlock,
                json!({"numHeads": 4, "ffDim": 32}),
            ))
            .layer(LayerSpec::new(LayerKind::LayerNorm))
            .layer(LayerSpec::new(LayerKind::GlobalAvgPool1d))
            .layer(LayerSpec::with_params(LayerKind::Output, json!({"units": 3})));
        let device = device();
        let model = compile_model::<TestBackend>(&layers, &device).unwrap();
        assert_eq!(model.output_shape(), &ShapeVector::from([3]));

        let tokens: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let batch = crate::graph::TensorBatch::from_floats(&tokens, &[12], &device).unwrap();
        let output = model.predict(batch).unwrap();
        assert_eq!(output.batch_size(), 2);

        let probabilities = output.to_vec().unwrap();
        let first_row: f32 = probabilities[0..3].iter().sum();
        assert!((first_row - 1.0).abs() < 1e-4);
    }
}
