//! Resolution of validated parameter bags into typed layer configurations.

use serde_json::{Map, Value};

use super::{ValidationResult, check_params};
use crate::attention::{PositionalEncodingConfig, SelfAttentionConfig, TransformerBlockConfig};
use crate::errors::CompileError;
use crate::layer_spec::{LayerKind, LayerSpec};
use crate::layers::{Activation, Conv2dParams, DenseParams, EmbeddingParams, MaxPool2dParams, Padding};
use crate::registry::{self, LayerDefinition};
use crate::shape::ShapeVector;

/// Typed configuration of one layer, one variant per layer kind.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerConfig {
    Input { shape: ShapeVector },
    Dense(DenseParams),
    Output(DenseParams),
    Conv2d(Conv2dParams),
    Maxpool2d(MaxPool2dParams),
    Dropout { rate: f64 },
    Flatten,
    Embedding(EmbeddingParams),
    MultiHeadAttention(SelfAttentionConfig),
    LayerNorm { epsilon: f64 },
    PositionalEncoding(PositionalEncodingConfig),
    TransformerBlock(TransformerBlockConfig),
    GlobalAvgPool1d,
}

impl LayerConfig {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerConfig::Input { .. } => LayerKind::Input,
            LayerConfig::Dense(_) => LayerKind::Dense,
            LayerConfig::Output(_) => LayerKind::Output,
            LayerConfig::Conv2d(_) => LayerKind::Conv2d,
            LayerConfig::Maxpool2d(_) => LayerKind::Maxpool2d,
            LayerConfig::Dropout { .. } => LayerKind::Dropout,
            LayerConfig::Flatten => LayerKind::Flatten,
            LayerConfig::Embedding(_) => LayerKind::Embedding,
            LayerConfig::MultiHeadAttention(_) => LayerKind::MultiHeadAttention,
            LayerConfig::LayerNorm { .. } => LayerKind::LayerNorm,
            LayerConfig::PositionalEncoding(_) => LayerKind::PositionalEncoding,
            LayerConfig::TransformerBlock(_) => LayerKind::TransformerBlock,
            LayerConfig::GlobalAvgPool1d => LayerKind::GlobalAvgPool1d,
        }
    }

    /// Layers that need a trailing channel axis when they directly follow a
    /// 2-D input.
    pub fn requires_channel_axis(&self) -> bool {
        matches!(self, LayerConfig::Conv2d(_) | LayerConfig::Flatten)
    }
}

/// Reads coerced values, falling back to registry defaults for absent
/// optional parameters.
struct ParamReader {
    values: Map<String, Value>,
    definition: LayerDefinition,
    errors: ValidationResult,
}

impl ParamReader {
    fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .get(name)
            .or_else(|| self.definition.default_value(name))
    }

    fn missing(&mut self, name: &str) {
        self.errors.add(name, "is required");
    }

    fn usize(&mut self, name: &str) -> usize {
        match self.value(name).and_then(Value::as_u64) {
            Some(value) => value as usize,
            None => {
                self.missing(name);
                0
            }
        }
    }

    fn optional_usize(&self, name: &str) -> Option<usize> {
        self.value(name).and_then(Value::as_u64).map(|value| value as usize)
    }

    fn f64(&self, name: &str, fallback: f64) -> f64 {
        self.value(name).and_then(Value::as_f64).unwrap_or(fallback)
    }

    fn flag(&self, name: &str, fallback: bool) -> bool {
        self.value(name).and_then(Value::as_bool).unwrap_or(fallback)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    fn dims(&self, name: &str) -> Option<Vec<usize>> {
        match self.value(name)? {
            Value::Number(number) => number.as_u64().map(|side| vec![side as usize]),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().map(|dim| dim as usize))
                .collect(),
            _ => None,
        }
    }

    fn pair(&self, name: &str) -> Option<[usize; 2]> {
        match self.dims(name)?.as_slice() {
            [side] => Some([*side, *side]),
            [height, width] => Some([*height, *width]),
            _ => None,
        }
    }

    fn required_pair(&mut self, name: &str) -> [usize; 2] {
        match self.pair(name) {
            Some(pair) => pair,
            None => {
                self.missing(name);
                [0, 0]
            }
        }
    }

    fn activation(&self) -> Activation {
        self.text("activation")
            .and_then(Activation::from_name)
            .unwrap_or(Activation::None)
    }

    fn padding(&self) -> Padding {
        self.text("padding")
            .and_then(Padding::from_name)
            .unwrap_or(Padding::Valid)
    }

    fn finish(self, config: LayerConfig) -> Result<LayerConfig, ValidationResult> {
        if self.errors.is_valid() {
            Ok(config)
        } else {
            Err(self.errors)
        }
    }
}

/// Validates `params` for `kind` and resolves them into a typed configuration.
pub fn resolve_layer(
    kind: LayerKind,
    params: &Map<String, Value>,
) -> Result<LayerConfig, ValidationResult> {
    let (errors, values) = check_params(kind, params);
    if !errors.is_valid() {
        return Err(errors);
    }

    let mut reader = ParamReader {
        values,
        definition: registry::definition(kind),
        errors,
    };

    let config = match kind {
        LayerKind::Input => {
            let shape = reader.dims("shape").unwrap_or_default();
            if shape.is_empty() {
                reader.missing("shape");
            }
            LayerConfig::Input {
                shape: ShapeVector::new(shape),
            }
        }
        LayerKind::Dense | LayerKind::Output => {
            let params = DenseParams {
                units: reader.usize("units"),
                activation: reader.activation(),
                use_bias: reader.flag("useBias", true),
            };
            if kind == LayerKind::Output {
                LayerConfig::Output(params)
            } else {
                LayerConfig::Dense(params)
            }
        }
        LayerKind::Conv2d => LayerConfig::Conv2d(Conv2dParams {
            filters: reader.usize("filters"),
            kernel_size: reader.required_pair("kernelSize"),
            strides: reader.pair("strides").unwrap_or([1, 1]),
            padding: reader.padding(),
            activation: reader.activation(),
            use_bias: reader.flag("useBias", true),
        }),
        LayerKind::Maxpool2d => {
            let pool_size = reader.required_pair("poolSize");
            LayerConfig::Maxpool2d(MaxPool2dParams {
                pool_size,
                strides: reader.pair("strides").unwrap_or(pool_size),
                padding: reader.padding(),
            })
        }
        LayerKind::Dropout => LayerConfig::Dropout {
            rate: reader.f64("rate", 0.0),
        },
        LayerKind::Flatten => LayerConfig::Flatten,
        LayerKind::Embedding => LayerConfig::Embedding(EmbeddingParams {
            input_dim: reader.usize("inputDim"),
            output_dim: reader.usize("outputDim"),
        }),
        LayerKind::MultiHeadAttention => {
            LayerConfig::MultiHeadAttention(SelfAttentionConfig {
                num_heads: reader.usize("numHeads"),
                key_dim: reader.usize("keyDim"),
                dropout: reader.f64("dropout", 0.0),
            })
        }
        LayerKind::LayerNorm => LayerConfig::LayerNorm {
            epsilon: reader.f64("epsilon", 1e-6),
        },
        LayerKind::PositionalEncoding => {
            LayerConfig::PositionalEncoding(PositionalEncodingConfig {
                max_length: reader.usize("maxLength"),
            })
        }
        LayerKind::TransformerBlock => LayerConfig::TransformerBlock(TransformerBlockConfig {
            num_heads: reader.usize("numHeads"),
            ff_dim: reader.usize("ffDim"),
            key_dim: reader.optional_usize("keyDim"),
            dropout: reader.f64("dropout", 0.1),
        }),
        LayerKind::GlobalAvgPool1d => LayerConfig::GlobalAvgPool1d,
    };

    reader.finish(config)
}

/// Resolves the layer at `index` of a list, mapping failures to compile errors.
pub fn resolve_spec(index: usize, layer: &LayerSpec) -> Result<LayerConfig, CompileError> {
    let kind = layer.kind().ok_or_else(|| CompileError::UnknownLayerType {
        index,
        tag: layer.layer_type().to_string(),
    })?;
    resolve_layer(kind, layer.params()).map_err(|errors| CompileError::InvalidParameters {
        index,
        layer_type: layer.layer_type().to_string(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(kind: LayerKind, value: Value) -> Result<LayerConfig, ValidationResult> {
        match value {
            Value::Object(map) => resolve_layer(kind, &map),
            _ => resolve_layer(kind, &Map::new()),
        }
    }

    #[test]
    fn test_resolve_dense_with_defaults() {
        let config = resolve(LayerKind::Dense, json!({ "units": "16" })).unwrap();
        assert_eq!(
            config,
            LayerConfig::Dense(DenseParams {
                units: 16,
                activation: Activation::Relu,
                use_bias: true,
            })
        );
    }

    #[test]
    fn test_resolve_output_defaults_to_softmax() {
        let LayerConfig::Output(params) = resolve(LayerKind::Output, json!({ "units": 3 })).unwrap()
        else {
            panic!("expected an output config");
        };
        assert_eq!(params.activation, Activation::Softmax);
    }

    #[test]
    fn test_resolve_conv_scalar_kernel() {
        let config = resolve(
            LayerKind::Conv2d,
            json!({ "filters": 8, "kernelSize": 3, "strides": "2", "padding": "same" }),
        )
        .unwrap();
        let LayerConfig::Conv2d(params) = config else {
            panic!("expected a conv2d config");
        };
        assert_eq!(params.kernel_size, [3, 3]);
        assert_eq!(params.strides, [2, 2]);
        assert_eq!(params.padding, Padding::Same);
    }

    #[test]
    fn test_maxpool_strides_default_to_pool_size() {
        let config = resolve(LayerKind::Maxpool2d, json!({ "poolSize": [2, 3] })).unwrap();
        let LayerConfig::Maxpool2d(params) = config else {
            panic!("expected a maxpool2d config");
        };
        assert_eq!(params.strides, [2, 3]);
    }

    #[test]
    fn test_transformer_key_dim_is_optional() {
        let config = resolve(LayerKind::TransformerBlock, json!({ "numHeads": 2, "ffDim": 32 })).unwrap();
        let LayerConfig::TransformerBlock(config) = config else {
            panic!("expected a transformer config");
        };
        assert_eq!(config.key_dim, None);
        assert!((config.dropout - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params_are_returned() {
        let errors = resolve(LayerKind::Dropout, json!({ "rate": 1.5 })).unwrap_err();
        assert_eq!(errors.errors().len(), 1);
    }

    #[test]
    fn test_resolve_spec_unknown_type() {
        let layer = LayerSpec::from_tag("bogus", json!({}));
        let err = resolve_spec(4, &layer).unwrap_err();
        assert_eq!(err.to_string(), "Unknown layer type: bogus");
        assert_eq!(err.layer_index(), Some(4));
    }
}
