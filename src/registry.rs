//! Static catalog of layer types: default parameters and parameter schemas.

use serde_json::{Map, Value, json};

use crate::layer_spec::LayerKind;

/// Activation names accepted by `dense`, `output` and `conv2d`.
pub const ACTIVATIONS: &[&str] = &["linear", "relu", "sigmoid", "tanh", "softmax", "gelu"];

/// Padding modes accepted by `conv2d` and `maxpool2d`.
pub const PADDINGS: &[&str] = &["valid", "same"];

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

/// Typed rule applied to a single parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamRule {
    /// Integer strictly greater than zero.
    PositiveInt,
    /// Any number within the given bounds.
    Number { min: Bound, max: Bound },
    /// One of a fixed set of strings.
    OneOf(&'static [&'static str]),
    /// Boolean flag.
    Flag,
    /// Array of `min_len..=max_len` positive integers.
    Shape { min_len: usize, max_len: usize },
    /// Either a single positive integer (square) or an `[h, w]` pair.
    ScalarOrPair,
}

/// Declared schema entry for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub rule: ParamRule,
}

const fn required(name: &'static str, rule: ParamRule) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        rule,
    }
}

const fn optional(name: &'static str, rule: ParamRule) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        rule,
    }
}

const UNIT_RATE: ParamRule = ParamRule::Number {
    min: Bound::Inclusive(0.0),
    max: Bound::Exclusive(1.0),
};

const INPUT_SCHEMA: &[ParamSpec] = &[required(
    "shape",
    ParamRule::Shape {
        min_len: 1,
        max_len: 3,
    },
)];

const DENSE_SCHEMA: &[ParamSpec] = &[
    required("units", ParamRule::PositiveInt),
    optional("activation", ParamRule::OneOf(ACTIVATIONS)),
    optional("useBias", ParamRule::Flag),
];

const CONV2D_SCHEMA: &[ParamSpec] = &[
    required("filters", ParamRule::PositiveInt),
    required("kernelSize", ParamRule::ScalarOrPair),
    optional("strides", ParamRule::ScalarOrPair),
    optional("padding", ParamRule::OneOf(PADDINGS)),
    optional("activation", ParamRule::OneOf(ACTIVATIONS)),
    optional("useBias", ParamRule::Flag),
];

const MAXPOOL2D_SCHEMA: &[ParamSpec] = &[
    required("poolSize", ParamRule::ScalarOrPair),
    optional("strides", ParamRule::ScalarOrPair),
    optional("padding", ParamRule::OneOf(PADDINGS)),
];

const DROPOUT_SCHEMA: &[ParamSpec] = &[required("rate", UNIT_RATE)];

const EMBEDDING_SCHEMA: &[ParamSpec] = &[
    required("inputDim", ParamRule::PositiveInt),
    required("outputDim", ParamRule::PositiveInt),
];

const ATTENTION_SCHEMA: &[ParamSpec] = &[
    required("numHeads", ParamRule::PositiveInt),
    required("keyDim", ParamRule::PositiveInt),
    optional("dropout", UNIT_RATE),
];

const LAYER_NORM_SCHEMA: &[ParamSpec] = &[optional(
    "epsilon",
    ParamRule::Number {
        min: Bound::Exclusive(0.0),
        max: Bound::Unbounded,
    },
)];

const POSITIONAL_SCHEMA: &[ParamSpec] = &[required("maxLength", ParamRule::PositiveInt)];

const TRANSFORMER_SCHEMA: &[ParamSpec] = &[
    required("numHeads", ParamRule::PositiveInt),
    required("ffDim", ParamRule::PositiveInt),
    optional("keyDim", ParamRule::PositiveInt),
    optional("dropout", UNIT_RATE),
];

const NO_PARAMS: &[ParamSpec] = &[];

/// Registry entry for a layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    pub kind: LayerKind,
    /// Parameters a freshly created layer starts with.
    pub default_params: Map<String, Value>,
    pub schema: &'static [ParamSpec],
}

impl LayerDefinition {
    /// Looks up the schema entry for a parameter.
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.schema.iter().find(|spec| spec.name == name)
    }

    /// Returns the default value of a parameter, if the registry declares one.
    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.default_params.get(name)
    }
}

/// Returns the schema of a layer kind.
pub fn schema(kind: LayerKind) -> &'static [ParamSpec] {
    match kind {
        LayerKind::Input => INPUT_SCHEMA,
        LayerKind::Dense | LayerKind::Output => DENSE_SCHEMA,
        LayerKind::Conv2d => CONV2D_SCHEMA,
        LayerKind::Maxpool2d => MAXPOOL2D_SCHEMA,
        LayerKind::Dropout => DROPOUT_SCHEMA,
        LayerKind::Flatten | LayerKind::GlobalAvgPool1d => NO_PARAMS,
        LayerKind::Embedding => EMBEDDING_SCHEMA,
        LayerKind::MultiHeadAttention => ATTENTION_SCHEMA,
        LayerKind::LayerNorm => LAYER_NORM_SCHEMA,
        LayerKind::PositionalEncoding => POSITIONAL_SCHEMA,
        LayerKind::TransformerBlock => TRANSFORMER_SCHEMA,
    }
}

fn default_params(kind: LayerKind) -> Value {
    match kind {
        LayerKind::Input => json!({ "shape": [28, 28] }),
        LayerKind::Dense => json!({ "units": 128, "activation": "relu", "useBias": true }),
        LayerKind::Output => json!({ "units": 10, "activation": "softmax", "useBias": true }),
        LayerKind::Conv2d => json!({
            "filters": 32,
            "kernelSize": 3,
            "strides": 1,
            "padding": "valid",
            "activation": "relu",
            "useBias": true,
        }),
        LayerKind::Maxpool2d => json!({ "poolSize": 2, "padding": "valid" }),
        LayerKind::Dropout => json!({ "rate": 0.2 }),
        LayerKind::Flatten | LayerKind::GlobalAvgPool1d => json!({}),
        LayerKind::Embedding => json!({ "inputDim": 10000, "outputDim": 64 }),
        LayerKind::MultiHeadAttention => json!({ "numHeads": 4, "keyDim": 16, "dropout": 0.0 }),
        LayerKind::LayerNorm => json!({ "epsilon": 1e-6 }),
        LayerKind::PositionalEncoding => json!({ "maxLength": 512 }),
        LayerKind::TransformerBlock => json!({ "numHeads": 4, "ffDim": 128, "dropout": 0.1 }),
    }
}

/// Returns the registry definition of a layer kind.
pub fn definition(kind: LayerKind) -> LayerDefinition {
    let default_params = match default_params(kind) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    LayerDefinition {
        kind,
        default_params,
        schema: schema(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_definition() {
        for kind in LayerKind::ALL {
            let def = definition(kind);
            assert_eq!(def.kind, kind);
            for name in def.default_params.keys() {
                assert!(
                    def.param(name).is_some(),
                    "default `{name}` of {kind} is not in its schema"
                );
            }
        }
    }

    #[test]
    fn test_required_params_have_defaults() {
        for kind in LayerKind::ALL {
            let def = definition(kind);
            for spec in def.schema.iter().filter(|spec| spec.required) {
                assert!(
                    def.default_value(spec.name).is_some(),
                    "{kind} has no default for required `{}`",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_output_shares_dense_schema() {
        assert_eq!(schema(LayerKind::Output), schema(LayerKind::Dense));
        assert_eq!(
            definition(LayerKind::Output).default_value("activation"),
            Some(&json!("softmax"))
        );
    }
}
