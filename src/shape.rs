//! Static shape propagation through a layer list.
//!
//! Shapes never include the batch dimension. Propagation starts from the
//! declared `input` shape and applies one transform per layer, stopping at the
//! first layer whose input it cannot handle.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::errors::{CompileError, ShapeError};
use crate::layer_spec::{LayerList, LayerSpec};
use crate::layers::Padding;
use crate::validation::{LayerConfig, resolve_spec};

/// Ordered per-sample dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeVector(Vec<usize>);

impl ShapeVector {
    pub fn new(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of scalar elements per sample, saturating at `usize::MAX`.
    pub fn num_elements(&self) -> usize {
        self.0.iter().fold(1usize, |acc, &dim| acc.saturating_mul(dim))
    }

    /// Number of scalar elements per sample, or `None` if it overflows `usize`.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Appends a size-1 channel axis.
    pub fn with_channel(&self) -> Self {
        let mut dims = self.0.clone();
        dims.push(1);
        Self(dims)
    }
}

impl Deref for ShapeVector {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for ShapeVector {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl<const N: usize> From<[usize; N]> for ShapeVector {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl fmt::Display for ShapeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}

/// Shapes at every layer boundary of a list.
///
/// `inputs[i]` is the shape fed into layer `i` (after channel promotion) and
/// `outputs[i]` the shape it produces. For the `input` layer both are the
/// declared shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeTrace {
    pub inputs: Vec<ShapeVector>,
    pub outputs: Vec<ShapeVector>,
}

impl ShapeTrace {
    /// Shape the first concrete operator receives.
    pub fn model_input(&self) -> &ShapeVector {
        self.inputs.get(1).unwrap_or(&self.inputs[0])
    }

    /// Shape produced by the last layer.
    pub fn output(&self) -> &ShapeVector {
        &self.outputs[self.outputs.len() - 1]
    }
}

/// Output size along one spatial axis.
///
/// `same` keeps `ceil(input / stride)`; `valid` uses
/// `floor((input - kernel) / stride) + 1` and fails when the kernel does not fit.
pub fn conv_output_size(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: Padding,
) -> Result<usize, String> {
    let stride = stride.max(1);
    match padding {
        Padding::Same => {
            same_padding(input, kernel, stride).ok_or_else(|| {
                format!("same padding for a window of size {kernel} overflows")
            })?;
            Ok(input.div_ceil(stride))
        }
        Padding::Valid if kernel > input => Err(format!(
            "window of size {kernel} does not fit in a spatial dimension of size {input}"
        )),
        Padding::Valid => Ok((input - kernel) / stride + 1),
    }
}

/// Padding `(before, after)` that realizes `same` output size along one axis.
///
/// Returns `None` when the padded extent does not fit in `usize`.
pub fn same_padding(input: usize, kernel: usize, stride: usize) -> Option<(usize, usize)> {
    let stride = stride.max(1);
    let output = input.div_ceil(stride);
    let extent = output.saturating_sub(1).checked_mul(stride)?.checked_add(kernel)?;
    let total = extent.saturating_sub(input);
    let before = total / 2;
    Some((before, total - before))
}

fn expect_rank(input: &ShapeVector, rank: usize, hint: &str) -> Result<(), String> {
    if input.rank() == rank {
        Ok(())
    } else {
        Err(format!("expects a rank-{rank} input {hint}, got {input}"))
    }
}

fn spatial(
    input: &ShapeVector,
    window: [usize; 2],
    strides: [usize; 2],
    padding: Padding,
) -> Result<[usize; 2], String> {
    Ok([
        conv_output_size(input[0], window[0], strides[0], padding)?,
        conv_output_size(input[1], window[1], strides[1], padding)?,
    ])
}

/// Applies the shape transform of one layer.
pub fn output_shape(config: &LayerConfig, input: &ShapeVector) -> Result<ShapeVector, String> {
    match config {
        LayerConfig::Input { .. } => {
            Err("an input layer is only allowed as the first layer".to_string())
        }
        LayerConfig::Dense(params) | LayerConfig::Output(params) => {
            expect_rank(input, 1, "(add a flatten layer first)")?;
            Ok(ShapeVector::from([params.units]))
        }
        LayerConfig::Conv2d(params) => {
            expect_rank(input, 3, "[height, width, channels]")?;
            let [height, width] =
                spatial(input, params.kernel_size, params.strides, params.padding)?;
            Ok(ShapeVector::from([height, width, params.filters]))
        }
        LayerConfig::Maxpool2d(params) => {
            expect_rank(input, 3, "[height, width, channels]")?;
            let [height, width] = spatial(input, params.pool_size, params.strides, params.padding)?;
            Ok(ShapeVector::from([height, width, input[2]]))
        }
        LayerConfig::Flatten => input
            .checked_num_elements()
            .map(|size| ShapeVector::from([size]))
            .ok_or_else(|| format!("element count of {input} overflows")),
        LayerConfig::Dropout { .. } | LayerConfig::LayerNorm { .. } => Ok(input.clone()),
        LayerConfig::Embedding(params) => {
            expect_rank(input, 1, "[sequence_length]")?;
            Ok(ShapeVector::from([input[0], params.output_dim]))
        }
        LayerConfig::PositionalEncoding(config) => {
            expect_rank(input, 2, "[sequence_length, embedding_dim]")?;
            if input[0] > config.max_length {
                return Err(format!(
                    "sequence length {} exceeds maxLength {}",
                    input[0], config.max_length
                ));
            }
            Ok(input.clone())
        }
        LayerConfig::MultiHeadAttention(_) => {
            expect_rank(input, 2, "[sequence_length, embedding_dim]")?;
            Ok(input.clone())
        }
        LayerConfig::TransformerBlock(config) => {
            expect_rank(input, 2, "[sequence_length, embedding_dim]")?;
            config.head_dim(input[1]).map_err(|err| err.to_string())?;
            Ok(input.clone())
        }
        LayerConfig::GlobalAvgPool1d => {
            expect_rank(input, 2, "[sequence_length, embedding_dim]")?;
            Ok(ShapeVector::from([input[1]]))
        }
    }
}

/// Resolves and traces a layer list one layer at a time.
///
/// Each layer is resolved by `resolve` right before its shape transform runs,
/// so the first failing layer is reported whether its parameters or its input
/// shape are at fault. The first layer must resolve to an input layer. A 2-D
/// input directly followed by a layer that needs a channel axis is promoted
/// to `[h, w, 1]`.
pub fn trace_layers<E>(
    layers: &LayerList,
    mut resolve: impl FnMut(usize, &LayerSpec) -> Result<LayerConfig, E>,
) -> Result<(Vec<LayerConfig>, ShapeTrace), E>
where
    E: From<ShapeError>,
{
    let Some(first) = layers.first() else {
        return Err(ShapeError::new(0, "none", "the layer list is empty").into());
    };
    let shape = match resolve(0, first)? {
        LayerConfig::Input { shape } => shape,
        other => {
            return Err(ShapeError::new(
                0,
                other.kind().tag(),
                "the first layer must be an input layer",
            )
            .into());
        }
    };

    let mut configs = vec![LayerConfig::Input {
        shape: shape.clone(),
    }];
    let mut inputs = vec![shape.clone()];
    let mut outputs = vec![shape.clone()];
    let mut current = shape;

    for (index, layer) in layers.iter().enumerate().skip(1) {
        let config = resolve(index, layer)?;
        if index == 1 && current.rank() == 2 && config.requires_channel_axis() {
            current = current.with_channel();
            log::debug!("Promoted input shape to {current} for {}", config.kind());
        }
        let next = output_shape(&config, &current)
            .map_err(|reason| ShapeError::new(index, config.kind().tag(), reason))?;
        log::debug!("Layer {index} ({}): {current} -> {next}", config.kind());
        inputs.push(current);
        outputs.push(next.clone());
        configs.push(config);
        current = next;
    }

    Ok((configs, ShapeTrace { inputs, outputs }))
}

/// Resolves and traces a layer list, reporting every failure as a shape error.
pub fn trace_shapes(layers: &LayerList) -> Result<ShapeTrace, ShapeError> {
    let (_, trace) = trace_layers(layers, |index, layer| {
        resolve_spec(index, layer).map_err(|err| match err {
            CompileError::InvalidParameters { errors, .. } => ShapeError::new(
                index,
                layer.layer_type(),
                format!("invalid parameters: {errors}"),
            ),
            other => ShapeError::new(index, layer.layer_type(), other.to_string()),
        })
    })?;
    Ok(trace)
}

/// Computes the output shape after every layer of a list.
pub fn propagate_shapes(layers: &LayerList) -> Result<Vec<ShapeVector>, ShapeError> {
    trace_shapes(layers).map(|trace| trace.outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer_spec::LayerKind;
    use serde_json::json;

    fn layer(kind: LayerKind, params: serde_json::Value) -> LayerSpec {
        LayerSpec::with_params(kind, params)
    }

    #[test]
    fn test_cnn_shapes() {
        let layers = LayerList::with_input(&[28, 28])
            .layer(layer(
                LayerKind::Conv2d,
                json!({ "filters": 32, "kernelSize": 3, "padding": "same" }),
            ))
            .layer(layer(LayerKind::Maxpool2d, json!({ "poolSize": 2 })))
            .layer(layer(LayerKind::Flatten, json!({})))
            .layer(layer(LayerKind::Dense, json!({ "units": 10 })));

        let shapes = propagate_shapes(&layers).unwrap();
        assert_eq!(shapes[0], ShapeVector::from([28, 28]));
        assert_eq!(shapes[1], ShapeVector::from([28, 28, 32]));
        assert_eq!(shapes[2], ShapeVector::from([14, 14, 32]));
        assert_eq!(shapes[3], ShapeVector::from([14 * 14 * 32]));
        assert_eq!(shapes[4], ShapeVector::from([10]));
    }

    #[test]
    fn test_channel_promotion_only_at_first_layer() {
        let layers = LayerList::with_input(&[8, 8])
            .layer(layer(LayerKind::Flatten, json!({})))
            .layer(layer(LayerKind::Dense, json!({ "units": 4 })));
        let trace = trace_shapes(&layers).unwrap();
        assert_eq!(trace.model_input(), &ShapeVector::from([8, 8, 1]));
        assert_eq!(trace.outputs[1], ShapeVector::from([64]));

        // A conv2d after a dropout is no longer the first real layer.
        let layers = LayerList::with_input(&[8, 8])
            .layer(layer(LayerKind::Dropout, json!({ "rate": 0.1 })))
            .layer(layer(LayerKind::Conv2d, json!({ "filters": 4, "kernelSize": 3 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 2);
        assert_eq!(err.layer_type, "conv2d");
    }

    #[test]
    fn test_three_dimensional_input_is_not_promoted() {
        let layers = LayerList::with_input(&[8, 8, 3])
            .layer(layer(LayerKind::Conv2d, json!({ "filters": 4, "kernelSize": [3, 1] })));
        let shapes = propagate_shapes(&layers).unwrap();
        assert_eq!(shapes[1], ShapeVector::from([6, 8, 4]));
    }

    #[test]
    fn test_dense_requires_flattened_input() {
        let layers = LayerList::with_input(&[4, 4, 1])
            .layer(layer(LayerKind::Dense, json!({ "units": 4 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 1);
        assert_eq!(err.layer_type, "dense");
        assert!(err.reason.contains("rank-1"), "{}", err.reason);
    }

    #[test]
    fn test_valid_kernel_larger_than_input() {
        let layers = LayerList::with_input(&[2, 2, 1])
            .layer(layer(LayerKind::Conv2d, json!({ "filters": 1, "kernelSize": 3 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 1);
    }

    #[test]
    fn test_strided_same_and_valid() {
        assert_eq!(conv_output_size(7, 3, 2, Padding::Same), Ok(4));
        assert_eq!(conv_output_size(7, 3, 2, Padding::Valid), Ok(3));
        assert_eq!(conv_output_size(28, 2, 2, Padding::Valid), Ok(14));
        assert_eq!(conv_output_size(5, 2, 2, Padding::Valid), Ok(2));
    }

    #[test]
    fn test_same_padding_amounts() {
        assert_eq!(same_padding(28, 3, 1), Some((1, 1)));
        assert_eq!(same_padding(28, 2, 1), Some((0, 1)));
        assert_eq!(same_padding(7, 3, 2), Some((1, 1)));
        assert_eq!(same_padding(8, 1, 2), Some((0, 0)));
        assert_eq!(same_padding(usize::MAX, 3, 2), None);
    }

    #[test]
    fn test_transformer_stack_shapes() {
        let layers = LayerList::with_input(&[12])
            .layer(layer(LayerKind::Embedding, json!({ "inputDim": 100, "outputDim": 16 })))
            .layer(layer(LayerKind::PositionalEncoding, json!({ "maxLength": 32 })))
            .layer(layer(LayerKind::TransformerBlock, json!({ "numHeads": 4, "ffDim": 32 })))
            .layer(layer(LayerKind::MultiHeadAttention, json!({ "numHeads": 2, "keyDim": 5 })))
            .layer(layer(LayerKind::LayerNorm, json!({})))
            .layer(layer(LayerKind::GlobalAvgPool1d, json!({})))
            .layer(layer(LayerKind::Output, json!({ "units": 3 })));
        let shapes = propagate_shapes(&layers).unwrap();
        assert_eq!(shapes[1], ShapeVector::from([12, 16]));
        assert_eq!(shapes[4], ShapeVector::from([12, 16]));
        assert_eq!(shapes[6], ShapeVector::from([16]));
        assert_eq!(shapes[7], ShapeVector::from([3]));
    }

    #[test]
    fn test_sequence_longer_than_max_length() {
        let layers = LayerList::with_input(&[20])
            .layer(layer(LayerKind::Embedding, json!({ "inputDim": 50, "outputDim": 8 })))
            .layer(layer(LayerKind::PositionalEncoding, json!({ "maxLength": 10 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 2);
        assert!(err.reason.contains("maxLength"));
    }

    #[test]
    fn test_transformer_heads_must_divide_embedding() {
        let layers = LayerList::with_input(&[4, 10])
            .layer(layer(LayerKind::TransformerBlock, json!({ "numHeads": 3, "ffDim": 8 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_type, "transformerBlock");
    }

    #[test]
    fn test_first_layer_must_be_input() {
        let layers = LayerList::from(vec![layer(LayerKind::Dense, json!({ "units": 3 }))]);
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 0);
        assert!(propagate_shapes(&LayerList::new()).is_err());
    }

    #[test]
    fn test_second_input_layer_is_rejected() {
        let layers = LayerList::with_input(&[4]).layer(layer(LayerKind::Input, json!({ "shape": [4] })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 1);
    }

    #[test]
    fn test_unknown_and_invalid_layers_stop_propagation() {
        let layers = LayerList::with_input(&[4]).layer(LayerSpec::from_tag("bogus", json!({})));
        let err = propagate_shapes(&layers).unwrap_err();
        assert!(err.reason.contains("bogus"));

        let layers = LayerList::with_input(&[4]).layer(layer(LayerKind::Dense, json!({ "units": 0 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert!(err.reason.starts_with("invalid parameters"));
    }

    #[test]
    fn test_flatten_of_huge_input_reports_overflow() {
        let dim = u32::MAX as usize;
        let layers = LayerList::with_input(&[dim, dim, dim]).layer(layer(LayerKind::Flatten, json!({})));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 1);
        assert_eq!(err.layer_type, "flatten");
        assert!(err.reason.contains("overflows"), "{}", err.reason);
    }

    #[test]
    fn test_element_count_saturates() {
        let dim = u32::MAX as usize;
        let shape = ShapeVector::from([dim, dim, dim]);
        assert_eq!(shape.checked_num_elements(), None);
        assert_eq!(shape.num_elements(), usize::MAX);
        assert_eq!(ShapeVector::from([2, 3]).checked_num_elements(), Some(6));
    }

    #[test]
    fn test_earliest_failing_layer_is_reported() {
        let layers = LayerList::with_input(&[4])
            .layer(layer(LayerKind::Conv2d, json!({ "filters": 4, "kernelSize": 3 })))
            .layer(layer(LayerKind::Dense, json!({ "units": 0 })));
        let err = propagate_shapes(&layers).unwrap_err();
        assert_eq!(err.layer_index, 1);
        assert_eq!(err.layer_type, "conv2d");
        assert!(!err.reason.starts_with("invalid parameters"));
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(ShapeVector::from([14, 14, 32]).to_string(), "[14, 14, 32]");
    }
}
