//! Classification-head auto-repair.

use serde_json::json;

use crate::errors::CompileError;
use crate::layer_spec::{LayerKind, LayerList, LayerSpec};
use crate::shape::trace_shapes;
use crate::validation::{LayerConfig, resolve_spec};

/// Makes sure `layers` ends in a dense/output layer with `num_classes` units.
///
/// When it does not, a `flatten` (only for a non-flat final shape) and a
/// softmax `output` layer sized to the class count are appended. Returns the
/// repaired list and whether anything was appended.
pub fn ensure_classification_head(
    layers: &LayerList,
    num_classes: usize,
) -> Result<(LayerList, bool), CompileError> {
    let trace = trace_shapes(layers)?;
    let last_index = layers.len() - 1;

    if let Some(last) = layers.last() {
        if let LayerConfig::Dense(params) | LayerConfig::Output(params) = resolve_spec(last_index, last)? {
            if params.units == num_classes {
                return Ok((layers.clone(), false));
            }
        }
    }

    let mut repaired = layers.clone();
    if trace.output().rank() > 1 {
        repaired.push(LayerSpec::new(LayerKind::Flatten));
    }
    repaired.push(LayerSpec::with_params(
        LayerKind::Output,
        json!({"units": num_classes, "activation": "softmax"}),
    ));
    log::warn!(
        "Layer list ends in {} with shape {}; appended an output layer with {num_classes} units",
        layers.last().map(LayerSpec::layer_type).unwrap_or("nothing"),
        trace.output()
    );
    Ok((repaired, true))
}
