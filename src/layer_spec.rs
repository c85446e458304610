//! Declarative layer descriptions.
//!
//! A [`LayerSpec`] is what the editor produces when a user drops a layer onto the
//! canvas: a type tag, a display name and a bag of loosely typed parameters. A
//! [`LayerList`] is the ordered sequence handed to the validator, the shape
//! propagator and the compiler.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry;

/// Global counter for unique layer IDs.
static LAYER_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Opaque unique identifier of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(usize);

impl LayerId {
    /// Generates a new unique layer ID.
    pub fn next() -> Self {
        Self(LAYER_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// The closed set of layer types the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerKind {
    Input,
    Dense,
    Conv2d,
    Maxpool2d,
    Dropout,
    Flatten,
    Output,
    Embedding,
    MultiHeadAttention,
    LayerNorm,
    PositionalEncoding,
    TransformerBlock,
    GlobalAvgPool1d,
}

impl LayerKind {
    /// Every layer kind, in palette order.
    pub const ALL: [LayerKind; 13] = [
        LayerKind::Input,
        LayerKind::Dense,
        LayerKind::Conv2d,
        LayerKind::Maxpool2d,
        LayerKind::Dropout,
        LayerKind::Flatten,
        LayerKind::Output,
        LayerKind::Embedding,
        LayerKind::MultiHeadAttention,
        LayerKind::LayerNorm,
        LayerKind::PositionalEncoding,
        LayerKind::TransformerBlock,
        LayerKind::GlobalAvgPool1d,
    ];

    /// Returns the wire tag of this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            LayerKind::Input => "input",
            LayerKind::Dense => "dense",
            LayerKind::Conv2d => "conv2d",
            LayerKind::Maxpool2d => "maxpool2d",
            LayerKind::Dropout => "dropout",
            LayerKind::Flatten => "flatten",
            LayerKind::Output => "output",
            LayerKind::Embedding => "embedding",
            LayerKind::MultiHeadAttention => "multiHeadAttention",
            LayerKind::LayerNorm => "layerNorm",
            LayerKind::PositionalEncoding => "positionalEncoding",
            LayerKind::TransformerBlock => "transformerBlock",
            LayerKind::GlobalAvgPool1d => "globalAvgPool1d",
        }
    }

    /// Looks up a kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Human-readable name used when a layer is created from the palette.
    pub fn display_name(&self) -> &'static str {
        match self {
            LayerKind::Input => "Input",
            LayerKind::Dense => "Dense",
            LayerKind::Conv2d => "Conv2D",
            LayerKind::Maxpool2d => "MaxPooling2D",
            LayerKind::Dropout => "Dropout",
            LayerKind::Flatten => "Flatten",
            LayerKind::Output => "Output",
            LayerKind::Embedding => "Embedding",
            LayerKind::MultiHeadAttention => "Multi-Head Attention",
            LayerKind::LayerNorm => "Layer Normalization",
            LayerKind::PositionalEncoding => "Positional Encoding",
            LayerKind::TransformerBlock => "Transformer Block",
            LayerKind::GlobalAvgPool1d => "Global Average Pooling 1D",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One layer as described by the user, not yet executable.
///
/// The type tag is kept as the raw string received from the editor so that an
/// unknown tag survives until compilation and can be reported verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(default = "LayerId::next")]
    id: LayerId,
    #[serde(rename = "type")]
    layer_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    params: Map<String, Value>,
}

impl LayerSpec {
    /// Creates a layer of the given kind with the registry's default parameters.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            layer_type: kind.tag().to_string(),
            name: kind.display_name().to_string(),
            params: registry::definition(kind).default_params,
        }
    }

    /// Creates a layer of the given kind with explicit parameters.
    ///
    /// See [`LayerSpec::from_tag`] for how non-object values are handled.
    pub fn with_params(kind: LayerKind, params: Value) -> Self {
        Self::from_tag(kind.tag(), params).named(kind.display_name())
    }

    /// Creates a layer from a raw tag, which is not checked against the known kinds.
    ///
    /// `null` means no parameters. Any other non-object value is discarded with
    /// a warning, so validation then reports each required parameter of the
    /// layer as `is required`.
    pub fn from_tag(tag: impl Into<String>, params: Value) -> Self {
        let tag = tag.into();
        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                log::warn!("Ignoring non-object parameters for {tag} layer: {other}");
                Map::new()
            }
        };
        Self {
            id: LayerId::next(),
            name: tag.clone(),
            layer_type: tag,
            params,
        }
    }

    /// Sets the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the identifier assigned when the layer was created.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Returns the raw type tag.
    pub fn layer_type(&self) -> &str {
        &self.layer_type
    }

    /// Returns the kind, or `None` for a tag outside the closed set.
    pub fn kind(&self) -> Option<LayerKind> {
        LayerKind::from_tag(&self.layer_type)
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the layer in place.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the raw parameter bag.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Returns one raw parameter value.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Sets a parameter, returning the previous value.
    pub fn set_param(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.params.insert(name.into(), value)
    }

    /// Removes a parameter, returning its value.
    pub fn remove_param(&mut self, name: &str) -> Option<Value> {
        self.params.remove(name)
    }
}

/// Ordered sequence of layers.
///
/// The container does not enforce ordering rules; the compiler checks that the
/// first entry is an `input` layer and the shape propagator checks the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerList {
    layers: Vec<LayerSpec>,
}

impl LayerList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list starting with an `input` layer of the given shape.
    pub fn with_input(shape: &[usize]) -> Self {
        let input = LayerSpec::with_params(LayerKind::Input, serde_json::json!({ "shape": shape }));
        Self {
            layers: vec![input],
        }
    }

    /// Appends a layer.
    pub fn push(&mut self, layer: LayerSpec) -> LayerId {
        let id = layer.id();
        self.layers.push(layer);
        id
    }

    /// Appends a layer, builder style.
    pub fn layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    /// Inserts a layer at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, layer: LayerSpec) -> LayerId {
        let id = layer.id();
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        id
    }

    /// Removes the layer with the given ID.
    pub fn remove(&mut self, id: LayerId) -> Option<LayerSpec> {
        let index = self.position(id)?;
        Some(self.layers.remove(index))
    }

    /// Removes and returns the last layer.
    pub fn pop(&mut self) -> Option<LayerSpec> {
        self.layers.pop()
    }

    /// Moves the layer with the given ID to `to`, clamped to the end of the list.
    pub fn move_layer(&mut self, id: LayerId, to: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        let layer = self.layers.remove(from);
        let to = to.min(self.layers.len());
        self.layers.insert(to, layer);
        true
    }

    /// Returns the index of the layer with the given ID.
    pub fn position(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }

    /// Returns the layer at `index`.
    pub fn get(&self, index: usize) -> Option<&LayerSpec> {
        self.layers.get(index)
    }

    /// Returns the layer with the given ID for editing.
    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerSpec> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }

    /// Returns the first layer, normally the `input` layer.
    pub fn first(&self) -> Option<&LayerSpec> {
        self.layers.first()
    }

    /// Returns the last layer.
    pub fn last(&self) -> Option<&LayerSpec> {
        self.layers.last()
    }

    /// Iterates over the layers in order.
    pub fn iter(&self) -> std::slice::Iter<'_, LayerSpec> {
        self.layers.iter()
    }

    /// Returns the number of layers, including the `input` layer.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if the list holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the layers as a slice.
    pub fn as_slice(&self) -> &[LayerSpec] {
        &self.layers
    }
}

impl From<Vec<LayerSpec>> for LayerList {
    fn from(layers: Vec<LayerSpec>) -> Self {
        Self { layers }
    }
}

impl<'a> IntoIterator for &'a LayerList {
    type Item = &'a LayerSpec;
    type IntoIter = std::slice::Iter<'a, LayerSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tag_lookup() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(LayerKind::from_tag("bogus"), None);
        assert_eq!(LayerKind::from_tag("Dense"), None);
    }

    #[test]
    fn test_kind_serde_uses_tags() {
        let json = serde_json::to_string(&LayerKind::MultiHeadAttention).unwrap();
        assert_eq!(json, "\"multiHeadAttention\"");
        let kind: LayerKind = serde_json::from_str("\"globalAvgPool1d\"").unwrap();
        assert_eq!(kind, LayerKind::GlobalAvgPool1d);
    }

    #[test]
    fn test_layer_ids_are_unique() {
        let a = LayerSpec::new(LayerKind::Dense);
        let b = LayerSpec::new(LayerKind::Dense);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_new_layer_uses_default_params() {
        let layer = LayerSpec::new(LayerKind::Dropout);
        assert_eq!(layer.kind(), Some(LayerKind::Dropout));
        assert_eq!(layer.name(), "Dropout");
        assert!(layer.param("rate").is_some());
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let layer = LayerSpec::from_tag("bogus", json!({}));
        assert_eq!(layer.layer_type(), "bogus");
        assert_eq!(layer.kind(), None);
    }

    #[test]
    fn test_non_object_params_surface_as_missing() {
        let layer = LayerSpec::with_params(LayerKind::Dense, json!([16]));
        assert!(layer.params().is_empty());
        let result = crate::validation::validate_spec(&layer);
        assert_eq!(result.field_errors("units"), ["is required".to_string()]);

        let layer = LayerSpec::from_tag("flatten", Value::Null);
        assert!(crate::validation::validate_spec(&layer).is_valid());
    }

    #[test]
    fn test_layer_spec_deserialize() {
        let layer: LayerSpec =
            serde_json::from_value(json!({ "type": "dense", "params": { "units": 10 } })).unwrap();
        assert_eq!(layer.kind(), Some(LayerKind::Dense));
        assert_eq!(layer.param("units"), Some(&json!(10)));
    }

    #[test]
    fn test_list_editing() {
        let mut list = LayerList::with_input(&[4]);
        let dense = list.push(LayerSpec::new(LayerKind::Dense));
        let dropout = list.push(LayerSpec::new(LayerKind::Dropout));
        assert_eq!(list.len(), 3);

        assert!(list.move_layer(dropout, 1));
        assert_eq!(list.position(dropout), Some(1));
        assert_eq!(list.position(dense), Some(2));

        let removed = list.remove(dense).unwrap();
        assert_eq!(removed.kind(), Some(LayerKind::Dense));
        assert_eq!(list.len(), 2);
        assert!(list.remove(dense).is_none());
    }

    #[test]
    fn test_param_edit_in_place() {
        let mut list = LayerList::with_input(&[4]);
        let id = list.push(LayerSpec::new(LayerKind::Dense));
        list.get_mut(id).unwrap().set_param("units", json!(3));
        assert_eq!(list.get(1).unwrap().param("units"), Some(&json!(3)));
    }
}
