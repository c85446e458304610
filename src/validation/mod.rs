//! Parameter validation.
//!
//! Every parameter is checked independently against the rule its layer type
//! declares in the [registry](crate::registry), so a single call reports all
//! problems at once. Absent optional parameters are valid.

mod coerce;
mod resolve;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::layer_spec::{LayerKind, LayerSpec};
use crate::registry;

pub use resolve::{LayerConfig, resolve_layer, resolve_spec};

/// Outcome of validating one layer's parameters.
///
/// `errors` maps a parameter name to every reason it was rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    /// Returns `true` when no parameter was rejected.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// Reasons recorded for one parameter; empty if it passed.
    pub fn field_errors(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn add(&mut self, name: &str, reason: impl Into<String>) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .push(reason.into());
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, reasons) in &self.errors {
            for reason in reasons {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{name}: {reason}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Validates a parameter bag against the schema of `kind`.
pub fn validate(kind: LayerKind, params: &Map<String, Value>) -> ValidationResult {
    check_params(kind, params).0
}

/// Validates a parameter bag for a raw type tag.
///
/// An unknown tag is reported under the `type` key.
pub fn validate_layer(tag: &str, params: &Map<String, Value>) -> ValidationResult {
    match LayerKind::from_tag(tag) {
        Some(kind) => validate(kind, params),
        None => {
            let mut result = ValidationResult::default();
            result.add("type", format!("Unknown layer type: {tag}"));
            result
        }
    }
}

/// Validates the parameters of a layer spec.
pub fn validate_spec(layer: &LayerSpec) -> ValidationResult {
    validate_layer(layer.layer_type(), layer.params())
}

/// Checks every parameter and returns the errors alongside the coerced values
/// of the parameters that passed.
pub(crate) fn check_params(
    kind: LayerKind,
    params: &Map<String, Value>,
) -> (ValidationResult, Map<String, Value>) {
    let definition = registry::definition(kind);
    let mut result = ValidationResult::default();
    let mut coerced = Map::new();

    for name in params.keys() {
        if definition.param(name).is_none() {
            result.add(name, format!("unknown parameter for {kind}"));
        }
    }

    for spec in definition.schema {
        match params.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    result.add(spec.name, "is required");
                }
            }
            Some(value) => match coerce::check_value(spec.rule, value) {
                Ok(value) => {
                    coerced.insert(spec.name.to_string(), value);
                }
                Err(reason) => result.add(spec.name, reason),
            },
        }
    }

    (result, coerced)
}
