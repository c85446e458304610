//! Coercion of loosely typed parameter values and per-rule checks.
//!
//! Values typed into text fields arrive as strings; they are converted to the
//! type the rule expects before the rule is applied. A string that cannot be
//! converted is a type error, never a silent default.

use serde_json::Value;

use crate::registry::{Bound, ParamRule};

/// Coerces `value` for `rule` and checks it, returning the normalized value.
///
/// Scalar-or-pair values normalize to an `[h, w]` array.
pub(crate) fn check_value(rule: ParamRule, value: &Value) -> Result<Value, String> {
    match rule {
        ParamRule::PositiveInt => positive_int(value, "must be a positive integer").map(Value::from),
        ParamRule::Number { min, max } => {
            let number = number(value)?;
            if within(number, min) && within_upper(number, max) {
                Ok(Value::from(number))
            } else {
                Err(format!("must be {}", describe_range(min, max)))
            }
        }
        ParamRule::OneOf(choices) => {
            let Value::String(text) = value else {
                return Err(format!("expected a string, got {value}"));
            };
            let text = text.trim().to_lowercase();
            if choices.contains(&text.as_str()) {
                Ok(Value::String(text))
            } else {
                Err(format!("must be one of: {}", choices.join(", ")))
            }
        }
        ParamRule::Flag => flag(value).map(Value::Bool),
        ParamRule::Shape { min_len, max_len } => {
            let dims = int_list(value)?;
            if dims.len() < min_len || dims.len() > max_len {
                return Err(format!(
                    "must have {min_len} to {max_len} dimensions, got {}",
                    dims.len()
                ));
            }
            let dims = dims
                .iter()
                .enumerate()
                .map(|(i, dim)| {
                    positive_int(dim, &format!("dimension {i} must be a positive integer"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::from(dims))
        }
        ParamRule::ScalarOrPair => {
            const REASON: &str = "must be a positive integer or a [height, width] pair of positive integers";
            let dims = int_list(value)?;
            let pair = match dims.as_slice() {
                [side] => {
                    let side = positive_int(side, REASON)?;
                    [side, side]
                }
                [height, width] => [positive_int(height, REASON)?, positive_int(width, REASON)?],
                _ => return Err(REASON.to_string()),
            };
            Ok(Value::from(pair.to_vec()))
        }
    }
}

fn number(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|number| number.is_finite())
        .ok_or_else(|| format!("expected a number, got {value}"))
}

fn positive_int(value: &Value, reason: &str) -> Result<u64, String> {
    let number = number(value)?;
    if number >= 1.0 && number.fract() == 0.0 && number <= u32::MAX as f64 {
        Ok(number as u64)
    } else {
        Err(reason.to_string())
    }
}

fn flag(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(format!("expected a boolean, got {value}")),
        },
        _ => Err(format!("expected a boolean, got {value}")),
    }
}

/// Splits a value into list elements. Accepts arrays, a bare scalar and
/// comma-separated strings such as `"28, 28"` or `"[28, 28]"`.
fn int_list(value: &Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Number(_) => Ok(vec![value.clone()]),
        Value::String(text) => {
            let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
            if inner.trim().is_empty() {
                return Err(format!("expected a list of numbers, got {value}"));
            }
            Ok(inner
                .split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .collect())
        }
        _ => Err(format!("expected a list of numbers, got {value}")),
    }
}

fn within(number: f64, min: Bound) -> bool {
    match min {
        Bound::Unbounded => true,
        Bound::Inclusive(min) => number >= min,
        Bound::Exclusive(min) => number > min,
    }
}

fn within_upper(number: f64, max: Bound) -> bool {
    match max {
        Bound::Unbounded => true,
        Bound::Inclusive(max) => number <= max,
        Bound::Exclusive(max) => number < max,
    }
}

fn describe_range(min: Bound, max: Bound) -> String {
    let lower = match min {
        Bound::Unbounded => None,
        Bound::Inclusive(min) => Some(format!(">= {min}")),
        Bound::Exclusive(min) => Some(format!("> {min}")),
    };
    let upper = match max {
        Bound::Unbounded => None,
        Bound::Inclusive(max) => Some(format!("<= {max}")),
        Bound::Exclusive(max) => Some(format!("< {max}")),
    };
    match (lower, upper) {
        (Some(lower), Some(upper)) => format!("{lower} and {upper}"),
        (Some(bound), None) | (None, Some(bound)) => bound,
        (None, None) => "a number".to_string(),
    }
}
