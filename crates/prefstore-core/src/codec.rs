//! Value codec: typed values to and from their persisted string form.
//!
//! ## Encoding rules
//!
//! | Type | Persisted form |
//! |---|---|
//! | `String`, `Mixed` | the string itself |
//! | `Int` | decimal |
//! | `Float` | shortest round-trip decimal |
//! | `Bool` | `"1"` or `"0"` |
//! | `Array` | JSON text |
//!
//! Decoding booleans follows the historical rule: `"0"` and the empty
//! string are false, every other string is true.

use crate::error::{CoreError, Result};
use crate::types::{TypedValue, ValueType};

/// Encode a value to its persisted string.
pub fn encode(value: &TypedValue) -> Result<String> {
    match value {
        TypedValue::Mixed(s) | TypedValue::String(s) => Ok(s.clone()),
        TypedValue::Int(v) => Ok(v.to_string()),
        TypedValue::Float(v) => Ok(v.to_string()),
        TypedValue::Bool(v) => Ok(if *v { "1" } else { "0" }.to_string()),
        TypedValue::Array(v) => {
            if !(v.is_array() || v.is_object()) {
                return Err(CoreError::EncodingError(
                    "array values must be a JSON array or object".into(),
                ));
            }
            serde_json::to_string(v).map_err(|e| CoreError::EncodingError(e.to_string()))
        }
    }
}

/// Decode a persisted string under the given type.
///
/// Fails with [`CoreError::IncorrectType`] if the string is not a valid
/// representation of that type.
pub fn decode(raw: &str, value_type: ValueType) -> Result<TypedValue> {
    match value_type {
        ValueType::Mixed => Ok(TypedValue::Mixed(raw.to_string())),
        ValueType::String => Ok(TypedValue::String(raw.to_string())),
        ValueType::Int => raw
            .trim()
            .parse::<i64>()
            .map(TypedValue::Int)
            .map_err(|e| incorrect(value_type, e.to_string())),
        ValueType::Float => raw
            .trim()
            .parse::<f64>()
            .map(TypedValue::Float)
            .map_err(|e| incorrect(value_type, e.to_string())),
        ValueType::Bool => Ok(TypedValue::Bool(decode_bool(raw))),
        ValueType::Array => {
            let value: serde_json::Value =
                serde_json::from_str(raw).map_err(|e| incorrect(value_type, e.to_string()))?;
            if value.is_array() || value.is_object() {
                Ok(TypedValue::Array(value))
            } else {
                Err(incorrect(value_type, "not a JSON array or object".into()))
            }
        }
    }
}

/// Decode leniently: anything that does not decode becomes the type's zero value.
///
/// Integers that only parse as floats are truncated.
pub fn coerce(raw: &str, value_type: ValueType) -> TypedValue {
    match decode(raw, value_type) {
        Ok(value) => value,
        Err(_) if value_type == ValueType::Int => match raw.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => TypedValue::Int(f as i64),
            _ => TypedValue::zero(value_type),
        },
        Err(_) => TypedValue::zero(value_type),
    }
}

/// The legacy boolean rule.
pub fn decode_bool(raw: &str) -> bool {
    !raw.is_empty() && raw != "0"
}

/// Reconcile the established type of a key with the type a call requests.
///
/// - `Mixed` requests never conflict and keep the established type.
/// - An untyped (`Mixed`) key accepts any requested type.
/// - Otherwise the types must match.
pub fn resolve_type(existing: ValueType, requested: ValueType) -> Result<ValueType> {
    if requested.is_mixed() {
        return Ok(existing);
    }
    if existing.is_mixed() || existing == requested {
        return Ok(requested);
    }
    Err(CoreError::TypeConflict {
        existing,
        requested,
    })
}

fn incorrect(value_type: ValueType, reason: String) -> CoreError {
    CoreError::IncorrectType { value_type, reason }
}
