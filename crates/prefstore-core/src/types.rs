//! Value type tags and decoded values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type tag stored alongside every preference.
///
/// Discriminants match the persisted `type` column. `Mixed` is the untyped
/// state: a key stays `Mixed` until a typed write establishes its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Mixed,
    String,
    Int,
    Float,
    Array,
    Bool,
}

impl ValueType {
    /// All value types, in discriminant order.
    pub const ALL: [ValueType; 6] = [
        ValueType::Mixed,
        ValueType::String,
        ValueType::Int,
        ValueType::Float,
        ValueType::Array,
        ValueType::Bool,
    ];

    /// Convert to the persisted discriminant.
    pub const fn to_i64(self) -> i64 {
        match self {
            ValueType::Mixed => 0,
            ValueType::String => 1,
            ValueType::Int => 2,
            ValueType::Float => 3,
            ValueType::Array => 4,
            ValueType::Bool => 5,
        }
    }

    /// Parse from the persisted discriminant.
    pub const fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(ValueType::Mixed),
            1 => Some(ValueType::String),
            2 => Some(ValueType::Int),
            3 => Some(ValueType::Float),
            4 => Some(ValueType::Array),
            5 => Some(ValueType::Bool),
            _ => None,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Mixed => "mixed",
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Array => "array",
            ValueType::Bool => "bool",
        }
    }

    /// Whether this is the untyped state.
    pub const fn is_mixed(self) -> bool {
        matches!(self, ValueType::Mixed)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded preference value.
///
/// `Array` holds any JSON array or object. `Mixed` carries the raw string
/// of an untyped entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TypedValue {
    Mixed(String),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(serde_json::Value),
}

impl TypedValue {
    /// The type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Mixed(_) => ValueType::Mixed,
            TypedValue::String(_) => ValueType::String,
            TypedValue::Int(_) => ValueType::Int,
            TypedValue::Float(_) => ValueType::Float,
            TypedValue::Bool(_) => ValueType::Bool,
            TypedValue::Array(_) => ValueType::Array,
        }
    }

    /// The zero value of a type, used by lenient coercion.
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Mixed => TypedValue::Mixed(String::new()),
            ValueType::String => TypedValue::String(String::new()),
            ValueType::Int => TypedValue::Int(0),
            ValueType::Float => TypedValue::Float(0.0),
            ValueType::Bool => TypedValue::Bool(false),
            ValueType::Array => TypedValue::Array(serde_json::Value::Array(Vec::new())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Mixed(s) | TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TypedValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&serde_json::Value> {
        match self {
            TypedValue::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Int(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Float(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

impl From<serde_json::Value> for TypedValue {
    fn from(v: serde_json::Value) -> Self {
        TypedValue::Array(v)
    }
}
