//! Rust types that map onto preference value types.

use prefstore_core::{TypedValue, ValueType};

/// A Rust type with a fixed preference [`ValueType`].
///
/// Backs the generic [`get_value`](crate::PreferenceStore::get_value) and
/// [`set_value`](crate::PreferenceStore::set_value) accessors.
pub trait PreferenceValue: Sized {
    /// The type tag values of this type are written under.
    const TYPE: ValueType;

    fn into_typed(self) -> TypedValue;

    /// Extract from a decoded value. `None` if the variant does not match.
    fn from_typed(value: TypedValue) -> Option<Self>;
}

impl PreferenceValue for String {
    const TYPE: ValueType = ValueType::String;

    fn into_typed(self) -> TypedValue {
        TypedValue::String(self)
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        match value {
            TypedValue::String(s) | TypedValue::Mixed(s) => Some(s),
            _ => None,
        }
    }
}

impl PreferenceValue for i64 {
    const TYPE: ValueType = ValueType::Int;

    fn into_typed(self) -> TypedValue {
        TypedValue::Int(self)
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        value.as_int()
    }
}

impl PreferenceValue for f64 {
    const TYPE: ValueType = ValueType::Float;

    fn into_typed(self) -> TypedValue {
        TypedValue::Float(self)
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        value.as_float()
    }
}

impl PreferenceValue for bool {
    const TYPE: ValueType = ValueType::Bool;

    fn into_typed(self) -> TypedValue {
        TypedValue::Bool(self)
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        value.as_bool()
    }
}

impl PreferenceValue for serde_json::Value {
    const TYPE: ValueType = ValueType::Array;

    fn into_typed(self) -> TypedValue {
        TypedValue::Array(self)
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        match value {
            TypedValue::Array(v) => Some(v),
            _ => None,
        }
    }
}
