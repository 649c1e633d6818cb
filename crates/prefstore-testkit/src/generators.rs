//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::json;

use prefstore_core::{TypedValue, ValueType};

/// A valid user id.
pub fn user_id() -> impl Strategy<Value = String> {
    "user[0-9]{1,3}".prop_map(String::from)
}

/// A valid app id.
pub fn app_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// A valid key.
pub fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,31}".prop_map(String::from)
}

/// Any concrete (non-mixed) value type.
pub fn concrete_type() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::String),
        Just(ValueType::Int),
        Just(ValueType::Float),
        Just(ValueType::Bool),
        Just(ValueType::Array),
    ]
}

/// A JSON array or object.
pub fn json_container() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        prop::collection::vec(any::<i32>(), 0..5).prop_map(|v| json!(v)),
        ("[a-z]{1,8}", "[ -~]{0,16}").prop_map(|(k, v)| json!({ k: v })),
    ]
}

/// A value of the given type.
pub fn typed_value_of(value_type: ValueType) -> BoxedStrategy<TypedValue> {
    match value_type {
        ValueType::Mixed => "[ -~]{0,32}".prop_map(TypedValue::Mixed).boxed(),
        ValueType::String => "[ -~]{0,32}".prop_map(TypedValue::String).boxed(),
        ValueType::Int => any::<i64>().prop_map(TypedValue::Int).boxed(),
        ValueType::Float => (-1.0e12f64..1.0e12f64).prop_map(TypedValue::Float).boxed(),
        ValueType::Bool => any::<bool>().prop_map(TypedValue::Bool).boxed(),
        ValueType::Array => json_container().prop_map(TypedValue::Array).boxed(),
    }
}

/// A value of any concrete type.
pub fn typed_value() -> impl Strategy<Value = TypedValue> {
    concrete_type().prop_flat_map(typed_value_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefstore_core::{decode, encode, Limits};

    proptest! {
        #[test]
        fn prop_identifiers_pass_validation(user in user_id(), app in app_id(), k in key()) {
            prop_assert!(Limits::default().check_entry(&user, &app, &k).is_ok());
        }

        #[test]
        fn prop_generated_values_roundtrip(value in typed_value()) {
            let raw = encode(&value).unwrap();
            prop_assert_eq!(decode(&raw, value.value_type()).unwrap(), value);
        }
    }
}
