//! Error types for the prefstore core.

use thiserror::Error;

use crate::types::ValueType;

/// Core errors raised by the codec and parameter validation.
///
/// Messages never include the value being decoded, since it may be the
/// plaintext of a sensitive entry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("type conflict: established type is {existing}, requested {requested}")]
    TypeConflict {
        existing: ValueType,
        requested: ValueType,
    },

    #[error("value cannot be decoded as {value_type}: {reason}")]
    IncorrectType {
        value_type: ValueType,
        reason: String,
    },

    #[error("unknown value type discriminant: {0}")]
    UnknownValueType(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
