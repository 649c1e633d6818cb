//! Error types for the preference store.

use prefstore_core::{CoreError, ValueType};
use prefstore_crypto::CipherError;
use prefstore_store::StoreError;
use thiserror::Error;

/// Errors that can occur during preference store operations.
#[derive(Debug, Error)]
pub enum PrefError {
    /// A metadata query named an entry that does not exist.
    #[error("unknown key {app}/{key} for user {user_id}")]
    UnknownKey {
        user_id: String,
        app: String,
        key: String,
    },

    /// The call implies a type other than the one established for the key.
    #[error("type conflict on {app}/{key}: established type is {existing}, requested {requested}")]
    TypeConflict {
        app: String,
        key: String,
        existing: ValueType,
        requested: ValueType,
    },

    /// An identifier failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The cache lock was poisoned by a panicking thread.
    #[error("preference cache lock poisoned")]
    CachePoisoned,

    /// Codec error.
    #[error("codec error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Encryption error.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

impl PrefError {
    pub(crate) fn unknown_key(user_id: &str, app: &str, key: &str) -> Self {
        PrefError::UnknownKey {
            user_id: user_id.to_string(),
            app: app.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn type_conflict(
        app: &str,
        key: &str,
        existing: ValueType,
        requested: ValueType,
    ) -> Self {
        PrefError::TypeConflict {
            app: app.to_string(),
            key: key.to_string(),
            existing,
            requested,
        }
    }

    /// Lift a validation failure out of the core error.
    pub(crate) fn from_validation(err: CoreError) -> Self {
        match err {
            CoreError::InvalidArgument(msg) => PrefError::InvalidArgument(msg),
            other => PrefError::Core(other),
        }
    }
}

/// Result type for preference store operations.
pub type Result<T> = std::result::Result<T, PrefError>;
