//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur while sealing or opening sensitive values.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error, including authentication failure.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// The stored ciphertext is not in the expected envelope.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),
}

/// Result type for cipher operations.
pub type Result<T> = std::result::Result<T, CipherError>;
