//! # Prefstore Crypto
//!
//! Encryption at rest for sensitive preferences.
//!
//! - [`Cipher`] - the opaque encrypt/decrypt capability
//! - [`ChaChaCipher`] - ChaCha20-Poly1305 implementation, keyed directly or
//!   from an installation secret via BLAKE3 key derivation
//! - [`SensitiveCipher`] - prefixes sealed values with [`ENCRYPTION_MARKER`]
//!   and passes unmarked legacy values through on read

pub mod cipher;
pub mod error;
pub mod sensitive;

pub use cipher::{ChaChaCipher, Cipher};
pub use error::{CipherError, Result};
pub use sensitive::{SensitiveCipher, ENCRYPTION_MARKER};
