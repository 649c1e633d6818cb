//! Marker-prefixed wrapping of sensitive values.

use std::sync::Arc;

use crate::cipher::Cipher;
use crate::error::Result;

/// Prefix carried by every encrypted stored value.
pub const ENCRYPTION_MARKER: &str = "$UserConfigEncryption$";

/// Wraps and unwraps sensitive values around a [`Cipher`].
///
/// Stored values without the marker are returned as-is by [`unwrap`], so
/// rows written before an entry became sensitive stay readable.
///
/// [`unwrap`]: SensitiveCipher::unwrap
#[derive(Clone)]
pub struct SensitiveCipher {
    inner: Arc<dyn Cipher>,
}

impl SensitiveCipher {
    pub fn new(inner: Arc<dyn Cipher>) -> Self {
        Self { inner }
    }

    /// Encrypt and prefix with [`ENCRYPTION_MARKER`].
    pub fn wrap(&self, plaintext: &str) -> Result<String> {
        let sealed = self.inner.encrypt(plaintext)?;
        Ok(format!("{}{}", ENCRYPTION_MARKER, sealed))
    }

    /// Strip the marker and decrypt, or pass an unmarked value through.
    pub fn unwrap(&self, stored: &str) -> Result<String> {
        match stored.strip_prefix(ENCRYPTION_MARKER) {
            Some(sealed) => self.inner.decrypt(sealed),
            None => {
                tracing::trace!("sensitive value stored without encryption marker");
                Ok(stored.to_string())
            }
        }
    }

    /// Whether a stored value carries the marker.
    pub fn is_wrapped(stored: &str) -> bool {
        stored.starts_with(ENCRYPTION_MARKER)
    }
}

impl std::fmt::Debug for SensitiveCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensitiveCipher").finish_non_exhaustive()
    }
}
