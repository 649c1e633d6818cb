//! Symmetric encryption of preference values.
//!
//! [`ChaChaCipher`] seals strings with ChaCha20-Poly1305 under a random
//! nonce and emits `hex(nonce || ciphertext)`, so the output always fits
//! the text column of the row store.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::{CipherError, Result};

/// Key derivation context for [`ChaChaCipher::from_secret`].
const KEY_CONTEXT: &str = "prefstore-v1 sensitive preference encryption";

const NONCE_LEN: usize = 12;

/// Anything that can turn plaintext into opaque text and back.
///
/// Implementations must be authenticated: `decrypt` fails on input that was
/// not produced by `encrypt` under the same key.
pub trait Cipher: Send + Sync {
    /// Encrypt a plaintext string.
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt the output of [`Cipher::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// ChaCha20-Poly1305 with a 256-bit key.
#[derive(Clone)]
pub struct ChaChaCipher {
    key: [u8; 32],
}

impl ChaChaCipher {
    /// Generate a cipher with a new random key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Create from raw key bytes.
    pub const fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the key from an installation secret of any length.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret),
        }
    }

    #[cfg(test)]
    fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    fn aead(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| CipherError::EncryptionError(e.to_string()))
    }
}

impl std::fmt::Debug for ChaChaCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaCipher").finish_non_exhaustive()
    }
}

impl Cipher for ChaChaCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .aead()?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CipherError::EncryptionError(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(hex::encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let bytes =
            hex::decode(ciphertext).map_err(|e| CipherError::MalformedCiphertext(e.to_string()))?;
        if bytes.len() < NONCE_LEN {
            return Err(CipherError::MalformedCiphertext(format!(
                "expected at least {} bytes, got {}",
                NONCE_LEN,
                bytes.len()
            )));
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let opened = self
            .aead()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|e| CipherError::DecryptionError(e.to_string()))?;

        String::from_utf8(opened).map_err(|e| CipherError::DecryptionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = ChaChaCipher::generate();
        let sealed = cipher.encrypt("hello, world!").unwrap();
        assert_ne!(sealed, "hello, world!");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "hello, world!");
    }

    #[test]
    fn test_nonce_is_fresh() {
        let cipher = ChaChaCipher::generate();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = ChaChaCipher::generate();
        let key2 = ChaChaCipher::generate();
        let sealed = key1.encrypt("secret").unwrap();
        assert!(matches!(
            key2.decrypt(&sealed),
            Err(CipherError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_decrypt_malformed() {
        let cipher = ChaChaCipher::generate();
        assert!(matches!(
            cipher.decrypt("not hex"),
            Err(CipherError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            cipher.decrypt("abcd"),
            Err(CipherError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_key_derivation_deterministic() {
        let a = ChaChaCipher::from_secret(b"instance-secret");
        let b = ChaChaCipher::from_secret(b"instance-secret");
        let c = ChaChaCipher::from_secret(b"other-secret");
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());

        let sealed = a.encrypt("x").unwrap();
        assert_eq!(b.decrypt(&sealed).unwrap(), "x");
    }

    #[test]
    fn test_debug_hides_key() {
        let cipher = ChaChaCipher::from_bytes([7; 32]);
        assert!(!format!("{:?}", cipher).contains('7'));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(s in ".*") {
            let cipher = ChaChaCipher::from_bytes([0x42; 32]);
            let sealed = cipher.encrypt(&s).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), s);
        }
    }
}
