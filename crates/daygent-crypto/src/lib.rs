//! Daygent Crypto — sealing for workspace API keys.
//!
//! Provides AES-256-GCM encryption for provider API keys at rest:
//! - The store only ever sees the sealed envelope, never the raw key
//! - Every seal operation uses a fresh random nonce (no reuse)
//! - The master key implements `Zeroize` for automatic memory cleanup
//!
//! Sealed envelope format: `v1:<base64(nonce || ciphertext)>` where the
//! ciphertext includes the 16-byte GCM authentication tag.

#![forbid(unsafe_code)]

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Envelope format version prefix.
const VERSION_PREFIX: &str = "v1:";

/// Nonce size for AES-GCM (96 bits).
const NONCE_LEN: usize = 12;

/// Error types for sealing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("seal failed")]
    SealFailed,
    /// Decryption failed (wrong key, tampered data, or invalid nonce)
    #[error("open failed")]
    OpenFailed,
    /// Invalid envelope format
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
    /// Master key material is malformed
    #[error("invalid master key: {0}")]
    InvalidKey(String),
}

/// Result type for sealing operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Cipher for sealing provider API keys using AES-256-GCM.
///
/// Implements `Zeroize` + `ZeroizeOnDrop` so the master key is wiped
/// from memory when the cipher is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ApiKeyCipher {
    key: [u8; 32],
}

impl ApiKeyCipher {
    /// Create a cipher from a raw 256-bit master key.
    #[must_use]
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Create a cipher from a base64-encoded 256-bit master key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32 bytes".to_string()))?;
        Ok(Self { key })
    }

    /// Seal a plaintext API key into a versioned envelope string.
    ///
    /// Each call uses a fresh random nonce, so sealing the same key twice
    /// produces different envelopes.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::SealFailed)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::SealFailed)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", VERSION_PREFIX, BASE64.encode(envelope)))
    }

    /// Open a sealed envelope, returning the plaintext API key.
    pub fn open(&self, sealed: &str) -> Result<String> {
        let encoded = sealed.strip_prefix(VERSION_PREFIX).ok_or_else(|| {
            CryptoError::InvalidEnvelope("unsupported envelope version".to_string())
        })?;

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidEnvelope("envelope too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::OpenFailed)?;
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::OpenFailed)?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::InvalidEnvelope("non-utf8 plaintext".to_string()))
    }
}

impl std::fmt::Debug for ApiKeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random master key, e.g. for provisioning tooling.
#[must_use]
pub fn generate_master_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
