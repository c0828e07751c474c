//! Encrypted state tokens
//!
//! Used for values that travel through the client but must not be readable
//! there, such as a pending TOTP secret or an emailed one-time code.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{MfaError, MfaResult};
use crate::utils::crypto::{derive_key, random_bytes, DERIVED_KEY_SIZE};

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Seals serializable values with AES-256-GCM
#[derive(Clone)]
pub struct SealedStateCodec {
    key: [u8; DERIVED_KEY_SIZE],
}

impl std::fmt::Debug for SealedStateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedStateCodec").finish_non_exhaustive()
    }
}

impl SealedStateCodec {
    /// Create a codec keyed from `secret`, scoped by `salt`
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation fails
    pub fn new(secret: &[u8], salt: &str) -> MfaResult<Self> {
        Ok(Self {
            key: derive_key(secret, salt)?,
        })
    }

    /// Encrypt `data` into a Base64URL string of nonce + ciphertext
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Serialization fails
    /// - AES encryption fails
    pub fn seal<T: Serialize>(&self, data: &T) -> MfaResult<String> {
        let json_data = serde_json::to_vec(data)
            .map_err(|e| MfaError::Internal(format!("Failed to serialize data: {e}")))?;

        let nonce_bytes = random_bytes(NONCE_SIZE);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let ciphertext = cipher
            .encrypt(nonce, json_data.as_slice())
            .map_err(|e| MfaError::Internal(format!("AES encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Decrypt and deserialize a token produced by [`seal`](Self::seal)
    ///
    /// # Errors
    ///
    /// Returns `TamperedState` if:
    /// - Base64 decoding fails
    /// - Data is shorter than a nonce
    /// - AES decryption or authentication fails
    /// - Deserialization fails
    pub fn open<T: DeserializeOwned>(&self, sealed: &str) -> MfaResult<T> {
        let combined = general_purpose::URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|_| MfaError::TamperedState)?;

        if combined.len() < NONCE_SIZE {
            return Err(MfaError::TamperedState);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| MfaError::TamperedState)?;

        serde_json::from_slice(&plaintext).map_err(|_| MfaError::TamperedState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(salt: &str) -> SealedStateCodec {
        SealedStateCodec::new(b"test-sealing-secret", salt).unwrap()
    }

    #[test]
    fn test_seal_open() {
        let codec = codec("mfakit.test");
        let sealed = codec.seal(&"JBSWY3DPEHPK3PXP".to_string()).unwrap();
        let opened: String = codec.open(&sealed).unwrap();
        assert_eq!(opened, "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn test_sealed_value_is_not_readable() {
        let codec = codec("mfakit.test");
        let sealed = codec.seal(&"JBSWY3DPEHPK3PXP".to_string()).unwrap();
        let raw = general_purpose::URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("JBSWY3DPEHPK3PXP"));
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let codec = codec("mfakit.test");
        let a = codec.seal(&42u32).unwrap();
        let b = codec.seal(&42u32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_tampered() {
        let sealed = codec("mfakit.a").seal(&42u32).unwrap();
        assert_eq!(
            codec("mfakit.b").open::<u32>(&sealed),
            Err(MfaError::TamperedState)
        );
    }

    #[test]
    fn test_garbage_is_tampered() {
        let codec = codec("mfakit.test");
        assert_eq!(codec.open::<u32>(""), Err(MfaError::TamperedState));
        assert_eq!(codec.open::<u32>("c2hvcnQ"), Err(MfaError::TamperedState));
        assert_eq!(codec.open::<u32>("not base64!"), Err(MfaError::TamperedState));
    }
}
