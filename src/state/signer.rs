//! HMAC-signed state tokens
//!
//! A token is `base64url(json) "." base64url(hmac_sha256(key, base64url(json)))`.
//! The payload is readable by the holder; use [`SealedStateCodec`](super::SealedStateCodec)
//! when it must also stay secret.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{MfaError, MfaResult};
use crate::utils::crypto::{derive_key, hmac_sha256, verify_hmac_sha256, DERIVED_KEY_SIZE};

const SEPARATOR: char = '.';

/// Signs state into opaque tokens and verifies them back
#[derive(Clone)]
pub struct SignedStateCodec {
    key: [u8; DERIVED_KEY_SIZE],
}

impl std::fmt::Debug for SignedStateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedStateCodec").finish_non_exhaustive()
    }
}

impl SignedStateCodec {
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

    /// Serialize and sign `state`
    ///
    /// # Errors
    ///
    /// Returns an error only if `state` cannot be represented as JSON, which
    /// does not happen for the plain structs this crate signs
    pub fn sign<T: Serialize>(&self, state: &T) -> MfaResult<String> {
        let json = serde_json::to_vec(state)
            .map_err(|e| MfaError::Internal(format!("Failed to serialize state: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hmac_sha256(payload.as_bytes(), &self.key)?;

        Ok(format!(
            "{payload}{SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify and deserialize a token produced by [`sign`](Self::sign)
    ///
    /// # Errors
    ///
    /// Returns `TamperedState` if the token is malformed, the signature does
    /// not verify, or the payload does not deserialize into `T`
    pub fn unsign<T: DeserializeOwned>(&self, token: &str) -> MfaResult<T> {
        let (payload, signature) = token
            .split_once(SEPARATOR)
            .ok_or(MfaError::TamperedState)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| MfaError::TamperedState)?;

        if !verify_hmac_sha256(payload.as_bytes(), &self.key, &signature) {
            return Err(MfaError::TamperedState);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| MfaError::TamperedState)?;
        serde_json::from_slice(&json).map_err(|_| MfaError::TamperedState)
    }
}
