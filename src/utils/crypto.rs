// Cryptographic helpers shared by the signed and sealed state codecs

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{MfaError, MfaResult};

type HmacSha256 = Hmac<Sha256>;

/// Size of every derived key (256 bits)
pub const DERIVED_KEY_SIZE: usize = 32;

/// Derive a purpose-specific key from the configured secret
///
/// Different salts yield independent keys, so a token produced for one
/// purpose never verifies for another.
///
/// # Errors
///
/// Returns an error if the HMAC cannot be keyed
pub fn derive_key(secret: &[u8], salt: &str) -> MfaResult<[u8; DERIVED_KEY_SIZE]> {
    let tag = hmac_sha256(salt.as_bytes(), secret)?;
    let mut key = [0u8; DERIVED_KEY_SIZE];
    key.copy_from_slice(&tag[..DERIVED_KEY_SIZE]);
    Ok(key)
}

/// Compute HMAC-SHA256 of `message` under `key`
///
/// # Errors
///
/// Returns an error if HMAC computation fails
pub fn hmac_sha256(message: &[u8], key: &[u8]) -> MfaResult<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| MfaError::Internal(format!("Invalid HMAC key length: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify an HMAC-SHA256 tag in constant time
#[must_use]
pub fn verify_hmac_sha256(message: &[u8], key: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}

/// Fill a buffer of `length` bytes from the thread-local CSPRNG
#[must_use]
pub fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Compare two byte strings without short-circuiting on the first difference
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test_secret_key_for_hmac_testing_32b";

    #[test]
    fn test_hmac_sha256_deterministic() {
        let sig1 = hmac_sha256(b"test.message", TEST_SECRET).unwrap();
        let sig2 = hmac_sha256(b"test.message", TEST_SECRET).unwrap();

        assert_eq!(sig1, sig2, "HMAC signatures should be deterministic");
        assert_eq!(sig1.len(), 32); // SHA-256 produces 32-byte hash
    }

    #[test]
    fn test_verify_hmac_sha256() {
        let tag = hmac_sha256(b"payload", TEST_SECRET).unwrap();
        assert!(verify_hmac_sha256(b"payload", TEST_SECRET, &tag));
        assert!(!verify_hmac_sha256(b"payload2", TEST_SECRET, &tag));
        assert!(!verify_hmac_sha256(b"payload", b"other-key", &tag));
        assert!(!verify_hmac_sha256(b"payload", TEST_SECRET, &tag[..31]));
    }

    #[test]
    fn test_derive_key_depends_on_salt() {
        let a = derive_key(TEST_SECRET, "mfakit.state").unwrap();
        let b = derive_key(TEST_SECRET, "mfakit.totp").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, derive_key(TEST_SECRET, "mfakit.state").unwrap());
    }

    #[test]
    fn test_random_bytes_length_and_uniqueness() {
        let a = random_bytes(20);
        let b = random_bytes(20);
        assert_eq!(a.len(), 20);
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"123456", b"123456"));
        assert!(!constant_time_eq(b"123456", b"123457"));
        assert!(!constant_time_eq(b"123456", b"12345"));
        assert!(constant_time_eq(b"", b""));
    }
}
