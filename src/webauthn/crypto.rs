//! Random values for `WebAuthn` ceremonies

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::SecureRandom;

use crate::error::{MfaError, MfaResult};
use crate::models::UserId;

/// Challenge size in bytes (256 bits)
pub const CHALLENGE_SIZE: usize = 32;

/// Generate a secure random challenge
///
/// # Errors
///
/// Returns an error if the system RNG fails
pub fn generate_challenge() -> MfaResult<String> {
    let mut bytes = [0u8; CHALLENGE_SIZE];
    ring::rand::SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| MfaError::Internal("Failed to generate random challenge".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// User handle for the `user.id` member of registration options
///
/// Known users get a stable handle derived from their id; anonymous
/// registrations get a random 16-byte handle.
///
/// # Errors
///
/// Returns an error if the system RNG fails
pub fn generate_user_handle(user: Option<UserId>) -> MfaResult<String> {
    if let Some(user) = user {
        return Ok(URL_SAFE_NO_PAD.encode(user.as_bytes()));
    }

    let mut bytes = [0u8; 16];
    ring::rand::SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| MfaError::Internal("Failed to generate user handle".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_challenges_are_unique() {
        let a = generate_challenge().unwrap();
        let b = generate_challenge().unwrap();
        assert_ne!(a, b);
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), CHALLENGE_SIZE);
    }

    #[test]
    fn test_user_handle_is_stable_for_known_user() {
        let user = Uuid::new_v4();
        assert_eq!(
            generate_user_handle(Some(user)).unwrap(),
            generate_user_handle(Some(user)).unwrap()
        );
        assert_ne!(
            generate_user_handle(None).unwrap(),
            generate_user_handle(None).unwrap()
        );
    }
}
