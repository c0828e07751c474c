//! Error types for MFA operations
//!
//! Every failure in this crate is an expected outcome that the caller maps to
//! user guidance. Nothing here is fatal to the process.

use thiserror::Error;

use crate::totp::TotpSecret;

/// Errors returned by enrollment and verification operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MfaError {
    /// A signed or sealed token failed verification or could not be decoded
    #[error("Tampered form")]
    TamperedState,

    /// The submitted code did not match any authenticator
    #[error("Incorrect code")]
    IncorrectCode,

    /// The per-user attempt budget is exhausted
    #[error("Too many failed attempts, try again later")]
    TooManyAttempts,

    /// Activation requires every email address to be verified first
    #[error("You cannot activate two-factor authentication until you have verified your email address")]
    UnverifiedEmail,

    /// `WebAuthn` challenge or signature check failed
    #[error("Credential verification failed")]
    CredentialVerificationFailed,

    /// The device cannot perform the user verification passwordless sign-in requires
    #[error("This key does not support passwordless operation")]
    PasswordlessUnsupported,

    /// Deletion rejected by policy
    #[error("You cannot deactivate this authenticator")]
    CannotDeleteAuthenticator,

    /// The authenticator store reported a failure
    #[error("Store error: {0}")]
    Store(String),

    /// Local fault (RNG, cipher, encoding)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MfaError {
    /// Whether the failure should be recorded as a security event by the caller
    #[must_use]
    pub fn is_security_event(&self) -> bool {
        matches!(self, MfaError::TamperedState)
    }

    /// Whether the user can retry immediately with different input
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MfaError::IncorrectCode | MfaError::CredentialVerificationFailed
        )
    }
}

/// Failure reported by an [`AuthenticatorStore`](crate::store::AuthenticatorStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<StoreError> for MfaError {
    fn from(err: StoreError) -> Self {
        MfaError::Store(err.0)
    }
}

/// Failed TOTP activation together with the secret to show next
///
/// Activation always regenerates the pending secret on failure, so the
/// caller must redisplay `secret` rather than the one it showed before.
/// `secret` is `None` only when no secret could be produced at all.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct TotpActivationError {
    pub error: MfaError,
    pub secret: Option<TotpSecret>,
}

/// Result type for MFA operations
pub type MfaResult<T> = Result<T, MfaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_tampered_state_is_security_event() {
        assert!(MfaError::TamperedState.is_security_event());
        assert!(!MfaError::IncorrectCode.is_security_event());
        assert!(!MfaError::TooManyAttempts.is_security_event());
        assert!(!MfaError::CredentialVerificationFailed.is_security_event());
    }

    #[test]
    fn test_retry_guidance_differs_for_rate_limit() {
        assert!(MfaError::IncorrectCode.is_retryable());
        assert!(!MfaError::TooManyAttempts.is_retryable());
        assert!(!MfaError::PasswordlessUnsupported.is_retryable());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: MfaError = StoreError("connection reset".to_string()).into();
        assert_eq!(err, MfaError::Store("connection reset".to_string()));
        assert_eq!(err.to_string(), "Store error: connection reset");
    }
}
