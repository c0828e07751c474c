//! Interface to the external `WebAuthn` signature verifier
//!
//! Attestation statement formats, COSE keys and signature checks are the
//! verifier's business. The coordinator hands it a state whose signature and
//! client data it has already checked.

use thiserror::Error;

use super::types::{AuthenticationCredential, ChallengeState, RegistrationCredential};
use crate::error::MfaError;
use crate::models::WebAuthnCredentialData;

/// Verifier rejection; the detail is logged, never shown
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Verification failed: {0}")]
    Failed(String),
}

impl From<VerificationError> for MfaError {
    fn from(err: VerificationError) -> Self {
        log::debug!("WebAuthn verification rejected: {err}");
        MfaError::CredentialVerificationFailed
    }
}

/// Verified registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub credential_id: String, // Base64URL-encoded credential ID
    pub public_key: Vec<u8>,   // COSE-encoded public key
    pub sign_count: u32,
    pub user_verified: bool, // UV flag from the authenticator data
}

impl Attestation {
    #[must_use]
    pub fn is_user_verified(&self) -> bool {
        self.user_verified
    }

    /// Stored form of the new credential
    #[must_use]
    pub fn into_credential_data(
        self,
        passwordless: bool,
        name: Option<String>,
    ) -> WebAuthnCredentialData {
        WebAuthnCredentialData {
            credential_id: self.credential_id,
            public_key: self.public_key,
            sign_count: self.sign_count,
            passwordless,
            name,
        }
    }
}

/// Verified assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub credential_id: String,
    pub new_sign_count: u32,
    pub user_verified: bool,
}

/// Cryptographic verification of `WebAuthn` responses
pub trait WebAuthnVerifier: Send + Sync {
    /// Verify an attestation against the issued challenge
    ///
    /// # Errors
    ///
    /// Returns an error if the attestation does not verify
    fn verify_registration(
        &self,
        state: &ChallengeState,
        credential: &RegistrationCredential,
    ) -> Result<Attestation, VerificationError>;

    /// Verify an assertion made by one of `allowed` against the issued challenge
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is not allowed or the signature
    /// does not verify
    fn verify_authentication(
        &self,
        state: &ChallengeState,
        allowed: &[WebAuthnCredentialData],
        credential: &AuthenticationCredential,
    ) -> Result<AssertionResult, VerificationError>;
}
