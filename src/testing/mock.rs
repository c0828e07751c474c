//! Fake implementations of the external collaborators
//!
//! All fakes are thread-safe and keep their state in memory.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{MfaError, MfaResult, StoreError};
use crate::models::{
    Authenticator, AuthenticatorData, AuthenticatorId, AuthenticatorType, UserId,
    WebAuthnCredentialData,
};
use crate::otp::OtpMailer;
use crate::store::AuthenticatorStore;
use crate::webauthn::{
    AssertionResult, Attestation, AuthenticationCredential, ChallengeState,
    RegistrationCredential, VerificationError, WebAuthnVerifier,
};

/// Offset of the flags byte in authenticator data (after the RP ID hash)
const FLAGS_OFFSET: usize = 32;
/// User-verified flag
const FLAG_UV: u8 = 0x04;

/// Authenticator store backed by a `Vec`, in insertion order
///
/// Every `find_authenticators` call is counted, so tests can assert that a
/// code path never looked anything up.
#[derive(Default)]
pub struct InMemoryStore {
    authenticators: Mutex<Vec<Authenticator>>,
    unverified_emails: Mutex<HashSet<UserId>>,
    lookups: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing record as-is
    pub fn insert(&self, authenticator: Authenticator) {
        self.authenticators.lock().push(authenticator);
    }

    #[must_use]
    pub fn get(&self, id: AuthenticatorId) -> Option<Authenticator> {
        self.authenticators.lock().iter().find(|a| a.id == id).cloned()
    }

    /// Every record belonging to `user`
    #[must_use]
    pub fn all_for(&self, user: UserId) -> Vec<Authenticator> {
        self.authenticators
            .lock()
            .iter()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect()
    }

    /// Users start verified; this marks them as having an unverified address
    pub fn set_email_verified(&self, user: UserId, verified: bool) {
        let mut unverified = self.unverified_emails.lock();
        if verified {
            unverified.remove(&user);
        } else {
            unverified.insert(user);
        }
    }

    /// Number of `find_authenticators` calls so far
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make reads fail with a store error
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make writes fail with a store error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError("store unavailable".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl AuthenticatorStore for InMemoryStore {
    fn find_authenticators(
        &self,
        user: UserId,
        excluding: &[AuthenticatorType],
    ) -> Result<Vec<Authenticator>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        Ok(self
            .authenticators
            .lock()
            .iter()
            .filter(|a| a.user_id == user && !excluding.contains(&a.kind()))
            .cloned()
            .collect())
    }

    fn email_is_verified(&self, user: UserId) -> Result<bool, StoreError> {
        self.check_reads()?;
        Ok(!self.unverified_emails.lock().contains(&user))
    }

    fn create_authenticator(
        &self,
        user: UserId,
        data: AuthenticatorData,
    ) -> Result<Authenticator, StoreError> {
        self.check_writes()?;
        let authenticator = Authenticator::new(user, data);
        self.insert(authenticator.clone());
        Ok(authenticator)
    }

    fn delete_authenticator(&self, id: AuthenticatorId) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut authenticators = self.authenticators.lock();
        let before = authenticators.len();
        authenticators.retain(|a| a.id != id);

        if authenticators.len() == before {
            return Err(StoreError(format!("authenticator {id} not found")));
        }
        Ok(())
    }

    fn record_usage(&self, id: AuthenticatorId, sign_count: Option<u32>) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut authenticators = self.authenticators.lock();
        let authenticator = authenticators
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError(format!("authenticator {id} not found")))?;

        authenticator.last_used_at = Some(Utc::now());
        if let (Some(count), AuthenticatorData::WebAuthn(credential)) =
            (sign_count, &mut authenticator.data)
        {
            credential.sign_count = count;
        }
        Ok(())
    }
}

/// Verifier that trusts signatures but checks the challenge and allow list
///
/// Reads the signature counter and UV flag from the assertion's
/// authenticator data the way a real verifier would.
#[derive(Debug, Clone)]
pub struct FakeVerifier {
    user_verified: bool,
    reject: bool,
}

impl Default for FakeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_verified: true,
            reject: false,
        }
    }

    /// Attestations report no user verification
    #[must_use]
    pub fn without_user_verification(mut self) -> Self {
        self.user_verified = false;
        self
    }

    /// Every signature is rejected
    #[must_use]
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    fn check(
        &self,
        state: &ChallengeState,
        client_data_json: &str,
    ) -> Result<(), VerificationError> {
        if self.reject {
            return Err(VerificationError::Failed("Bad signature".to_string()));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(client_data_json)
            .map_err(|e| VerificationError::Encoding(e.to_string()))?;
        let client_data: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| VerificationError::Encoding(e.to_string()))?;

        if client_data["challenge"].as_str() != Some(state.challenge.as_str()) {
            return Err(VerificationError::Failed("Challenge mismatch".to_string()));
        }
        Ok(())
    }
}

impl WebAuthnVerifier for FakeVerifier {
    fn verify_registration(
        &self,
        state: &ChallengeState,
        credential: &RegistrationCredential,
    ) -> Result<Attestation, VerificationError> {
        self.check(state, &credential.response.client_data_json)?;

        Ok(Attestation {
            credential_id: credential.id.clone(),
            public_key: format!("cose-key-{}", credential.id).into_bytes(),
            sign_count: 0,
            user_verified: self.user_verified,
        })
    }

    fn verify_authentication(
        &self,
        state: &ChallengeState,
        allowed: &[WebAuthnCredentialData],
        credential: &AuthenticationCredential,
    ) -> Result<AssertionResult, VerificationError> {
        self.check(state, &credential.response.client_data_json)?;

        if !allowed.iter().any(|c| c.credential_id == credential.id) {
            return Err(VerificationError::Failed("Unknown credential".to_string()));
        }

        let auth_data = URL_SAFE_NO_PAD
            .decode(&credential.response.authenticator_data)
            .map_err(|e| VerificationError::Encoding(e.to_string()))?;
        let Some(counter) = auth_data.get(FLAGS_OFFSET + 1..FLAGS_OFFSET + 5) else {
            return Err(VerificationError::Encoding("Authenticator data too short".to_string()));
        };
        let mut count = [0u8; 4];
        count.copy_from_slice(counter);

        Ok(AssertionResult {
            credential_id: credential.id.clone(),
            new_sign_count: u32::from_be_bytes(count),
            user_verified: auth_data[FLAGS_OFFSET] & FLAG_UV != 0,
        })
    }
}

/// Mailer that keeps what it was asked to send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last (email, code) pair sent
    #[must_use]
    pub fn last(&self) -> Option<(String, String)> {
        self.sent.lock().last().cloned()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl OtpMailer for RecordingMailer {
    fn send_otp(&self, email: &str, code: &str) -> MfaResult<()> {
        if email.is_empty() {
            return Err(MfaError::Internal("No email address".to_string()));
        }
        self.sent.lock().push((email.to_string(), code.to_string()));
        Ok(())
    }
}
