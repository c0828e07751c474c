//! Stateless two-step `WebAuthn` ceremonies
//!
//! `begin_*` issues a challenge and returns it twice: inside the public
//! options for the browser, and inside a signed state token for the caller to
//! hand back to `complete_*`. Nothing is kept in memory between the two.

use chrono::Utc;
use std::sync::Arc;

use super::client_data::verify_client_data;
use super::crypto;
use super::types::{
    AuthenticationCredential, AuthenticationOptions, AuthenticatorSelectionCriteria, Ceremony,
    ChallengeState, PublicKeyCredentialDescriptor, PublicKeyCredentialParameters,
    RegistrationCredential, RegistrationOptions, RelyingParty, UserEntity,
};
use super::verifier::{Attestation, WebAuthnVerifier};
use crate::error::{MfaError, MfaResult};
use crate::models::{Authenticator, AuthenticatorData, UserId, WebAuthnCredentialData};
use crate::policy::EnrollmentPolicy;
use crate::settings::WebAuthnSettings;
use crate::state::SignedStateCodec;
use crate::utils::logging::LoggingHelper;

const ES256: i32 = -7;
const RS256: i32 = -257;

/// Issues and completes registration and authentication ceremonies
#[derive(Clone)]
pub struct ChallengeCoordinator {
    settings: WebAuthnSettings,
    signer: SignedStateCodec,
    verifier: Arc<dyn WebAuthnVerifier>,
}

impl ChallengeCoordinator {
    #[must_use]
    pub fn new(
        settings: WebAuthnSettings,
        signer: SignedStateCodec,
        verifier: Arc<dyn WebAuthnVerifier>,
    ) -> Self {
        Self {
            settings,
            signer,
            verifier,
        }
    }

    /// Start registering a new key
    ///
    /// `user` is `None` for an anonymous registration (e.g. signing up with a
    /// passkey). Existing credentials are not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails or the state cannot be signed
    pub fn begin_registration(
        &self,
        user: Option<UserId>,
        user_name: &str,
        display_name: &str,
    ) -> MfaResult<(RegistrationOptions, String)> {
        let challenge = crypto::generate_challenge()?;

        let options = RegistrationOptions {
            challenge: challenge.clone(),
            rp: RelyingParty {
                id: self.settings.rp_id.clone(),
                name: self.settings.rp_name.clone(),
            },
            user: UserEntity {
                id: crypto::generate_user_handle(user)?,
                name: user_name.to_string(),
                display_name: display_name.to_string(),
            },
            public_key_params: [ES256, RS256]
                .into_iter()
                .map(|alg| PublicKeyCredentialParameters {
                    r#type: "public-key".to_string(),
                    alg,
                })
                .collect(),
            timeout: self.timeout_millis(),
            attestation: "none".to_string(),
            authenticator_selection: AuthenticatorSelectionCriteria {
                authenticator_attachment: self.settings.authenticator_attachment.clone(),
                resident_key: "preferred".to_string(),
                require_resident_key: false,
                user_verification: self.settings.user_verification.clone(),
            },
        };

        let token = self.signer.sign(&ChallengeState {
            ceremony: Ceremony::Registration,
            challenge,
            user_id: user,
            credential_ids: Vec::new(),
            issued_at: Utc::now(),
        })?;

        Ok((options, token))
    }

    /// Finish registering a key
    ///
    /// # Errors
    ///
    /// * `TamperedState` if the token does not verify
    /// * `CredentialVerificationFailed` if the state belongs to another
    ///   ceremony or user, or the client data or attestation do not verify
    /// * `PasswordlessUnsupported` if `passwordless` was requested and the
    ///   authenticator did not verify the user
    pub fn complete_registration(
        &self,
        user: Option<UserId>,
        token: &str,
        credential: &RegistrationCredential,
        passwordless: bool,
    ) -> MfaResult<Attestation> {
        let state = self.open_state(token, Ceremony::Registration, user)?;

        verify_client_data(
            &credential.response.client_data_json,
            Ceremony::Registration.client_data_type(),
            &state.challenge,
            &self.settings.rp_origin,
        )?;

        let attestation = self.verifier.verify_registration(&state, credential)?;
        EnrollmentPolicy::check_passwordless(passwordless, &attestation)?;

        Ok(attestation)
    }

    /// Start authenticating with one of the user's enrolled keys
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails or the state cannot be signed
    pub fn begin_authentication(
        &self,
        user: UserId,
        enrolled: &[Authenticator],
    ) -> MfaResult<(AuthenticationOptions, String)> {
        let challenge = crypto::generate_challenge()?;
        let credential_ids: Vec<String> = enrolled
            .iter()
            .filter(|a| a.user_id == user)
            .filter_map(Authenticator::webauthn)
            .map(|c| c.credential_id.clone())
            .collect();

        let options = AuthenticationOptions {
            challenge: challenge.clone(),
            timeout: self.timeout_millis(),
            rp_id: self.settings.rp_id.clone(),
            allow_credentials: credential_ids
                .iter()
                .map(|id| PublicKeyCredentialDescriptor {
                    r#type: "public-key".to_string(),
                    id: id.clone(),
                })
                .collect(),
            user_verification: self.settings.user_verification.clone(),
        };

        let token = self.signer.sign(&ChallengeState {
            ceremony: Ceremony::Authentication,
            challenge,
            user_id: Some(user),
            credential_ids,
            issued_at: Utc::now(),
        })?;

        Ok((options, token))
    }

    /// Finish authenticating
    ///
    /// Only credentials named in the issued state and still enrolled may
    /// answer. Returns the matched authenticator with its new signature
    /// counter and usage time applied.
    ///
    /// # Errors
    ///
    /// * `TamperedState` if the token does not verify
    /// * `CredentialVerificationFailed` on any other rejection
    pub fn complete_authentication(
        &self,
        user: UserId,
        token: &str,
        enrolled: &[Authenticator],
        credential: &AuthenticationCredential,
    ) -> MfaResult<Authenticator> {
        let state = self.open_state(token, Ceremony::Authentication, Some(user))?;

        verify_client_data(
            &credential.response.client_data_json,
            Ceremony::Authentication.client_data_type(),
            &state.challenge,
            &self.settings.rp_origin,
        )?;

        let allowed: Vec<WebAuthnCredentialData> = enrolled
            .iter()
            .filter(|a| a.user_id == user)
            .filter_map(Authenticator::webauthn)
            .filter(|c| state.credential_ids.contains(&c.credential_id))
            .cloned()
            .collect();
        if !allowed.iter().any(|c| c.credential_id == credential.id) {
            log::debug!("Credential {} not allowed for this challenge", credential.id);
            return Err(MfaError::CredentialVerificationFailed);
        }

        let assertion = self
            .verifier
            .verify_authentication(&state, &allowed, credential)?;

        if !allowed.iter().any(|c| c.credential_id == assertion.credential_id) {
            log::warn!(
                "🚨 Verifier answered for credential {} outside the allowed set",
                assertion.credential_id
            );
            return Err(MfaError::CredentialVerificationFailed);
        }

        let mut matched = enrolled
            .iter()
            .filter(|a| a.user_id == user)
            .find(|a| {
                a.webauthn()
                    .is_some_and(|c| c.credential_id == assertion.credential_id)
            })
            .cloned()
            .ok_or(MfaError::CredentialVerificationFailed)?;

        if let AuthenticatorData::WebAuthn(stored) = &mut matched.data {
            if !counter_advanced(stored.sign_count, assertion.new_sign_count) {
                log::warn!(
                    "🚨 Signature counter did not advance for credential {} (stored {}, got {})",
                    stored.credential_id,
                    stored.sign_count,
                    assertion.new_sign_count
                );
                return Err(MfaError::CredentialVerificationFailed);
            }
            stored.sign_count = assertion.new_sign_count;
        }
        matched.last_used_at = Some(Utc::now());

        Ok(matched)
    }

    fn open_state(
        &self,
        token: &str,
        ceremony: Ceremony,
        user: Option<UserId>,
    ) -> MfaResult<ChallengeState> {
        let state: ChallengeState = self.signer.unsign(token).inspect_err(|_| {
            LoggingHelper::log_tampered_state("webauthn challenge");
        })?;

        if state.ceremony != ceremony {
            log::debug!("Challenge issued for {:?}, used for {ceremony:?}", state.ceremony);
            return Err(MfaError::CredentialVerificationFailed);
        }
        if state.user_id != user {
            log::debug!("Challenge issued for another user");
            return Err(MfaError::CredentialVerificationFailed);
        }

        Ok(state)
    }

    fn timeout_millis(&self) -> u32 {
        u32::try_from(self.settings.timeout_seconds.saturating_mul(1000)).unwrap_or(60_000)
    }
}

/// Counters must strictly increase, except that a device reporting 0 with a
/// stored 0 does not implement counters at all
fn counter_advanced(stored: u32, reported: u32) -> bool {
    (stored == 0 && reported == 0) || reported > stored
}
