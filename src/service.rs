//! Entry point tying the components to one configuration
//!
//! `MfaService` is what a web handler holds. Each method is one request-sized
//! step and takes the user identity explicitly.

use std::sync::Arc;

use crate::error::{MfaError, MfaResult, TotpActivationError};
use crate::models::{Authenticator, AuthenticatorData, AuthenticatorId, AuthenticatorType, UserId};
use crate::otp::{EmailOtp, OtpMailer};
use crate::policy::{DeletionRule, EnrollmentPolicy, MandatoryMfaRule};
use crate::ratelimit::{RateLimitBackend, RateLimiter};
use crate::selector::{AuthenticatorSelector, VerificationVerdict};
use crate::settings::MfaSettings;
use crate::stage::{AuthenticateStage, LoginStep};
use crate::state::{
    SealedStateCodec, SignedStateCodec, CHALLENGE_STATE_SALT, EMAIL_OTP_SALT, TOTP_PENDING_SALT,
};
use crate::store::AuthenticatorStore;
use crate::totp::{TotpEnrollment, TotpSecret, TotpValidator};
use crate::utils::logging::LoggingHelper;
use crate::webauthn::{
    AuthenticationCredential, AuthenticationOptions, ChallengeCoordinator, RegistrationCredential,
    RegistrationOptions, WebAuthnVerifier,
};

/// MFA enrollment and verification for one relying party
#[derive(Clone)]
pub struct MfaService {
    store: Arc<dyn AuthenticatorStore>,
    limiter: RateLimiter,
    selector: AuthenticatorSelector,
    enrollment: TotpEnrollment,
    coordinator: ChallengeCoordinator,
    policy: EnrollmentPolicy,
    email_otp: Option<EmailOtp>,
    stage: AuthenticateStage,
}

impl MfaService {
    /// Build the service from settings and its external collaborators
    ///
    /// Email codes are enabled when `policy.email_otp` is set and a mailer
    /// is given. The deletion rule follows `policy.mfa_mandatory`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail [`MfaSettings::validate`] or key
    /// derivation fails
    pub fn new(
        settings: &MfaSettings,
        store: Arc<dyn AuthenticatorStore>,
        verifier: Arc<dyn WebAuthnVerifier>,
        rate_limit_backend: Arc<dyn RateLimitBackend>,
        mailer: Option<Arc<dyn OtpMailer>>,
    ) -> MfaResult<Self> {
        settings
            .validate()
            .map_err(|e| MfaError::Internal(format!("Invalid settings: {e:#}")))?;

        let secret = settings.signing_secret();
        let validator = TotpValidator::new(&settings.totp);
        let limiter = RateLimiter::new(rate_limit_backend);

        let email_otp = match (settings.policy.email_otp, mailer) {
            (true, Some(mailer)) => Some(EmailOtp::new(
                SealedStateCodec::new(secret, EMAIL_OTP_SALT)?,
                settings.policy.email_otp_ttl()?,
                mailer,
            )),
            (true, None) => {
                log::warn!("⚠️  Email OTP enabled but no mailer configured, disabling");
                None
            }
            (false, _) => None,
        };

        Ok(Self {
            selector: AuthenticatorSelector::new(store.clone(), limiter.clone(), validator.clone()),
            enrollment: TotpEnrollment::new(
                validator,
                SealedStateCodec::new(secret, TOTP_PENDING_SALT)?,
                settings.totp.pending_secret_ttl()?,
            ),
            coordinator: ChallengeCoordinator::new(
                settings.webauthn.clone(),
                SignedStateCodec::new(secret, CHALLENGE_STATE_SALT)?,
                verifier,
            ),
            policy: EnrollmentPolicy::new(
                store.clone(),
                Arc::new(MandatoryMfaRule {
                    mandatory: settings.policy.mfa_mandatory,
                }),
            ),
            stage: AuthenticateStage::new(store.clone(), email_otp.clone()),
            email_otp,
            limiter,
            store,
        })
    }

    /// Replace the deletion rule
    #[must_use]
    pub fn with_deletion_rule(mut self, rule: Arc<dyn DeletionRule>) -> Self {
        self.policy = EnrollmentPolicy::new(self.store.clone(), rule);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &EnrollmentPolicy {
        &self.policy
    }

    #[must_use]
    pub fn totp_validator(&self) -> &TotpValidator {
        self.enrollment.validator()
    }

    /// Verify a code from one of the user's code-based authenticators
    pub fn authenticate(&self, user: UserId, code: &str) -> VerificationVerdict {
        self.selector.authenticate(user, code)
    }

    /// Secret to show during TOTP setup
    ///
    /// # Errors
    ///
    /// Returns an error if a new secret cannot be sealed
    pub fn begin_totp_activation(
        &self,
        pending_token: Option<&str>,
        regenerate: bool,
    ) -> MfaResult<TotpSecret> {
        self.enrollment.get_secret(regenerate, pending_token)
    }

    /// # Errors
    ///
    /// Returns an error if the account name is not usable in the URI
    pub fn totp_provisioning_uri(&self, pending: &TotpSecret, account: &str) -> MfaResult<String> {
        self.enrollment.provisioning_uri(pending, account)
    }

    /// Confirm TOTP setup with a code from the user's app
    ///
    /// # Errors
    ///
    /// Every failure carries a freshly generated secret to display next:
    /// * `UnverifiedEmail` if the user has an unverified address
    /// * `IncorrectCode` if the code does not match, or the pending secret
    ///   expired
    pub fn activate_totp(
        &self,
        user: UserId,
        pending_token: &str,
        code: &str,
    ) -> Result<Authenticator, TotpActivationError> {
        let pending = self
            .enrollment
            .get_secret(false, Some(pending_token))
            .map_err(|error| TotpActivationError {
                error,
                secret: None,
            })?;
        if let Err(error) = self.policy.can_activate_totp(user) {
            if pending.regenerated {
                return Err(TotpActivationError {
                    error,
                    secret: Some(pending),
                });
            }
            return Err(self.enrollment.reject(&pending, error));
        }
        if pending.regenerated {
            // The code was computed for a secret that is gone
            return Err(TotpActivationError {
                error: MfaError::IncorrectCode,
                secret: Some(pending),
            });
        }
        self.enrollment.validate(&pending, code)?;

        let authenticator = self
            .store
            .create_authenticator(
                user,
                AuthenticatorData::Totp {
                    secret: pending.secret.clone(),
                },
            )
            .map_err(|e| self.enrollment.reject(&pending, e.into()))?;

        LoggingHelper::log_enrolled(&authenticator);
        Ok(authenticator)
    }

    /// Remove one of the user's authenticators
    ///
    /// # Errors
    ///
    /// Returns `CannotDeleteAuthenticator` if it is not the user's or the
    /// deletion rule refuses
    pub fn deactivate_authenticator(&self, user: UserId, id: AuthenticatorId) -> MfaResult<()> {
        let authenticator = self
            .store
            .find_authenticators(user, &[])?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or(MfaError::CannotDeleteAuthenticator)?;

        self.policy.can_delete_authenticator(&authenticator)?;
        self.store.delete_authenticator(id)?;

        LoggingHelper::log_deleted(&authenticator);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the challenge cannot be issued
    pub fn begin_webauthn_registration(
        &self,
        user: Option<UserId>,
        user_name: &str,
        display_name: &str,
    ) -> MfaResult<(RegistrationOptions, String)> {
        self.coordinator
            .begin_registration(user, user_name, display_name)
    }

    /// Complete registration and store the new key
    ///
    /// # Errors
    ///
    /// See [`ChallengeCoordinator::complete_registration`]
    pub fn add_webauthn(
        &self,
        user: UserId,
        token: &str,
        credential: &RegistrationCredential,
        name: Option<String>,
        passwordless: bool,
    ) -> MfaResult<Authenticator> {
        let attestation = self
            .coordinator
            .complete_registration(Some(user), token, credential, passwordless)
            .inspect_err(|e| LoggingHelper::log_failure("webauthn registration", Some(user), e))?;

        let authenticator = self.store.create_authenticator(
            user,
            AuthenticatorData::WebAuthn(attestation.into_credential_data(passwordless, name)),
        )?;

        LoggingHelper::log_enrolled(&authenticator);
        Ok(authenticator)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the challenge cannot
    /// be issued
    pub fn begin_webauthn_authentication(
        &self,
        user: UserId,
    ) -> MfaResult<(AuthenticationOptions, String)> {
        let enrolled = self
            .store
            .find_authenticators(user, &[AuthenticatorType::Totp])?;
        self.coordinator.begin_authentication(user, &enrolled)
    }

    /// Verify an assertion and record the new signature counter
    pub fn complete_webauthn_authentication(
        &self,
        user: UserId,
        token: &str,
        credential: &AuthenticationCredential,
    ) -> VerificationVerdict {
        let enrolled = self
            .store
            .find_authenticators(user, &[AuthenticatorType::Totp])?;
        let matched = self
            .coordinator
            .complete_authentication(user, token, &enrolled, credential)
            .inspect_err(|e| LoggingHelper::log_failure("webauthn authentication", Some(user), e))?;

        let sign_count = matched.webauthn().map(|c| c.sign_count);
        self.store.record_usage(matched.id, sign_count)?;

        LoggingHelper::log_authenticated(&matched);
        Ok(matched)
    }

    /// Decide the second-factor step after a password login
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the code cannot be sent
    pub fn login_stage(&self, user: UserId, email: &str) -> MfaResult<LoginStep> {
        self.stage.handle(user, email)
    }

    /// Check an emailed login code, under the same budget as other codes
    ///
    /// # Errors
    ///
    /// * `TooManyAttempts` once the budget is exhausted
    /// * `TamperedState` or `IncorrectCode` from the code check
    /// * `Internal` if email codes are disabled
    pub fn verify_email_otp(&self, user: UserId, token: &str, code: &str) -> MfaResult<()> {
        let Some(email_otp) = &self.email_otp else {
            return Err(MfaError::Internal("Email OTP is not enabled".to_string()));
        };

        if !self.limiter.consume(user) {
            LoggingHelper::log_rate_limited(user);
            return Err(MfaError::TooManyAttempts);
        }

        email_otp.verify(token, user, code)?;
        self.limiter.clear(user);
        Ok(())
    }
}
