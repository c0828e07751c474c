//! Preconditions for adding and removing authenticators

use std::sync::Arc;

use crate::error::{MfaError, MfaResult};
use crate::models::{Authenticator, UserId};
use crate::store::AuthenticatorStore;
use crate::webauthn::Attestation;

/// Decides whether an authenticator may be removed
pub trait DeletionRule: Send + Sync {
    /// `enrolled` is every authenticator the owner has, `candidate` included
    fn can_delete(&self, candidate: &Authenticator, enrolled: &[Authenticator]) -> bool;
}

/// Keeps at least one authenticator when MFA is mandatory
#[derive(Debug, Clone, Copy, Default)]
pub struct MandatoryMfaRule {
    pub mandatory: bool,
}

impl DeletionRule for MandatoryMfaRule {
    fn can_delete(&self, candidate: &Authenticator, enrolled: &[Authenticator]) -> bool {
        !self.mandatory || enrolled.iter().any(|other| other.id != candidate.id)
    }
}

/// Gatekeeper for enrollment transitions
#[derive(Clone)]
pub struct EnrollmentPolicy {
    store: Arc<dyn AuthenticatorStore>,
    deletion_rule: Arc<dyn DeletionRule>,
}

impl EnrollmentPolicy {
    #[must_use]
    pub fn new(store: Arc<dyn AuthenticatorStore>, deletion_rule: Arc<dyn DeletionRule>) -> Self {
        Self {
            store,
            deletion_rule,
        }
    }

    /// TOTP activation requires every email address to be verified
    ///
    /// # Errors
    ///
    /// Returns `UnverifiedEmail` if any address is unverified
    pub fn can_activate_totp(&self, user: UserId) -> MfaResult<()> {
        if self.store.email_is_verified(user)? {
            Ok(())
        } else {
            Err(MfaError::UnverifiedEmail)
        }
    }

    /// # Errors
    ///
    /// Returns `CannotDeleteAuthenticator` if the deletion rule refuses
    pub fn can_delete_authenticator(&self, authenticator: &Authenticator) -> MfaResult<()> {
        let enrolled = self.store.find_authenticators(authenticator.user_id, &[])?;
        if self.deletion_rule.can_delete(authenticator, &enrolled) {
            Ok(())
        } else {
            Err(MfaError::CannotDeleteAuthenticator)
        }
    }

    /// A passwordless key must have verified the user (biometric or PIN)
    ///
    /// # Errors
    ///
    /// Returns `PasswordlessUnsupported` when passwordless was requested but
    /// the attestation lacks user verification
    pub fn check_passwordless(passwordless: bool, attestation: &Attestation) -> MfaResult<()> {
        if passwordless && !attestation.is_user_verified() {
            return Err(MfaError::PasswordlessUnsupported);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthenticatorData;
    use crate::testing::InMemoryStore;
    use uuid::Uuid;

    fn totp() -> AuthenticatorData {
        AuthenticatorData::Totp {
            secret: "JBSWY3DPEHPK3PXP".to_string(),
        }
    }

    fn attestation(user_verified: bool) -> Attestation {
        Attestation {
            credential_id: "cred".to_string(),
            public_key: vec![1, 2, 3],
            sign_count: 0,
            user_verified,
        }
    }

    #[test]
    fn test_can_activate_totp_follows_email_status() {
        let store = Arc::new(InMemoryStore::new());
        let policy = EnrollmentPolicy::new(store.clone(), Arc::new(MandatoryMfaRule::default()));
        let user = Uuid::new_v4();

        store.set_email_verified(user, false);
        assert_eq!(policy.can_activate_totp(user), Err(MfaError::UnverifiedEmail));

        store.set_email_verified(user, true);
        assert!(policy.can_activate_totp(user).is_ok());
    }

    #[test]
    fn test_mandatory_mfa_keeps_last_authenticator() {
        let store = Arc::new(InMemoryStore::new());
        let policy = EnrollmentPolicy::new(
            store.clone(),
            Arc::new(MandatoryMfaRule { mandatory: true }),
        );
        let user = Uuid::new_v4();

        let first = store.create_authenticator(user, totp()).unwrap();
        assert_eq!(
            policy.can_delete_authenticator(&first),
            Err(MfaError::CannotDeleteAuthenticator)
        );

        store.create_authenticator(user, totp()).unwrap();
        assert!(policy.can_delete_authenticator(&first).is_ok());
    }

    #[test]
    fn test_optional_mfa_allows_deleting_last() {
        let store = Arc::new(InMemoryStore::new());
        let policy = EnrollmentPolicy::new(store.clone(), Arc::new(MandatoryMfaRule::default()));
        let only = store.create_authenticator(Uuid::new_v4(), totp()).unwrap();

        assert!(policy.can_delete_authenticator(&only).is_ok());
    }

    #[test]
    fn test_passwordless_requires_user_verification() {
        assert_eq!(
            EnrollmentPolicy::check_passwordless(true, &attestation(false)),
            Err(MfaError::PasswordlessUnsupported)
        );
        assert!(EnrollmentPolicy::check_passwordless(true, &attestation(true)).is_ok());
        assert!(EnrollmentPolicy::check_passwordless(false, &attestation(false)).is_ok());
    }
}
