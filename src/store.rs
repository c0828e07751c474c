//! Storage interface for authenticator records and email status
//!
//! Persistence lives outside this crate. Implementations are expected to
//! return authenticators in enrollment order.

use crate::error::StoreError;
use crate::models::{Authenticator, AuthenticatorData, AuthenticatorId, AuthenticatorType, UserId};

/// Authenticator and email-verification storage
pub trait AuthenticatorStore: Send + Sync {
    /// List a user's authenticators, skipping the given types
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    fn find_authenticators(
        &self,
        user: UserId,
        excluding: &[AuthenticatorType],
    ) -> Result<Vec<Authenticator>, StoreError>;

    /// `true` when none of the user's email addresses is unverified
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    fn email_is_verified(&self, user: UserId) -> Result<bool, StoreError>;

    /// Persist a newly enrolled authenticator
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written
    fn create_authenticator(
        &self,
        user: UserId,
        data: AuthenticatorData,
    ) -> Result<Authenticator, StoreError>;

    /// Remove an authenticator
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed
    fn delete_authenticator(&self, id: AuthenticatorId) -> Result<(), StoreError>;

    /// Record a successful use, optionally with the new `WebAuthn` signature counter
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be updated
    fn record_usage(&self, id: AuthenticatorId, sign_count: Option<u32>) -> Result<(), StoreError>;
}
