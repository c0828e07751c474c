//! Authenticator records as handed out by the store
//!
//! The store owns these records; this crate only holds them for the length of
//! one verification or enrollment attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::totp::TotpValidator;

/// Identifier of an account
pub type UserId = Uuid;

/// Identifier of a stored authenticator
pub type AuthenticatorId = Uuid;

/// Authenticator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorType {
    Totp,
    WebAuthn,
}

/// Type-specific secret or public-key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticatorData {
    /// Base32-encoded shared secret
    Totp { secret: String },
    WebAuthn(WebAuthnCredentialData),
}

/// Stored `WebAuthn` credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthnCredentialData {
    pub credential_id: String, // Base64URL-encoded credential ID
    pub public_key: Vec<u8>,   // COSE-encoded public key
    pub sign_count: u32,       // Last accepted signature counter
    pub passwordless: bool,    // Registered with verified user presence
    pub name: Option<String>,  // User-friendly credential name
}

/// An enrolled authenticator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    pub id: AuthenticatorId,
    pub user_id: UserId,
    pub data: AuthenticatorData,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl AuthenticatorData {
    #[must_use]
    pub fn kind(&self) -> AuthenticatorType {
        match self {
            AuthenticatorData::Totp { .. } => AuthenticatorType::Totp,
            AuthenticatorData::WebAuthn(_) => AuthenticatorType::WebAuthn,
        }
    }
}

impl Authenticator {
    /// Create a record for a freshly enrolled authenticator
    #[must_use]
    pub fn new(user_id: UserId, data: AuthenticatorData) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            data,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> AuthenticatorType {
        self.data.kind()
    }

    /// Check a submitted code against this authenticator at `unix_time`
    ///
    /// Only code-based authenticators can match; a `WebAuthn` key never does.
    #[must_use]
    pub fn validate_code_at(&self, validator: &TotpValidator, code: &str, unix_time: u64) -> bool {
        match &self.data {
            AuthenticatorData::Totp { secret } => {
                validator.validate_code_at(secret, code, unix_time)
            }
            AuthenticatorData::WebAuthn(_) => false,
        }
    }

    /// The `WebAuthn` credential, if this is a `WebAuthn` authenticator
    #[must_use]
    pub fn webauthn(&self) -> Option<&WebAuthnCredentialData> {
        match &self.data {
            AuthenticatorData::WebAuthn(credential) => Some(credential),
            AuthenticatorData::Totp { .. } => None,
        }
    }
}
