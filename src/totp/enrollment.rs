//! Pending-secret lifecycle during TOTP setup
//!
//! Until activation the secret lives only in a sealed token that the caller
//! keeps in its form or session. Any failed attempt replaces it, so a code
//! guessed during setup is useless against the secret shown next.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::validator::TotpValidator;
use crate::error::{MfaError, MfaResult, TotpActivationError};
use crate::state::SealedStateCodec;
use crate::utils::logging::LoggingHelper;

/// A TOTP secret offered for activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpSecret {
    /// Base32-encoded secret to display
    pub secret: String,
    /// Whether this secret was just generated and must be (re)displayed
    pub regenerated: bool,
    /// Sealed pending state to hand back on the next step
    pub token: String,
}

/// Sealed payload of a pending secret
#[derive(Serialize, Deserialize)]
struct PendingSecret {
    secret: String,
    issued_at: DateTime<Utc>,
}

/// Issues, keeps and checks the pending secret of a TOTP setup
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    validator: TotpValidator,
    sealer: SealedStateCodec,
    ttl: Duration,
}

impl TotpEnrollment {
    #[must_use]
    pub fn new(validator: TotpValidator, sealer: SealedStateCodec, ttl: Duration) -> Self {
        Self {
            validator,
            sealer,
            ttl,
        }
    }

    #[must_use]
    pub fn validator(&self) -> &TotpValidator {
        &self.validator
    }

    /// Return the pending secret, or a new one
    ///
    /// A new secret is generated when `regenerate` is set, when no pending
    /// token is given, or when the token is expired or fails to unseal.
    ///
    /// # Errors
    ///
    /// Returns an error if the new secret cannot be sealed
    pub fn get_secret(&self, regenerate: bool, pending: Option<&str>) -> MfaResult<TotpSecret> {
        if !regenerate {
            if let Some(token) = pending {
                match self.open_pending(token) {
                    Ok(secret) => {
                        return Ok(TotpSecret {
                            secret,
                            regenerated: false,
                            token: token.to_string(),
                        })
                    }
                    Err(e) => LoggingHelper::log_secret_regenerated(&e.to_string()),
                }
            }
        }

        self.generate()
    }

    /// Check `code` against the pending secret
    ///
    /// # Errors
    ///
    /// Returns `IncorrectCode` with a freshly generated secret on mismatch
    pub fn validate(&self, pending: &TotpSecret, code: &str) -> Result<(), TotpActivationError> {
        if self.validator.validate_code(&pending.secret, code) {
            Ok(())
        } else {
            Err(self.reject(pending, MfaError::IncorrectCode))
        }
    }

    /// Fail an activation attempt, replacing the pending secret
    ///
    /// If a replacement cannot be produced the previous secret is kept and
    /// the error becomes the internal fault.
    #[must_use]
    pub fn reject(&self, pending: &TotpSecret, error: MfaError) -> TotpActivationError {
        LoggingHelper::log_secret_regenerated(&error.to_string());
        match self.generate() {
            Ok(secret) => TotpActivationError {
                error,
                secret: Some(secret),
            },
            Err(fault) => TotpActivationError {
                error: fault,
                secret: Some(pending.clone()),
            },
        }
    }

    /// `otpauth://` URI for the pending secret
    ///
    /// # Errors
    ///
    /// Returns an error if the account name is not usable in the URI
    pub fn provisioning_uri(&self, pending: &TotpSecret, account: &str) -> MfaResult<String> {
        self.validator.provisioning_uri(&pending.secret, account)
    }

    fn generate(&self) -> MfaResult<TotpSecret> {
        let secret = TotpValidator::generate_secret();
        let token = self.sealer.seal(&PendingSecret {
            secret: secret.clone(),
            issued_at: Utc::now(),
        })?;

        Ok(TotpSecret {
            secret,
            regenerated: true,
            token,
        })
    }

    fn open_pending(&self, token: &str) -> MfaResult<String> {
        let pending: PendingSecret = self.sealer.open(token)?;
        if Utc::now() - pending.issued_at > self.ttl {
            return Err(MfaError::TamperedState);
        }
        Ok(pending.secret)
    }
}
