//! One-time codes sent by email
//!
//! Used at login for accounts without an enrolled authenticator. The code
//! travels sealed in a token bound to the user, so nothing is kept
//! server-side between sending and checking.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{MfaError, MfaResult};
use crate::models::UserId;
use crate::state::SealedStateCodec;
use crate::utils::crypto::constant_time_eq;
use crate::utils::logging::LoggingHelper;

/// Number of digits in an emailed code
pub const OTP_DIGITS: usize = 6;

/// Delivers one-time codes
pub trait OtpMailer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the message cannot be handed off
    fn send_otp(&self, email: &str, code: &str) -> MfaResult<()>;
}

#[derive(Serialize, Deserialize)]
struct PendingOtp {
    code: String,
    user: UserId,
    issued_at: DateTime<Utc>,
}

/// Random `OTP_DIGITS`-digit code, zero padded
#[must_use]
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_DIGITS)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Issues and checks emailed codes
#[derive(Clone)]
pub struct EmailOtp {
    sealer: SealedStateCodec,
    ttl: Duration,
    mailer: Arc<dyn OtpMailer>,
}

impl EmailOtp {
    #[must_use]
    pub fn new(sealer: SealedStateCodec, ttl: Duration, mailer: Arc<dyn OtpMailer>) -> Self {
        Self { sealer, ttl, mailer }
    }

    /// Mail a fresh code to `email` and return the token to check it against
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be sealed or the mailer fails
    pub fn send(&self, user: UserId, email: &str) -> MfaResult<String> {
        let code = generate_otp();
        let token = self.sealer.seal(&PendingOtp {
            code: code.clone(),
            user,
            issued_at: Utc::now(),
        })?;

        self.mailer.send_otp(email, &code)?;
        log::info!("📧 Sent login code to user {user}");

        Ok(token)
    }

    /// Check `code` against a token from [`EmailOtp::send`]
    ///
    /// # Errors
    ///
    /// * `TamperedState` if the token does not open or belongs to another user
    /// * `IncorrectCode` if the code is wrong or has expired
    pub fn verify(&self, token: &str, user: UserId, code: &str) -> MfaResult<()> {
        let pending: PendingOtp = self.sealer.open(token).inspect_err(|_| {
            LoggingHelper::log_tampered_state("email code");
        })?;

        if pending.user != user {
            LoggingHelper::log_tampered_state("email code issued for another user");
            return Err(MfaError::TamperedState);
        }
        if Utc::now() - pending.issued_at > self.ttl {
            log::debug!("Email code for user {user} expired");
            return Err(MfaError::IncorrectCode);
        }

        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        if constant_time_eq(code.as_bytes(), pending.code.as_bytes()) {
            Ok(())
        } else {
            Err(MfaError::IncorrectCode)
        }
    }
}
