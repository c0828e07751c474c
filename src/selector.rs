//! Code verification against a user's enrolled authenticators

use std::sync::Arc;

use crate::error::{MfaError, MfaResult};
use crate::models::{Authenticator, AuthenticatorType, UserId};
use crate::ratelimit::RateLimiter;
use crate::store::AuthenticatorStore;
use crate::totp::{unix_now, TotpValidator};
use crate::utils::logging::LoggingHelper;

/// Outcome of a verification attempt: the matched authenticator, or why not
pub type VerificationVerdict = MfaResult<Authenticator>;

/// Finds the code-based authenticator a submitted code belongs to
#[derive(Clone)]
pub struct AuthenticatorSelector {
    store: Arc<dyn AuthenticatorStore>,
    limiter: RateLimiter,
    validator: TotpValidator,
}

impl AuthenticatorSelector {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthenticatorStore>,
        limiter: RateLimiter,
        validator: TotpValidator,
    ) -> Self {
        Self {
            store,
            limiter,
            validator,
        }
    }

    /// Verify `code` at the current time
    pub fn authenticate(&self, user: UserId, code: &str) -> VerificationVerdict {
        self.authenticate_at(user, code, unix_now())
    }

    /// Verify `code` as if submitted at `unix_time`
    ///
    /// Every attempt spends one unit of the user's budget; an exhausted
    /// budget fails before any authenticator is looked at. Authenticators
    /// are tried oldest first and the first match wins. The budget is reset
    /// only once the usage has been recorded.
    pub fn authenticate_at(&self, user: UserId, code: &str, unix_time: u64) -> VerificationVerdict {
        if !self.limiter.consume(user) {
            LoggingHelper::log_rate_limited(user);
            return Err(MfaError::TooManyAttempts);
        }

        let mut candidates = self
            .store
            .find_authenticators(user, &[AuthenticatorType::WebAuthn])?;
        candidates.sort_by_key(|a| a.created_at);

        let Some(matched) = candidates
            .into_iter()
            .find(|a| a.validate_code_at(&self.validator, code, unix_time))
        else {
            LoggingHelper::log_failure("code verification", Some(user), &MfaError::IncorrectCode);
            return Err(MfaError::IncorrectCode);
        };

        self.store.record_usage(matched.id, None)?;
        self.limiter.clear(user);
        LoggingHelper::log_authenticated(&matched);

        Ok(matched)
    }
}
