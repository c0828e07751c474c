// Centralized logging for security-relevant MFA events
use log::{debug, info, warn};

use crate::error::MfaError;
use crate::models::{Authenticator, UserId};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log a rejected signed or sealed token
    pub fn log_tampered_state(context: &str) {
        warn!("🚨 Security event: tampered state rejected ({context})");
    }

    /// Log a failure, escalating security events
    pub fn log_failure(context: &str, user: Option<UserId>, error: &MfaError) {
        if error.is_security_event() {
            Self::log_tampered_state(context);
        } else {
            debug!("{context} failed for user {user:?}: {error}");
        }
    }

    /// Log an exhausted attempt budget
    pub fn log_rate_limited(user: UserId) {
        warn!("⏳ Too many failed MFA attempts for user {user}");
    }

    /// Log a successful verification against a stored authenticator
    pub fn log_authenticated(authenticator: &Authenticator) {
        info!(
            "✅ MFA verified for user {} with {:?} authenticator {}",
            authenticator.user_id,
            authenticator.kind(),
            authenticator.id
        );
    }

    /// Log a TOTP secret regeneration
    pub fn log_secret_regenerated(reason: &str) {
        debug!("🔄 Regenerated pending TOTP secret: {reason}");
    }

    /// Log a newly enrolled authenticator
    pub fn log_enrolled(authenticator: &Authenticator) {
        info!(
            "🔐 Enrolled {:?} authenticator {} for user {}",
            authenticator.kind(),
            authenticator.id,
            authenticator.user_id
        );
    }

    /// Log a removed authenticator
    pub fn log_deleted(authenticator: &Authenticator) {
        info!(
            "🗑️  Deactivated {:?} authenticator {} for user {}",
            authenticator.kind(),
            authenticator.id,
            authenticator.user_id
        );
    }
}
