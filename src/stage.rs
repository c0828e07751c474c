//! Second-factor step of the login flow

use std::sync::Arc;

use crate::error::MfaResult;
use crate::models::UserId;
use crate::otp::EmailOtp;
use crate::store::AuthenticatorStore;

/// What the login flow should do after the password step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStep {
    /// No second factor required
    Proceed,
    /// Ask for a code or key from an enrolled authenticator
    Authenticate,
    /// A code was mailed; ask for it and check it against `token`
    EmailOtpSent { token: String },
}

/// Decides whether a login needs a second factor, and which
#[derive(Clone)]
pub struct AuthenticateStage {
    store: Arc<dyn AuthenticatorStore>,
    email_otp: Option<EmailOtp>,
}

impl AuthenticateStage {
    /// `email_otp` is `None` when emailed codes are disabled
    #[must_use]
    pub fn new(store: Arc<dyn AuthenticatorStore>, email_otp: Option<EmailOtp>) -> Self {
        Self { store, email_otp }
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the code cannot be sent
    pub fn handle(&self, user: UserId, email: &str) -> MfaResult<LoginStep> {
        if !self.store.find_authenticators(user, &[])?.is_empty() {
            return Ok(LoginStep::Authenticate);
        }

        match &self.email_otp {
            Some(email_otp) => Ok(LoginStep::EmailOtpSent {
                token: email_otp.send(user, email)?,
            }),
            None => Ok(LoginStep::Proceed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SealedStateCodec;
    use crate::testing::{InMemoryStore, RecordingMailer, TestFixtures};
    use chrono::Duration;
    use uuid::Uuid;

    fn email_otp(mailer: Arc<RecordingMailer>) -> EmailOtp {
        EmailOtp::new(
            SealedStateCodec::new(b"test-secret", "mfakit.otp.email").unwrap(),
            Duration::minutes(5),
            mailer,
        )
    }

    #[test]
    fn test_enrolled_user_authenticates() {
        let store = Arc::new(InMemoryStore::new());
        let user = Uuid::new_v4();
        store.insert(TestFixtures::totp_authenticator(user, "JBSWY3DPEHPK3PXP"));
        let mailer = Arc::new(RecordingMailer::new());
        let stage = AuthenticateStage::new(store, Some(email_otp(mailer.clone())));

        assert_eq!(stage.handle(user, "a@example.com").unwrap(), LoginStep::Authenticate);
        assert!(mailer.last().is_none());
    }

    #[test]
    fn test_unenrolled_user_gets_email_code() {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let stage = AuthenticateStage::new(store, Some(email_otp(mailer.clone())));

        let step = stage.handle(Uuid::new_v4(), "a@example.com").unwrap();
        assert!(matches!(step, LoginStep::EmailOtpSent { .. }));
        assert_eq!(mailer.last().unwrap().0, "a@example.com");
    }

    #[test]
    fn test_unenrolled_user_proceeds_without_email_otp() {
        let stage = AuthenticateStage::new(Arc::new(InMemoryStore::new()), None);
        assert_eq!(
            stage.handle(Uuid::new_v4(), "a@example.com").unwrap(),
            LoginStep::Proceed
        );
    }
}
