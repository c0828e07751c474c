//! Time-step code computation and validation

use chrono::Utc;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{MfaError, MfaResult};
use crate::settings::TotpSettings;
use crate::utils::crypto::random_bytes;

/// TOTP secret length in bytes (160 bits).
pub const TOTP_SECRET_LENGTH: usize = 20;

/// Current Unix time in seconds
#[must_use]
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// Computes and checks RFC 6238 codes (HMAC-SHA1)
#[derive(Debug, Clone)]
pub struct TotpValidator {
    issuer: String,
    digits: usize,
    step: u64,
    skew: u8,
}

impl Default for TotpValidator {
    fn default() -> Self {
        Self::new(&TotpSettings::default())
    }
}

impl TotpValidator {
    #[must_use]
    pub fn new(settings: &TotpSettings) -> Self {
        Self {
            issuer: settings.issuer.clone(),
            digits: settings.digits,
            step: settings.period_seconds,
            skew: settings.tolerance_steps,
        }
    }

    /// Generate a fresh base32-encoded secret
    #[must_use]
    pub fn generate_secret() -> String {
        Secret::Raw(random_bytes(TOTP_SECRET_LENGTH))
            .to_encoded()
            .to_string()
    }

    /// Length of one time step in seconds
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Check `code` against `secret` at the current time
    #[must_use]
    pub fn validate_code(&self, secret: &str, code: &str) -> bool {
        self.validate_code_at(secret, code, unix_now())
    }

    /// Check `code` against `secret` at `unix_time`, within the configured
    /// number of steps either side
    ///
    /// Comparison is constant-time. A secret that does not decode never
    /// validates, and neither does any code earlier than the tolerance
    /// window's first full step after the epoch.
    #[must_use]
    pub fn validate_code_at(&self, secret: &str, code: &str, unix_time: u64) -> bool {
        // totp-rs steps back `skew` windows from `unix_time` unchecked
        if self.step == 0 || unix_time / self.step < u64::from(self.skew) {
            return false;
        }
        let Some(code) = self.normalize_code(code) else {
            return false;
        };
        let Ok(secret_bytes) = decode_secret(secret) else {
            log::warn!("Stored TOTP secret does not decode as base32");
            return false;
        };

        self.totp(secret_bytes, String::new()).check(&code, unix_time)
    }

    /// The code for `secret` at `unix_time`
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is not valid base32 or the period is
    /// zero
    pub fn code_for(&self, secret: &str, unix_time: u64) -> MfaResult<String> {
        if self.step == 0 {
            return Err(MfaError::Internal("TOTP period is zero".to_string()));
        }
        let secret_bytes = decode_secret(secret)?;
        Ok(self.totp(secret_bytes, String::new()).generate(unix_time))
    }

    /// `otpauth://` URI for provisioning an authenticator app
    ///
    /// # Errors
    ///
    /// Returns an error if the secret does not decode, is shorter than 128
    /// bits, or the account name contains a colon
    pub fn provisioning_uri(&self, secret: &str, account: &str) -> MfaResult<String> {
        let secret_bytes = decode_secret(secret)?;
        let totp = TOTP::new(
            Algorithm::SHA1, // RFC 6238 default
            self.digits,
            self.skew,
            self.step,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| MfaError::Internal(format!("TOTP init: {e}")))?;

        Ok(totp.get_url())
    }

    fn totp(&self, secret_bytes: Vec<u8>, account: String) -> TOTP {
        TOTP::new_unchecked(
            Algorithm::SHA1,
            self.digits,
            self.skew,
            self.step,
            secret_bytes,
            Some(self.issuer.clone()),
            account,
        )
    }

    /// Strip whitespace; reject anything but exactly `digits` ASCII digits
    fn normalize_code(&self, code: &str) -> Option<String> {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        (code.len() == self.digits && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
    }
}

fn decode_secret(secret: &str) -> MfaResult<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| MfaError::Internal(format!("Invalid TOTP secret: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_010;

    fn secret() -> String {
        // RFC 6238 SHA1 test key
        Secret::Raw(b"12345678901234567890".to_vec())
            .to_encoded()
            .to_string()
    }

    #[test]
    fn test_rfc6238_vector() {
        let validator = TotpValidator::default();
        // RFC 6238 Appendix B, T = 59, SHA1, truncated to 6 digits
        assert_eq!(validator.code_for(&secret(), 59).unwrap(), "287082");
        assert_eq!(validator.code_for(&secret(), 1_111_111_109).unwrap(), "081804");
    }

    #[test]
    fn test_current_step_validates() {
        let validator = TotpValidator::default();
        let code = validator.code_for(&secret(), NOW).unwrap();
        assert!(validator.validate_code_at(&secret(), &code, NOW));
    }

    #[test]
    fn test_one_step_skew_tolerated() {
        let validator = TotpValidator::default();
        let step = validator.step();

        let previous = validator.code_for(&secret(), NOW - step).unwrap();
        let next = validator.code_for(&secret(), NOW + step).unwrap();
        assert!(validator.validate_code_at(&secret(), &previous, NOW));
        assert!(validator.validate_code_at(&secret(), &next, NOW));
    }

    #[test]
    fn test_two_steps_rejected() {
        let validator = TotpValidator::default();
        let step = validator.step();

        let too_old = validator.code_for(&secret(), NOW - 2 * step).unwrap();
        let too_new = validator.code_for(&secret(), NOW + 2 * step).unwrap();
        assert!(!validator.validate_code_at(&secret(), &too_old, NOW));
        assert!(!validator.validate_code_at(&secret(), &too_new, NOW));
    }

    #[test]
    fn test_generated_secrets_validate() {
        let validator = TotpValidator::default();
        for _ in 0..10 {
            let secret = TotpValidator::generate_secret();
            let code = validator.code_for(&secret, NOW).unwrap();
            assert!(validator.validate_code_at(&secret, &code, NOW));
        }
    }

    #[test]
    fn test_code_normalization() {
        let validator = TotpValidator::default();
        let code = validator.code_for(&secret(), NOW).unwrap();
        let spaced = format!(" {} {} ", &code[..3], &code[3..]);

        assert!(validator.validate_code_at(&secret(), &spaced, NOW));
        assert!(!validator.validate_code_at(&secret(), &code[..5], NOW));
        assert!(!validator.validate_code_at(&secret(), &format!("{code}0"), NOW));
        assert!(!validator.validate_code_at(&secret(), "abcdef", NOW));
        assert!(!validator.validate_code_at(&secret(), "", NOW));
    }

    #[test]
    fn test_undecodable_secret_never_validates() {
        let validator = TotpValidator::default();
        assert!(!validator.validate_code_at("not base32 !!", "123456", NOW));
        assert!(validator.code_for("not base32 !!", NOW).is_err());
    }

    #[test]
    fn test_times_before_the_first_window_never_validate() {
        let validator = TotpValidator::default();
        let code = validator.code_for(&secret(), 10).unwrap();

        assert!(!validator.validate_code_at(&secret(), &code, 10));
        assert!(!validator.validate_code_at(&secret(), &code, 0));

        let first = validator.code_for(&secret(), validator.step()).unwrap();
        assert!(validator.validate_code_at(&secret(), &first, validator.step()));
    }

    #[test]
    fn test_zero_period_never_validates() {
        let validator = TotpValidator::new(&TotpSettings {
            period_seconds: 0,
            ..TotpSettings::default()
        });

        assert!(!validator.validate_code_at(&secret(), "123456", NOW));
        assert!(matches!(validator.code_for(&secret(), NOW), Err(MfaError::Internal(_))));
    }

    #[test]
    fn test_lowercase_secret_accepted() {
        let validator = TotpValidator::default();
        let code = validator.code_for(&secret(), NOW).unwrap();
        assert!(validator.validate_code_at(&secret().to_lowercase(), &code, NOW));
    }

    #[test]
    fn test_generated_secret_length() {
        let secret = TotpValidator::generate_secret();
        assert_eq!(decode_secret(&secret).unwrap().len(), TOTP_SECRET_LENGTH);
    }

    #[test]
    fn test_provisioning_uri() {
        let validator = TotpValidator::default();
        let uri = validator
            .provisioning_uri(&TotpValidator::generate_secret(), "alice@example.com")
            .unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("alice"));
        assert!(uri.contains("secret="));
    }
}
