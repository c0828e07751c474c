use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::{MfaError, MfaResult};
use crate::ratelimit::RateLimitConfig;
use crate::utils::crypto::random_bytes;

/// Code lengths totp-rs accepts
const TOTP_DIGITS: RangeInclusive<usize> = 6..=8;
/// Upper bound for pending-secret and email-code lifetimes (one day)
const MAX_TTL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MfaSettings {
    pub signing: SigningSettings,
    pub totp: TotpSettings,
    pub rate_limit: RateLimitSettings,
    pub webauthn: WebAuthnSettings,
    pub policy: PolicySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SigningSettings {
    /// Key material for signed challenge state and sealed tokens.
    /// Generated at startup when empty.
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TotpSettings {
    /// Issuer label shown in authenticator apps
    pub issuer: String,
    pub digits: usize,
    pub period_seconds: u64,
    /// Accepted drift, in steps either side of the current one
    pub tolerance_steps: u8,
    /// How long a pending secret stays valid during setup
    pub pending_secret_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Failed code attempts allowed per user within the window
    pub login_failed_attempts: usize,
    pub window_seconds: u64,
}

/// `WebAuthn` relying-party settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebAuthnSettings {
    /// Relying Party ID (usually the domain)
    pub rp_id: String,
    /// Relying Party name (displayed to user)
    pub rp_name: String,
    /// Relying Party origin (e.g., <https://example.com>)
    pub rp_origin: String,
    /// Timeout in seconds for operations
    pub timeout_seconds: u64,
    /// User verification preference ("required", "preferred", "discouraged")
    pub user_verification: String,
    /// Optional authenticator attachment ("platform", "cross-platform")
    pub authenticator_attachment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Forbid removing the last authenticator
    pub mfa_mandatory: bool,
    /// Send a one-time code by email when no authenticator is enrolled
    pub email_otp: bool,
    pub email_otp_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for TotpSettings {
    fn default() -> Self {
        Self {
            issuer: "mfakit".to_string(),
            digits: 6,
            period_seconds: 30,
            tolerance_steps: 1,
            pending_secret_ttl_seconds: 600,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            login_failed_attempts: 5,
            window_seconds: 300,
        }
    }
}

impl Default for WebAuthnSettings {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "mfakit".to_string(),
            rp_origin: "https://localhost".to_string(),
            timeout_seconds: 60,
            user_verification: "preferred".to_string(),
            authenticator_attachment: None,
        }
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            mfa_mandatory: false,
            email_otp: false,
            email_otp_ttl_seconds: 300,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TotpSettings {
    /// # Errors
    ///
    /// Returns an error if the TTL does not fit a `Duration`
    pub fn pending_secret_ttl(&self) -> MfaResult<Duration> {
        ttl_from_seconds("totp.pending_secret_ttl_seconds", self.pending_secret_ttl_seconds)
    }
}

impl RateLimitSettings {
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_attempts: self.login_failed_attempts,
            window: std::time::Duration::from_secs(self.window_seconds),
        }
    }
}

impl PolicySettings {
    /// # Errors
    ///
    /// Returns an error if the TTL does not fit a `Duration`
    pub fn email_otp_ttl(&self) -> MfaResult<Duration> {
        ttl_from_seconds("policy.email_otp_ttl_seconds", self.email_otp_ttl_seconds)
    }
}

fn ttl_from_seconds(name: &str, seconds: u64) -> MfaResult<Duration> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| MfaError::Internal(format!("{name} out of range: {seconds}")))
}

impl MfaSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed, or a
    /// value is out of range
    pub fn load() -> anyhow::Result<Self> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.validate()?;
        Self::init_logging(&settings.logging);

        Ok(settings)
    }

    /// Parse a single settings file, without environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`MfaSettings::validate`]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: Self = basic_toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("validating {}", path.display()))?;
        Ok(settings)
    }

    /// Reject values that would make code checks or token expiry misbehave
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting
    pub fn validate(&self) -> anyhow::Result<()> {
        let totp = &self.totp;
        if totp.period_seconds == 0 {
            anyhow::bail!("totp.period_seconds must be greater than zero");
        }
        if !TOTP_DIGITS.contains(&totp.digits) {
            anyhow::bail!(
                "totp.digits must be between {} and {}, got {}",
                TOTP_DIGITS.start(),
                TOTP_DIGITS.end(),
                totp.digits
            );
        }
        for (name, seconds) in [
            ("totp.pending_secret_ttl_seconds", totp.pending_secret_ttl_seconds),
            ("policy.email_otp_ttl_seconds", self.policy.email_otp_ttl_seconds),
        ] {
            if seconds == 0 || seconds > MAX_TTL_SECONDS {
                anyhow::bail!("{name} must be between 1 and {MAX_TTL_SECONDS}, got {seconds}");
            }
        }
        if self.rate_limit.window_seconds == 0 {
            anyhow::bail!("rate_limit.window_seconds must be greater than zero");
        }
        Ok(())
    }

    /// Signing key material as bytes
    #[must_use]
    pub fn signing_secret(&self) -> &[u8] {
        self.signing.secret_key.as_bytes()
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `MFA_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    fn load_base_settings() -> anyhow::Result<Self> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(default_config_path)?;
            println!("✓ Loaded base settings from {}", default_config_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("MFA_SECRETS_DIR") {
            let secrets_path = Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ MFA_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_signing_env_overrides(&mut settings.signing);
        Self::apply_totp_env_overrides(&mut settings.totp);
        Self::apply_rate_limit_env_overrides(&mut settings.rate_limit);
        Self::apply_webauthn_env_overrides(&mut settings.webauthn);
        Self::apply_policy_env_overrides(&mut settings.policy);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_signing_env_overrides(signing: &mut SigningSettings) {
        let env_secret_set = std::env::var("MFA_SIGNING_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                signing.secret_key = secret;
                true
            }
        });

        if !env_secret_set && signing.secret_key.is_empty() {
            signing.secret_key = general_purpose::STANDARD.encode(random_bytes(32));
            Self::warn_about_generated_secret();
        }
    }

    fn apply_totp_env_overrides(totp: &mut TotpSettings) {
        if let Ok(issuer) = std::env::var("MFA_TOTP_ISSUER") {
            totp.issuer = issuer;
        }
        Self::apply_parsed_env_override("MFA_TOTP_DIGITS", &mut totp.digits);
        Self::apply_parsed_env_override("MFA_TOTP_PERIOD_SECONDS", &mut totp.period_seconds);
        Self::apply_parsed_env_override("MFA_TOTP_TOLERANCE_STEPS", &mut totp.tolerance_steps);
        Self::apply_parsed_env_override(
            "MFA_TOTP_PENDING_SECRET_TTL_SECONDS",
            &mut totp.pending_secret_ttl_seconds,
        );
    }

    fn apply_rate_limit_env_overrides(rate_limit: &mut RateLimitSettings) {
        Self::apply_parsed_env_override(
            "MFA_LOGIN_FAILED_ATTEMPTS",
            &mut rate_limit.login_failed_attempts,
        );
        Self::apply_parsed_env_override(
            "MFA_RATE_LIMIT_WINDOW_SECONDS",
            &mut rate_limit.window_seconds,
        );
    }

    fn apply_webauthn_env_overrides(webauthn: &mut WebAuthnSettings) {
        if let Ok(rp_id) = std::env::var("WEBAUTHN_RP_ID") {
            webauthn.rp_id = rp_id;
        }
        if let Ok(rp_name) = std::env::var("WEBAUTHN_RP_NAME") {
            webauthn.rp_name = rp_name;
        }
        if let Ok(rp_origin) = std::env::var("WEBAUTHN_RP_ORIGIN") {
            webauthn.rp_origin = rp_origin;
        }
        Self::apply_parsed_env_override("WEBAUTHN_TIMEOUT_SECONDS", &mut webauthn.timeout_seconds);
    }

    fn apply_policy_env_overrides(policy: &mut PolicySettings) {
        Self::apply_parsed_env_override("MFA_MANDATORY", &mut policy.mfa_mandatory);
        Self::apply_parsed_env_override("MFA_EMAIL_OTP", &mut policy.email_otp);
        Self::apply_parsed_env_override(
            "MFA_EMAIL_OTP_TTL_SECONDS",
            &mut policy.email_otp_ttl_seconds,
        );
    }

    fn apply_logging_env_overrides(logging: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging.level = log_level;
        }
    }

    /// Overwrite `target` when `env_var` is set and parses
    fn apply_parsed_env_override<T: std::str::FromStr>(env_var: &str, target: &mut T) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<T>() {
                *target = value;
            }
        }
    }

    fn warn_about_generated_secret() {
        eprintln!("⚠️  WARNING: Using auto-generated MFA signing secret");
        eprintln!("🔒 For production use, set the MFA_SIGNING_SECRET environment variable");
        eprintln!("   or configure signing.secret_key in Settings.toml");
        eprintln!("💡 Pending enrollments and challenges will not survive a restart");
    }

    fn init_logging(logging: &LoggingSettings) {
        // A host application may already have installed a logger
        if env_logger::Builder::new()
            .parse_filters(&logging.level)
            .try_init()
            .is_err()
        {
            log::debug!("Logger already initialised, keeping existing configuration");
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}
