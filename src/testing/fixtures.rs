//! Test fixtures providing pre-built test objects

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::sync::Arc;

use super::constants::{TEST_ISSUER, TEST_ORIGIN, TEST_RP_ID, TEST_SIGNING_SECRET};
use super::mock::{FakeVerifier, InMemoryStore, RecordingMailer};
use crate::models::{Authenticator, AuthenticatorData, UserId, WebAuthnCredentialData};
use crate::otp::OtpMailer;
use crate::ratelimit::InMemoryRateLimitBackend;
use crate::service::MfaService;
use crate::settings::MfaSettings;
use crate::webauthn::{
    AuthenticationCredential, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    RegistrationCredential,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Standard test settings: fixed signing key, email codes enabled
    #[must_use]
    pub fn settings() -> MfaSettings {
        let mut settings = MfaSettings::default();
        settings.signing.secret_key = TEST_SIGNING_SECRET.to_string();
        settings.totp.issuer = TEST_ISSUER.to_string();
        settings.webauthn.rp_id = TEST_RP_ID.to_string();
        settings.webauthn.rp_origin = TEST_ORIGIN.to_string();
        settings.policy.email_otp = true;
        settings
    }

    /// Service over `store` with standard settings
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be built
    #[must_use]
    pub fn service(store: Arc<InMemoryStore>) -> (MfaService, Arc<RecordingMailer>) {
        Self::service_with(&Self::settings(), store, FakeVerifier::new())
    }

    /// Service over `store` with the given settings and verifier
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be built
    #[must_use]
    pub fn service_with(
        settings: &MfaSettings,
        store: Arc<InMemoryStore>,
        verifier: FakeVerifier,
    ) -> (MfaService, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::new());
        let service = MfaService::new(
            settings,
            store,
            Arc::new(verifier),
            Arc::new(InMemoryRateLimitBackend::new(settings.rate_limit.config())),
            Some(mailer.clone() as Arc<dyn OtpMailer>),
        )
        .unwrap();
        (service, mailer)
    }

    /// A stored TOTP authenticator
    #[must_use]
    pub fn totp_authenticator(user: UserId, secret: &str) -> Authenticator {
        Authenticator::new(
            user,
            AuthenticatorData::Totp {
                secret: secret.to_string(),
            },
        )
    }

    /// A stored `WebAuthn` authenticator
    #[must_use]
    pub fn webauthn_authenticator(
        user: UserId,
        credential_id: &str,
        sign_count: u32,
    ) -> Authenticator {
        Authenticator::new(
            user,
            AuthenticatorData::WebAuthn(WebAuthnCredentialData {
                credential_id: credential_id.to_string(),
                public_key: format!("cose-key-{credential_id}").into_bytes(),
                sign_count,
                passwordless: false,
                name: Some("Test key".to_string()),
            }),
        )
    }

    /// Base64URL `clientDataJSON` as a browser would produce it
    #[must_use]
    pub fn client_data_json(r#type: &str, challenge: &str, origin: &str) -> String {
        let json = serde_json::json!({
            "type": r#type,
            "challenge": challenge,
            "origin": origin,
            "crossOrigin": false,
        });
        URL_SAFE_NO_PAD.encode(json.to_string())
    }

    /// Base64URL authenticator data: RP ID hash, UP|UV flags, counter
    #[must_use]
    pub fn authenticator_data(sign_count: u32) -> String {
        let mut data = vec![0u8; 32];
        data.push(0x05);
        data.extend_from_slice(&sign_count.to_be_bytes());
        URL_SAFE_NO_PAD.encode(data)
    }

    /// Registration response answering `challenge`
    #[must_use]
    pub fn registration_credential(credential_id: &str, challenge: &str) -> RegistrationCredential {
        RegistrationCredential {
            id: credential_id.to_string(),
            raw_id: credential_id.to_string(),
            response: AuthenticatorAttestationResponse {
                client_data_json: Self::client_data_json("webauthn.create", challenge, TEST_ORIGIN),
                attestation_object: URL_SAFE_NO_PAD.encode(b"fake-attestation"),
                transports: vec!["internal".to_string()],
            },
            client_extension_results: None,
            r#type: "public-key".to_string(),
        }
    }

    /// Authentication response answering `challenge` with counter `sign_count`
    #[must_use]
    pub fn authentication_credential(
        credential_id: &str,
        challenge: &str,
        sign_count: u32,
    ) -> AuthenticationCredential {
        AuthenticationCredential {
            id: credential_id.to_string(),
            raw_id: credential_id.to_string(),
            response: AuthenticatorAssertionResponse {
                client_data_json: Self::client_data_json("webauthn.get", challenge, TEST_ORIGIN),
                authenticator_data: Self::authenticator_data(sign_count),
                signature: URL_SAFE_NO_PAD.encode(b"fake-signature"),
                user_handle: None,
            },
            client_extension_results: None,
            r#type: "public-key".to_string(),
        }
    }
}
