//! `WebAuthn` ceremony types
//!
//! Options follow the browser's `PublicKeyCredentialCreationOptions` and
//! `PublicKeyCredentialRequestOptions` JSON shape; credentials follow
//! `PublicKeyCredential.toJSON()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MfaError, MfaResult};
use crate::models::UserId;

/// `WebAuthn` registration options sent to the client
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistrationOptions {
    pub challenge: String, // Base64URL-encoded random challenge
    pub rp: RelyingParty,  // Relying party information
    pub user: UserEntity,  // User information
    #[serde(rename = "pubKeyCredParams")]
    pub public_key_params: Vec<PublicKeyCredentialParameters>, // Allowed algorithms
    pub timeout: u32,      // Timeout in milliseconds
    pub attestation: String, // "none", "indirect", "direct"
    #[serde(rename = "authenticatorSelection")]
    pub authenticator_selection: AuthenticatorSelectionCriteria,
}

/// `WebAuthn` authentication options sent to the client
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticationOptions {
    pub challenge: String, // Base64URL-encoded random challenge
    pub timeout: u32,      // Timeout in milliseconds
    #[serde(rename = "rpId")]
    pub rp_id: String,
    #[serde(rename = "allowCredentials")]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(rename = "userVerification")]
    pub user_verification: String, // "required", "preferred", "discouraged"
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RelyingParty {
    pub id: String,   // Domain name (e.g., "example.com")
    pub name: String, // Display name
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserEntity {
    pub id: String,   // Base64URL-encoded user handle
    pub name: String, // Username (e.g., email)
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub r#type: String, // Always "public-key"
    pub alg: i32,       // COSE algorithm (-7 for ES256, -257 for RS256)
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticatorSelectionCriteria {
    #[serde(rename = "authenticatorAttachment")]
    pub authenticator_attachment: Option<String>, // "platform", "cross-platform"
    #[serde(rename = "residentKey")]
    pub resident_key: String, // "discouraged", "preferred", "required"
    #[serde(rename = "requireResidentKey")]
    pub require_resident_key: bool,
    #[serde(rename = "userVerification")]
    pub user_verification: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub r#type: String, // Always "public-key"
    pub id: String,     // Base64URL-encoded credential ID
}

/// Registration response from the client
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCredential {
    pub id: String, // Base64URL-encoded credential ID
    pub raw_id: String,
    pub response: AuthenticatorAttestationResponse,
    #[serde(default)]
    pub client_extension_results: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub r#type: String, // Always "public-key"
}

/// Authentication response from the client
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationCredential {
    pub id: String,
    pub raw_id: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(default)]
    pub client_extension_results: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String, // Base64URL-encoded client data JSON
    #[serde(rename = "attestationObject")]
    pub attestation_object: String, // Base64URL-encoded attestation object
    #[serde(default)]
    pub transports: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: String,
    pub signature: String,
    #[serde(rename = "userHandle", default)]
    pub user_handle: Option<String>,
}

/// Which ceremony a challenge was issued for
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Ceremony {
    Registration,
    Authentication,
}

impl Ceremony {
    /// `type` member expected in the client data
    #[must_use]
    pub fn client_data_type(self) -> &'static str {
        match self {
            Ceremony::Registration => "webauthn.create",
            Ceremony::Authentication => "webauthn.get",
        }
    }
}

/// Everything needed to complete a ceremony, round-tripped through the client
/// as a signed token
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChallengeState {
    pub ceremony: Ceremony,
    pub challenge: String,           // Base64URL-encoded challenge
    pub user_id: Option<UserId>,     // None for anonymous registration
    pub credential_ids: Vec<String>, // Credentials allowed to answer
    pub issued_at: DateTime<Utc>,
}

/// Parse a registration response as posted by the browser
///
/// # Errors
///
/// Returns `CredentialVerificationFailed` if the JSON is malformed
pub fn parse_registration_credential(json: &str) -> MfaResult<RegistrationCredential> {
    serde_json::from_str(json).map_err(|e| {
        log::debug!("Malformed registration credential: {e}");
        MfaError::CredentialVerificationFailed
    })
}

/// Parse an authentication response as posted by the browser
///
/// # Errors
///
/// Returns `CredentialVerificationFailed` if the JSON is malformed
pub fn parse_authentication_credential(json: &str) -> MfaResult<AuthenticationCredential> {
    serde_json::from_str(json).map_err(|e| {
        log::debug!("Malformed authentication credential: {e}");
        MfaError::CredentialVerificationFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registration_credential() {
        let json = r#"{
            "id": "Y3JlZC0x",
            "rawId": "Y3JlZC0x",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "attestationObject": "o2NmbXRkbm9uZQ",
                "transports": ["usb"]
            },
            "clientExtensionResults": {}
        }"#;

        let credential = parse_registration_credential(json).unwrap();
        assert_eq!(credential.id, "Y3JlZC0x");
        assert_eq!(credential.response.client_data_json, "e30");
        assert_eq!(credential.response.transports, vec!["usb"]);
    }

    #[test]
    fn test_parse_authentication_credential_without_user_handle() {
        let json = r#"{
            "id": "Y3JlZC0x",
            "rawId": "Y3JlZC0x",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "AAAA",
                "signature": "MEUC"
            }
        }"#;

        let credential = parse_authentication_credential(json).unwrap();
        assert!(credential.response.user_handle.is_none());
        assert!(credential.client_extension_results.is_none());
    }

    #[test]
    fn test_malformed_credential_is_verification_failure() {
        assert_eq!(
            parse_registration_credential("{\"id\": 1}").unwrap_err(),
            MfaError::CredentialVerificationFailed
        );
        assert_eq!(
            parse_authentication_credential("not json").unwrap_err(),
            MfaError::CredentialVerificationFailed
        );
    }

    #[test]
    fn test_options_use_browser_field_names() {
        let options = AuthenticationOptions {
            challenge: "abc".to_string(),
            timeout: 60_000,
            rp_id: "example.com".to_string(),
            allow_credentials: vec![],
            user_verification: "preferred".to_string(),
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["rpId"], "example.com");
        assert!(json["allowCredentials"].is_array());
    }
}
