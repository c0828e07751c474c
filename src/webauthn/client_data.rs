//! `clientDataJSON` checks performed before the external verifier runs

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use super::verifier::VerificationError;

/// The members of `CollectedClientData` this crate checks
#[derive(Deserialize, Debug)]
struct CollectedClientData {
    #[serde(rename = "type")]
    r#type: String,
    challenge: String,
    origin: String,
}

/// Verify client data
///
/// # Arguments
/// * `client_data_json_b64` - Base64URL-encoded client data JSON
/// * `expected_type` - Expected type ("webauthn.create" or "webauthn.get")
/// * `expected_challenge` - Challenge from the signed state
/// * `expected_origin` - Configured relying-party origin
///
/// # Errors
///
/// Returns an error if the data does not decode or any member mismatches
pub fn verify_client_data(
    client_data_json_b64: &str,
    expected_type: &str,
    expected_challenge: &str,
    expected_origin: &str,
) -> Result<(), VerificationError> {
    let client_data_bytes = URL_SAFE_NO_PAD
        .decode(client_data_json_b64.trim_end_matches('='))
        .map_err(|_| VerificationError::Encoding("Invalid client data encoding".to_string()))?;

    let client_data: CollectedClientData = serde_json::from_slice(&client_data_bytes)
        .map_err(|_| VerificationError::Encoding("Invalid client data JSON".to_string()))?;

    if client_data.r#type != expected_type {
        return Err(VerificationError::Failed(format!(
            "Invalid type, expected {expected_type}"
        )));
    }

    if client_data.challenge.trim_end_matches('=') != expected_challenge {
        return Err(VerificationError::Failed("Challenge mismatch".to_string()));
    }

    if client_data.origin != expected_origin {
        return Err(VerificationError::Failed("Origin mismatch".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://example.com";

    fn encode(r#type: &str, challenge: &str, origin: &str) -> String {
        let json = serde_json::json!({
            "type": r#type,
            "challenge": challenge,
            "origin": origin,
            "crossOrigin": false,
        });
        URL_SAFE_NO_PAD.encode(json.to_string())
    }

    #[test]
    fn test_matching_client_data() {
        let data = encode("webauthn.get", "abc", ORIGIN);
        assert!(verify_client_data(&data, "webauthn.get", "abc", ORIGIN).is_ok());
    }

    #[test]
    fn test_wrong_type() {
        let data = encode("webauthn.create", "abc", ORIGIN);
        assert!(matches!(
            verify_client_data(&data, "webauthn.get", "abc", ORIGIN),
            Err(VerificationError::Failed(_))
        ));
    }

    #[test]
    fn test_wrong_challenge() {
        let data = encode("webauthn.get", "other", ORIGIN);
        assert!(verify_client_data(&data, "webauthn.get", "abc", ORIGIN).is_err());
    }

    #[test]
    fn test_wrong_origin() {
        let data = encode("webauthn.get", "abc", "https://evil.example");
        assert!(verify_client_data(&data, "webauthn.get", "abc", ORIGIN).is_err());
    }

    #[test]
    fn test_undecodable_client_data() {
        assert!(matches!(
            verify_client_data("%%%", "webauthn.get", "abc", ORIGIN),
            Err(VerificationError::Encoding(_))
        ));
        assert!(matches!(
            verify_client_data(&URL_SAFE_NO_PAD.encode("{}"), "webauthn.get", "abc", ORIGIN),
            Err(VerificationError::Encoding(_))
        ));
    }
}
