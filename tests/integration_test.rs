// End-to-end verification flows through MfaService
use std::sync::Arc;

use mfakit::models::AuthenticatorData;
use mfakit::store::AuthenticatorStore;
use mfakit::testing::{FakeVerifier, InMemoryStore, TestFixtures};
use mfakit::totp::{unix_now, TotpValidator};
use mfakit::webauthn::parse_authentication_credential;
use mfakit::{InMemoryRateLimitBackend, MfaError, MfaService, MfaSettings, UserId};
use uuid::Uuid;

fn service_with_budget(store: Arc<InMemoryStore>, attempts: usize) -> MfaService {
    let mut settings = TestFixtures::settings();
    settings.rate_limit.login_failed_attempts = attempts;
    TestFixtures::service_with(&settings, store, FakeVerifier::new()).0
}

fn build(settings: &MfaSettings) -> Result<MfaService, MfaError> {
    MfaService::new(
        settings,
        Arc::new(InMemoryStore::new()),
        Arc::new(FakeVerifier::new()),
        Arc::new(InMemoryRateLimitBackend::new(settings.rate_limit.config())),
        None,
    )
}

fn enroll_totp(store: &InMemoryStore, user: UserId) -> String {
    let secret = TotpValidator::generate_secret();
    store
        .create_authenticator(
            user,
            AuthenticatorData::Totp {
                secret: secret.clone(),
            },
        )
        .unwrap();
    secret
}

fn wrong_code(correct: &str) -> &'static str {
    if correct == "000000" {
        "111111"
    } else {
        "000000"
    }
}

#[test]
fn test_current_totp_code_succeeds() {
    let store = Arc::new(InMemoryStore::new());
    let (service, _) = TestFixtures::service(store.clone());
    let user = Uuid::new_v4();
    let secret = enroll_totp(&store, user);

    let code = service.totp_validator().code_for(&secret, unix_now()).unwrap();
    let matched = service.authenticate(user, &code).unwrap();

    assert_eq!(matched.user_id, user);
    assert_eq!(
        matched.data,
        AuthenticatorData::Totp {
            secret: secret.clone()
        }
    );
}

#[test]
fn test_budget_exhaustion_blocks_even_correct_code() {
    let store = Arc::new(InMemoryStore::new());
    let service = service_with_budget(store.clone(), 2);
    let user = Uuid::new_v4();
    let secret = enroll_totp(&store, user);
    let code = service.totp_validator().code_for(&secret, unix_now()).unwrap();

    assert_eq!(service.authenticate(user, wrong_code(&code)), Err(MfaError::IncorrectCode));
    assert_eq!(service.authenticate(user, wrong_code(&code)), Err(MfaError::IncorrectCode));
    assert_eq!(service.authenticate(user, &code), Err(MfaError::TooManyAttempts));
}

#[test]
fn test_budget_of_three_allows_three_attempts() {
    let store = Arc::new(InMemoryStore::new());
    let service = service_with_budget(store.clone(), 3);
    let user = Uuid::new_v4();
    let secret = enroll_totp(&store, user);
    let code = service.totp_validator().code_for(&secret, unix_now()).unwrap();

    for _ in 0..3 {
        assert_eq!(service.authenticate(user, wrong_code(&code)), Err(MfaError::IncorrectCode));
    }
    assert_eq!(service.authenticate(user, "123456"), Err(MfaError::TooManyAttempts));
}

#[test]
fn test_rate_limited_attempt_does_no_lookup() {
    let store = Arc::new(InMemoryStore::new());
    let service = service_with_budget(store.clone(), 1);
    let user = Uuid::new_v4();
    enroll_totp(&store, user);

    let _ = service.authenticate(user, "000000");
    let lookups = store.lookups();

    assert_eq!(service.authenticate(user, "000000"), Err(MfaError::TooManyAttempts));
    assert_eq!(store.lookups(), lookups);
}

#[test]
fn test_rate_limit_is_per_user() {
    let store = Arc::new(InMemoryStore::new());
    let service = service_with_budget(store.clone(), 1);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let bob_secret = enroll_totp(&store, bob);

    let _ = service.authenticate(alice, "000000");
    assert_eq!(service.authenticate(alice, "000000"), Err(MfaError::TooManyAttempts));

    let code = service.totp_validator().code_for(&bob_secret, unix_now()).unwrap();
    assert!(service.authenticate(bob, &code).is_ok());
}

#[test]
fn test_registration_against_different_challenge_fails() {
    let store = Arc::new(InMemoryStore::new());
    let (service, _) = TestFixtures::service(store.clone());
    let user = Uuid::new_v4();

    let (_, token) = service.begin_webauthn_registration(Some(user), "alice", "Alice").unwrap();
    let (other, _) = service.begin_webauthn_registration(Some(user), "alice", "Alice").unwrap();
    let credential = TestFixtures::registration_credential("cred-1", &other.challenge);

    assert_eq!(
        service.add_webauthn(user, &token, &credential, None, false),
        Err(MfaError::CredentialVerificationFailed)
    );
    assert!(store.all_for(user).is_empty());
}

#[test]
fn test_webauthn_register_then_authenticate() {
    let store = Arc::new(InMemoryStore::new());
    let (service, _) = TestFixtures::service(store.clone());
    let user = Uuid::new_v4();

    let (options, token) = service
        .begin_webauthn_registration(Some(user), "alice", "Alice")
        .unwrap();
    let credential = TestFixtures::registration_credential("cred-1", &options.challenge);
    let added = service
        .add_webauthn(user, &token, &credential, Some("YubiKey".to_string()), true)
        .unwrap();
    assert_eq!(added.webauthn().unwrap().name.as_deref(), Some("YubiKey"));
    assert!(added.webauthn().unwrap().passwordless);

    let (options, token) = service.begin_webauthn_authentication(user).unwrap();
    assert_eq!(options.allow_credentials.len(), 1);

    let assertion = TestFixtures::authentication_credential("cred-1", &options.challenge, 1);
    let json = serde_json::to_string(&assertion).unwrap();
    let parsed = parse_authentication_credential(&json).unwrap();

    let matched = service.complete_webauthn_authentication(user, &token, &parsed).unwrap();
    assert_eq!(matched.id, added.id);

    let stored = store.get(added.id).unwrap();
    assert_eq!(stored.webauthn().unwrap().sign_count, 1);
    assert!(stored.last_used_at.is_some());
}

#[test]
fn test_replayed_assertion_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let (service, _) = TestFixtures::service(store.clone());
    let user = Uuid::new_v4();
    store.insert(TestFixtures::webauthn_authenticator(user, "cred-1", 0));

    let (options, token) = service.begin_webauthn_authentication(user).unwrap();
    let assertion = TestFixtures::authentication_credential("cred-1", &options.challenge, 3);

    assert!(service.complete_webauthn_authentication(user, &token, &assertion).is_ok());
    assert_eq!(
        service.complete_webauthn_authentication(user, &token, &assertion),
        Err(MfaError::CredentialVerificationFailed)
    );
}

#[test]
fn test_passwordless_requires_user_verification() {
    let store = Arc::new(InMemoryStore::new());
    let settings = TestFixtures::settings();
    let (service, _) = TestFixtures::service_with(
        &settings,
        store.clone(),
        FakeVerifier::new().without_user_verification(),
    );
    let user = Uuid::new_v4();

    let (options, token) = service
        .begin_webauthn_registration(Some(user), "alice", "Alice")
        .unwrap();
    let credential = TestFixtures::registration_credential("cred-1", &options.challenge);

    assert_eq!(
        service.add_webauthn(user, &token, &credential, None, true),
        Err(MfaError::PasswordlessUnsupported)
    );
    assert!(store.all_for(user).is_empty());

    let added = service.add_webauthn(user, &token, &credential, None, false).unwrap();
    assert!(!added.webauthn().unwrap().passwordless);
}

#[test]
fn test_authentication_state_cannot_complete_registration() {
    let store = Arc::new(InMemoryStore::new());
    let (service, _) = TestFixtures::service(store.clone());
    let user = Uuid::new_v4();

    let (options, token) = service.begin_webauthn_authentication(user).unwrap();
    let credential = TestFixtures::registration_credential("cred-1", &options.challenge);

    assert_eq!(
        service.add_webauthn(user, &token, &credential, None, false),
        Err(MfaError::CredentialVerificationFailed)
    );
}

#[test]
fn test_state_from_other_deployment_is_tampered() {
    let store = Arc::new(InMemoryStore::new());
    let (service, _) = TestFixtures::service(store.clone());
    let mut other_settings = TestFixtures::settings();
    other_settings.signing.secret_key = "a-different-signing-secret".to_string();
    let (other, _) = TestFixtures::service_with(&other_settings, store, FakeVerifier::new());
    let user = Uuid::new_v4();

    let (options, token) = other.begin_webauthn_registration(Some(user), "alice", "Alice").unwrap();
    let credential = TestFixtures::registration_credential("cred-1", &options.challenge);

    assert_eq!(
        service.add_webauthn(user, &token, &credential, None, false),
        Err(MfaError::TamperedState)
    );
}

#[test]
fn test_service_refuses_unusable_settings() {
    let mut zero_period = TestFixtures::settings();
    zero_period.totp.period_seconds = 0;
    assert!(matches!(build(&zero_period), Err(MfaError::Internal(_))));

    let mut huge_ttl = TestFixtures::settings();
    huge_ttl.totp.pending_secret_ttl_seconds = u64::MAX;
    assert!(matches!(build(&huge_ttl), Err(MfaError::Internal(_))));

    let mut huge_email_ttl = TestFixtures::settings();
    huge_email_ttl.policy.email_otp_ttl_seconds = u64::MAX;
    assert!(matches!(build(&huge_email_ttl), Err(MfaError::Internal(_))));

    assert!(build(&TestFixtures::settings()).is_ok());
}
