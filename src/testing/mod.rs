//! Test doubles and fixtures for mfakit
//!
//! Available to unit tests and, behind the `testing` feature, to the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - Settings, services, stored authenticators and browser
//!   credentials
//! - [`mock`] - In-memory store, fake `WebAuthn` verifier, recording mailer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mfakit::testing::{InMemoryStore, TestFixtures};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let (service, _mailer) = TestFixtures::service(store.clone());
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::{FakeVerifier, InMemoryStore, RecordingMailer};

/// Common test constants
pub mod constants {
    /// Signing key material for test services
    pub const TEST_SIGNING_SECRET: &str = "test_signing_secret_32_bytes_lng";

    /// Relying party the fixtures are configured for
    pub const TEST_RP_ID: &str = "auth.example.com";

    /// Origin the fixture credentials claim
    pub const TEST_ORIGIN: &str = "https://auth.example.com";

    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Test User";

    /// Issuer shown in provisioning URIs
    pub const TEST_ISSUER: &str = "Example";
}
