#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Server-side multi-factor authentication: TOTP and `WebAuthn` enrollment
//! and verification, with per-user attempt limits and stateless
//! challenge round-tripping.

/// Version of the mfakit library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod models;
pub mod otp;
pub mod policy;
pub mod ratelimit;
pub mod selector;
pub mod service;
pub mod settings;
pub mod stage;
pub mod state;
pub mod store;
pub mod totp;
pub mod utils;
pub mod webauthn;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use error::{MfaError, MfaResult, StoreError, TotpActivationError};
pub use models::{Authenticator, AuthenticatorData, AuthenticatorType, UserId};
pub use policy::{DeletionRule, EnrollmentPolicy, MandatoryMfaRule};
pub use ratelimit::{InMemoryRateLimitBackend, RateLimitBackend, RateLimiter};
pub use selector::{AuthenticatorSelector, VerificationVerdict};
pub use service::MfaService;
pub use settings::MfaSettings;
pub use stage::{AuthenticateStage, LoginStep};
pub use state::{SealedStateCodec, SignedStateCodec};
pub use store::AuthenticatorStore;
pub use totp::{TotpEnrollment, TotpSecret, TotpValidator};
pub use webauthn::{ChallengeCoordinator, WebAuthnVerifier};
