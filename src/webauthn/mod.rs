//! `WebAuthn` challenge/response ceremonies
//!
//! Challenges are issued here and round-tripped through the client in a
//! signed token. Attestation and assertion signatures are checked by an
//! external [`WebAuthnVerifier`].

mod client_data;
mod coordinator;
mod crypto;
mod types;
mod verifier;

pub use client_data::verify_client_data;
pub use coordinator::ChallengeCoordinator;
pub use crypto::{generate_challenge, generate_user_handle};
pub use types::*;
pub use verifier::{AssertionResult, Attestation, VerificationError, WebAuthnVerifier};
