//! Stateless round-tripping of ephemeral state through the client
//!
//! Nothing is kept server-side between the issuing and the completing call;
//! the state comes back as the token handed out.

mod sealed;
mod signer;

pub use sealed::SealedStateCodec;
pub use signer::SignedStateCodec;

/// Key-derivation salt for `WebAuthn` challenge state
pub const CHALLENGE_STATE_SALT: &str = "mfakit.webauthn.state";

/// Key-derivation salt for pending TOTP secrets
pub const TOTP_PENDING_SALT: &str = "mfakit.totp.pending";

/// Key-derivation salt for emailed one-time codes
pub const EMAIL_OTP_SALT: &str = "mfakit.otp.email";
