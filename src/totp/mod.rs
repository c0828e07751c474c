//! Time-based one-time passwords (RFC 6238)

mod enrollment;
mod validator;

pub use enrollment::{TotpEnrollment, TotpSecret};
pub use validator::{unix_now, TotpValidator, TOTP_SECRET_LENGTH};
