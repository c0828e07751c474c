//! Per-account attempt budget for code verification
//!
//! Keys derive from the user identity, never from the submitted code, so the
//! limit holds however many distinct codes are tried.

mod memory;

use std::sync::Arc;

pub use memory::{InMemoryRateLimitBackend, RateLimitConfig};

use crate::models::UserId;

/// Rate-limit action shared with the password login flow
pub const LOGIN_FAILED_ACTION: &str = "login_failed";

/// Storage for attempt budgets
///
/// `consume` must be atomic: when one unit remains, only one of two
/// concurrent callers may observe it.
pub trait RateLimitBackend: Send + Sync {
    /// Take one unit of budget; `false` once the budget is exhausted
    fn consume(&self, key: &str, action: &str) -> bool;

    /// Reset the budget immediately
    fn clear(&self, key: &str, action: &str);
}

/// Budget of failed-verification attempts per user
#[derive(Clone)]
pub struct RateLimiter {
    backend: Arc<dyn RateLimitBackend>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(backend: Arc<dyn RateLimitBackend>) -> Self {
        Self { backend }
    }

    /// Backend key for a user
    #[must_use]
    pub fn key_for(user: UserId) -> String {
        format!("mfa-auth-user-{user}")
    }

    /// Take one attempt from the user's budget
    #[must_use]
    pub fn consume(&self, user: UserId) -> bool {
        self.backend
            .consume(&Self::key_for(user), LOGIN_FAILED_ACTION)
    }

    /// Forget the user's failed attempts
    pub fn clear(&self, user: UserId) {
        self.backend.clear(&Self::key_for(user), LOGIN_FAILED_ACTION);
    }
}
