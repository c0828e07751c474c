//! In-memory sliding-window rate-limit backend
//!
//! Suitable for a single process. Consume is atomic under one lock, so two
//! concurrent attempts cannot both take the last unit of budget.

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use super::RateLimitBackend;

/// Default maximum attempts per window.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default window duration in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 300;

/// Configuration for the in-memory backend.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of attempts allowed within the window.
    pub max_attempts: usize,
    /// Duration of the sliding window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
        }
    }
}

/// Timestamps of attempts for one (key, action) pair.
#[derive(Debug, Clone, Default)]
struct AttemptEntry {
    timestamps: Vec<Instant>,
}

impl AttemptEntry {
    /// Drop attempts that fell out of the window.
    fn prune(&mut self, now: Instant, window: Duration) {
        self.timestamps.retain(|&t| now.duration_since(t) < window);
    }
}

/// Thread-safe in-memory attempt tracker keyed by (key, action).
#[derive(Debug, Clone)]
pub struct InMemoryRateLimitBackend {
    config: RateLimitConfig,
    entries: Arc<Mutex<HashMap<(String, String), AttemptEntry>>>,
}

impl InMemoryRateLimitBackend {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Remaining attempts for a key within the current window.
    #[must_use]
    pub fn remaining(&self, key: &str, action: &str) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock();

        let used = entries
            .get(&(key.to_string(), action.to_string()))
            .map_or(0, |entry| {
                entry
                    .timestamps
                    .iter()
                    .filter(|&&t| now.duration_since(t) < self.config.window)
                    .count()
            });

        self.config.max_attempts.saturating_sub(used)
    }

    /// Drop entries with no attempts inside the window.
    ///
    /// Should be called periodically to prevent memory growth.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        entries.retain(|_, entry| {
            entry.prune(now, self.config.window);
            !entry.timestamps.is_empty()
        });
    }
}

impl Default for InMemoryRateLimitBackend {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimitBackend for InMemoryRateLimitBackend {
    fn consume(&self, key: &str, action: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let entry = entries
            .entry((key.to_string(), action.to_string()))
            .or_default();
        entry.prune(now, self.config.window);

        if entry.timestamps.len() >= self.config.max_attempts {
            return false;
        }

        entry.timestamps.push(now);
        true
    }

    fn clear(&self, key: &str, action: &str) {
        let mut entries = self.entries.lock();
        entries.remove(&(key.to_string(), action.to_string()));
    }
}
