//! Attempt limiter against credential guessing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Attempt limiter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimiterConfig {
    /// Attempts allowed inside one window
    pub max_attempts: u32,
    /// Window length in seconds
    pub window_seconds: u64,
    /// Lockout once the attempts are used up, in seconds
    pub lockout_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            lockout_seconds: 900,
        }
    }
}

#[derive(Debug)]
struct Entry {
    attempts: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl Entry {
    /// Neither counting attempts nor locked out any more
    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        let unlocked = self.locked_until.is_none_or(|until| now >= until);
        unlocked && now.duration_since(self.window_start) >= window
    }
}

#[derive(Debug)]
struct Attempts {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

/// Counts attempts per key inside a sliding window
#[derive(Debug, Clone)]
pub struct AttemptLimiter {
    config: RateLimiterConfig,
    state: Arc<Mutex<Attempts>>,
}

impl AttemptLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(Attempts {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }

    /// Record an attempt for `key`; false once the key is locked out
    pub async fn check(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let window = self.window();

        // Idle keys are dropped at most once per window.
        if now.duration_since(state.last_sweep) >= window {
            let before = state.entries.len();
            state.entries.retain(|_, entry| !entry.is_idle(now, window));
            state.last_sweep = now;
            debug!("Swept {} idle sign-in keys", before - state.entries.len());
        }

        let entry = state.entries.entry(key.to_string()).or_insert(Entry {
            attempts: 0,
            window_start: now,
            locked_until: None,
        });

        if let Some(until) = entry.locked_until {
            if now < until {
                return false;
            }
            entry.locked_until = None;
            entry.attempts = 0;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            info!("Locked out {} for {} seconds", key, self.config.lockout_seconds);
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget the attempts of `key`
    pub async fn reset(&self, key: &str) {
        self.state.lock().await.entries.remove(key);
    }

    /// Number of keys currently tracked
    pub async fn tracked(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
