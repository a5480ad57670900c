//! Rate limiter implementation
//!
//! Sliding window limiting of bot interactions per chat member.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::domain::{ChatId, UserId};

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the call is allowed
    pub allowed: bool,
    /// Remaining calls in the current window
    pub remaining: u32,
    /// Time until the oldest call leaves the window (in seconds)
    pub reset_in_seconds: u64,
}

/// Bucket key for an interaction
pub fn rate_limit_key(chat_id: Option<ChatId>, user_id: Option<UserId>) -> String {
    match (chat_id, user_id) {
        (Some(chat), Some(user)) => format!("{}:{}", chat, user),
        (None, Some(user)) => format!("user:{}", user),
        (Some(chat), None) => format!("chat:{}", chat),
        (None, None) => "global".to_string(),
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    /// Per-key call timestamps
    records: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    calls: u32,
    window: Duration,
    cleanup_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl RateLimiter {
    pub fn new(calls: u32, window: Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            calls,
            window,
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.calls, Duration::from_secs(config.per_seconds))
    }

    /// Check and record in one operation
    pub async fn check_and_record(&self, key: &str) -> RateLimitResult {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut records = self.records.write().await;
        let key_records = records.entry(key.to_string()).or_default();

        key_records.retain(|t| now.duration_since(*t) < self.window);

        if key_records.len() as u32 >= self.calls {
            let reset_in = key_records
                .first()
                .map(|oldest| {
                    self.window
                        .saturating_sub(now.duration_since(*oldest))
                        .as_secs()
                })
                .unwrap_or(self.window.as_secs());

            return RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_in_seconds: reset_in,
            };
        }

        key_records.push(now);

        RateLimitResult {
            allowed: true,
            remaining: self.calls.saturating_sub(key_records.len() as u32),
            reset_in_seconds: self.window.as_secs(),
        }
    }

    async fn maybe_cleanup(&self) {
        let should_cleanup = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };

        if should_cleanup {
            let mut last = self.last_cleanup.write().await;
            *last = Instant::now();

            let now = Instant::now();
            let mut records = self.records.write().await;

            for key_records in records.values_mut() {
                key_records.retain(|t| now.duration_since(*t) < self.window);
            }

            records.retain(|_, v| !v.is_empty());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
