//! Reconnection policy: exponential backoff with jitter.
//!
//! The jitter desynchronizes many clients reconnecting after a shared
//! upstream blip; without it they would all hammer the endpoint on the
//! same schedule.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Configuration for reconnection backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay of the first attempt.
    pub base_delay: Duration,
    /// Ceiling for the pre-jitter delay.
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added per attempt.
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(200),
        }
    }
}

impl ReconnectConfig {
    /// Pull the relevant fields out of [`StreamSettings`].
    pub fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            base_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            jitter: settings.reconnect_jitter,
        }
    }

    /// Pre-jitter delay for a 1-based attempt number:
    /// `min(max_delay, base_delay * 2^(attempt - 1))`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(1 << exponent);
        Duration::from_millis(millis).min(self.max_delay)
    }
}

/// Tracks consecutive reconnect attempts and produces their delays.
///
/// The attempt counter increments on every scheduled reconnect and resets
/// to zero only on a successful open.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Create a policy over a config.
    pub const fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Schedule the next attempt: bumps the counter and returns the
    /// jittered delay to sleep before reconnecting.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        let base = self.config.base_delay_for(self.attempt);
        let jitter = if self.config.jitter.is_zero() {
            Duration::ZERO
        } else {
            let mut rng = rand::rng();
            rng.random_range(Duration::ZERO..=self.config.jitter)
        };
        base + jitter
    }

    /// Reset after a successful open.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts since the last successful open.
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}
