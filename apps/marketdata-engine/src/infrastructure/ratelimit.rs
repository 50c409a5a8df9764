//! Outbound request rate limiting.
//!
//! A fixed-window token bucket per endpoint class. Admission never fails;
//! it only delays. The limiter is an explicitly constructed instance handed
//! to every call site by reference — there is no process-global state, and
//! tests isolate themselves with [`RateLimiter::reset`].
//!
//! Fixed-window semantics are deliberate: up to `2 x capacity` requests can
//! land in a short span straddling a window boundary. That matches the
//! upstream contract this limiter was written against.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use url::Url;

/// Jitter added to a window wait, lower bound.
const WAIT_JITTER_MIN: Duration = Duration::from_millis(20);
/// Jitter added to a window wait, upper bound.
const WAIT_JITTER_MAX: Duration = Duration::from_millis(120);

/// One admission rule: requests to `host` whose path starts with
/// `path_prefix` share a bucket of `capacity` tokens per `window`.
#[derive(Debug, Clone)]
pub struct RateRule {
    /// Exact host the rule applies to.
    pub host: String,
    /// Path prefix within that host; empty matches every path.
    pub path_prefix: String,
    /// Requests admitted per window.
    pub capacity: u32,
    /// Window length.
    pub window: Duration,
}

#[derive(Debug)]
struct Bucket {
    remaining: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter shared by all REST call sites.
#[derive(Debug)]
pub struct RateLimiter {
    rules: Vec<RateRule>,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter over a rule set.
    pub fn new(rules: Vec<RateRule>) -> Self {
        Self {
            rules,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// A limiter with no rules: every request bypasses.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Block until a token is available for `url`, then consume one.
    ///
    /// URLs matching no rule bypass limiting entirely. Matching picks the
    /// most specific rule: same host, longest matching path prefix.
    pub async fn admit(&self, url: &Url) {
        let Some(rule) = self.match_rule(url) else {
            return;
        };
        let key = format!("{}{}", rule.host, rule.path_prefix);

        // Explicit check -> sleep -> recheck loop; callers serialize
        // naturally by awaiting.
        loop {
            let wait = self.try_take(&key, rule.capacity, rule.window);
            match wait {
                None => return,
                Some(until_reset) => {
                    let jitter = {
                        let mut rng = rand::rng();
                        rng.random_range(WAIT_JITTER_MIN..=WAIT_JITTER_MAX)
                    };
                    tracing::debug!(
                        rule = %key,
                        wait_ms = (until_reset + jitter).as_millis() as u64,
                        "rate limit window exhausted, waiting"
                    );
                    tokio::time::sleep(until_reset + jitter).await;
                }
            }
        }
    }

    /// Take a token if one is available. Returns the remaining window
    /// duration when the bucket is empty.
    fn try_take(&self, key: &str, capacity: u32, window: Duration) -> Option<Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            remaining: capacity,
            reset_at: now + window,
        });

        if now >= bucket.reset_at {
            bucket.remaining = capacity;
            bucket.reset_at = now + window;
        }

        if bucket.remaining > 0 {
            bucket.remaining -= 1;
            None
        } else {
            Some(bucket.reset_at.saturating_duration_since(now))
        }
    }

    fn match_rule(&self, url: &Url) -> Option<&RateRule> {
        let host = url.host_str()?;
        let path = url.path();
        self.rules
            .iter()
            .filter(|r| r.host == host && path.starts_with(&r.path_prefix))
            .max_by_key(|r| r.path_prefix.len())
    }

    /// Drop all bucket state. Intended for tests.
    pub fn reset(&self) {
        self.buckets.lock().clear();
    }
}
