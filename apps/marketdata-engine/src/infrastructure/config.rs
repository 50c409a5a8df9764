//! Engine configuration, loaded from environment variables.
//!
//! Every knob has a default matching the public Polymarket deployment;
//! unset or unparseable variables silently fall back to it.

use std::time::Duration;

use url::Url;

use super::http::HttpSettings;
use super::ratelimit::RateRule;

/// Base URLs of the three upstream REST services and the stream endpoint.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    /// Market discovery API.
    pub gamma_base: String,
    /// Order book / price / history API.
    pub clob_base: String,
    /// Holders / trades API.
    pub data_api_base: String,
    /// Market data WebSocket endpoint.
    pub stream_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            gamma_base: "https://gamma-api.polymarket.com".to_string(),
            clob_base: "https://clob.polymarket.com".to_string(),
            data_api_base: "https://data-api.polymarket.com".to_string(),
            stream_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Silence threshold before the connection is declared stale and
    /// force-closed.
    pub stale_after: Duration,
    /// How often the staleness watchdog checks.
    pub watchdog_tick: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Upper bound of the random jitter added to each reconnect delay.
    pub reconnect_jitter: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(15),
            watchdog_tick: Duration::from_secs(2),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_jitter: Duration::from_millis(200),
        }
    }
}

/// REST poll cadences and page sizes.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Order book (and REST quote fallback) poll interval.
    pub book_interval: Duration,
    /// Price history poll interval.
    pub history_interval: Duration,
    /// Holder list poll interval.
    pub holders_interval: Duration,
    /// History range parameter, e.g. `1d`.
    pub history_range: String,
    /// History resolution in minutes.
    pub history_fidelity: u32,
    /// Number of holder rows requested.
    pub holders_limit: u32,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            book_interval: Duration::from_secs(3),
            history_interval: Duration::from_secs(30),
            holders_interval: Duration::from_secs(60),
            history_range: "1d".to_string(),
            history_fidelity: 10,
            holders_limit: 20,
        }
    }
}

/// Staleness thresholds per reconciled sub-state, and the window during
/// which stream-sourced quotes take precedence over REST polls.
#[derive(Debug, Clone)]
pub struct StalenessSettings {
    /// Live quote threshold.
    pub quote: Duration,
    /// Order book threshold.
    pub book: Duration,
    /// Price history threshold.
    pub history: Duration,
    /// Holder list threshold.
    pub holders: Duration,
    /// A REST quote may not overwrite a stream quote younger than this.
    pub stream_priority_window: Duration,
}

impl Default for StalenessSettings {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(10),
            book: Duration::from_secs(15),
            history: Duration::from_secs(120),
            holders: Duration::from_secs(300),
            stream_priority_window: Duration::from_secs(5),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upstream endpoints.
    pub endpoints: ApiEndpoints,
    /// Request client tuning.
    pub http: HttpSettings,
    /// WebSocket tuning.
    pub stream: StreamSettings,
    /// REST poll cadences.
    pub refresh: RefreshSettings,
    /// Staleness thresholds.
    pub staleness: StalenessSettings,
    /// Outbound rate-limit rules.
    pub rate_limits: Vec<RateRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let endpoints = ApiEndpoints::default();
        let rate_limits = default_rate_limits(&endpoints);
        Self {
            endpoints,
            http: HttpSettings::default(),
            stream: StreamSettings::default(),
            refresh: RefreshSettings::default(),
            staleness: StalenessSettings::default(),
            rate_limits,
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = ApiEndpoints::default();
        let endpoints = ApiEndpoints {
            gamma_base: parse_env_string("MARKET_ENGINE_GAMMA_URL", defaults.gamma_base),
            clob_base: parse_env_string("MARKET_ENGINE_CLOB_URL", defaults.clob_base),
            data_api_base: parse_env_string("MARKET_ENGINE_DATA_API_URL", defaults.data_api_base),
            stream_url: parse_env_string("MARKET_ENGINE_STREAM_URL", defaults.stream_url),
        };

        let http = HttpSettings {
            timeout: parse_env_duration_millis(
                "MARKET_ENGINE_HTTP_TIMEOUT_MS",
                HttpSettings::default().timeout,
            ),
            retries: parse_env_u32("MARKET_ENGINE_HTTP_RETRIES", HttpSettings::default().retries),
            backoff_base: parse_env_duration_millis(
                "MARKET_ENGINE_HTTP_BACKOFF_BASE_MS",
                HttpSettings::default().backoff_base,
            ),
            backoff_max: parse_env_duration_millis(
                "MARKET_ENGINE_HTTP_BACKOFF_MAX_MS",
                HttpSettings::default().backoff_max,
            ),
        };

        let stream = StreamSettings {
            stale_after: parse_env_duration_secs(
                "MARKET_ENGINE_STREAM_STALE_AFTER_SECS",
                StreamSettings::default().stale_after,
            ),
            watchdog_tick: parse_env_duration_millis(
                "MARKET_ENGINE_STREAM_WATCHDOG_TICK_MS",
                StreamSettings::default().watchdog_tick,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "MARKET_ENGINE_RECONNECT_DELAY_INITIAL_MS",
                StreamSettings::default().reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "MARKET_ENGINE_RECONNECT_DELAY_MAX_SECS",
                StreamSettings::default().reconnect_delay_max,
            ),
            reconnect_jitter: parse_env_duration_millis(
                "MARKET_ENGINE_RECONNECT_JITTER_MS",
                StreamSettings::default().reconnect_jitter,
            ),
        };

        let refresh = RefreshSettings {
            book_interval: parse_env_duration_millis(
                "MARKET_ENGINE_BOOK_REFRESH_MS",
                RefreshSettings::default().book_interval,
            ),
            history_interval: parse_env_duration_secs(
                "MARKET_ENGINE_HISTORY_REFRESH_SECS",
                RefreshSettings::default().history_interval,
            ),
            holders_interval: parse_env_duration_secs(
                "MARKET_ENGINE_HOLDERS_REFRESH_SECS",
                RefreshSettings::default().holders_interval,
            ),
            history_range: parse_env_string(
                "MARKET_ENGINE_HISTORY_RANGE",
                RefreshSettings::default().history_range,
            ),
            history_fidelity: parse_env_u32(
                "MARKET_ENGINE_HISTORY_FIDELITY",
                RefreshSettings::default().history_fidelity,
            ),
            holders_limit: parse_env_u32(
                "MARKET_ENGINE_HOLDERS_LIMIT",
                RefreshSettings::default().holders_limit,
            ),
        };

        let staleness = StalenessSettings {
            quote: parse_env_duration_secs(
                "MARKET_ENGINE_STALE_QUOTE_SECS",
                StalenessSettings::default().quote,
            ),
            book: parse_env_duration_secs(
                "MARKET_ENGINE_STALE_BOOK_SECS",
                StalenessSettings::default().book,
            ),
            history: parse_env_duration_secs(
                "MARKET_ENGINE_STALE_HISTORY_SECS",
                StalenessSettings::default().history,
            ),
            holders: parse_env_duration_secs(
                "MARKET_ENGINE_STALE_HOLDERS_SECS",
                StalenessSettings::default().holders,
            ),
            stream_priority_window: parse_env_duration_secs(
                "MARKET_ENGINE_STREAM_PRIORITY_WINDOW_SECS",
                StalenessSettings::default().stream_priority_window,
            ),
        };

        let rate_limits = default_rate_limits(&endpoints);

        Self {
            endpoints,
            http,
            stream,
            refresh,
            staleness,
            rate_limits,
        }
    }
}

/// Default admission rules for the configured endpoints. Endpoints that
/// fail to parse simply contribute no rule (their requests bypass).
fn default_rate_limits(endpoints: &ApiEndpoints) -> Vec<RateRule> {
    let window = Duration::from_secs(10);
    let mut rules = Vec::new();

    if let Some(host) = host_of(&endpoints.gamma_base) {
        rules.push(RateRule {
            host,
            path_prefix: String::new(),
            capacity: 30,
            window,
        });
    }
    if let Some(host) = host_of(&endpoints.clob_base) {
        rules.push(RateRule {
            host: host.clone(),
            path_prefix: String::new(),
            capacity: 60,
            window,
        });
        rules.push(RateRule {
            host: host.clone(),
            path_prefix: "/book".to_string(),
            capacity: 40,
            window,
        });
        rules.push(RateRule {
            host,
            path_prefix: "/prices-history".to_string(),
            capacity: 20,
            window,
        });
    }
    if let Some(host) = host_of(&endpoints.data_api_base) {
        rules.push(RateRule {
            host,
            path_prefix: String::new(),
            capacity: 20,
            window,
        });
    }

    rules
}

fn host_of(base: &str) -> Option<String> {
    Url::parse(base)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
}

fn parse_env_string(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
