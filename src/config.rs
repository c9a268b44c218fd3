//! Configuration loading from `.env` files.

use std::{env, time::Duration};

use anyhow::{Context, Result};

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Search-capable relay queried for the topic scan, e.g. `wss://relay.ditto.pub`.
    pub relay_search: String,
    /// Relays that new events are broadcast to.
    pub relays_publish: Vec<String>,
    /// Hex-encoded secret key used to sign outgoing events.
    pub secret_key: Option<String>,
    /// Optional Tor SOCKS proxy (host:port).
    pub tor_socks: Option<String>,
    /// HTTP bind address for `serve`, e.g. `127.0.0.1:7077`.
    pub bind_http: String,
    /// Drop fetched events whose Schnorr signature does not verify.
    pub verify_sig: bool,
    /// Aggregator constants.
    pub tuning: Tuning,
}

/// Aggregator constants. Defaults mirror the observed deployment; every one
/// can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Maximum number of comment events fetched by the primary scan.
    pub scan_limit: usize,
    /// Overall deadline for one aggregation, receipt batches included.
    pub scan_timeout: Duration,
    /// Post identifiers per zap-receipt request.
    pub zap_batch_size: usize,
    /// Overall cap on post identifiers submitted for receipt correlation.
    pub zap_scan_cap: usize,
    /// A topic is hot at this many posts.
    pub hot_min_posts: usize,
    /// A topic is hot at this many sats of zap volume.
    pub hot_min_zap_sats: u64,
    /// Topics kept in the primary ranking.
    pub topic_cap: usize,
    /// Freshness window for the served topic board.
    pub cache_ttl: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            scan_limit: 500,
            scan_timeout: Duration::from_secs(15),
            zap_batch_size: 100,
            zap_scan_cap: 300,
            hot_min_posts: 5,
            hot_min_zap_sats: 10_000,
            topic_cap: 20,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let relay_search = env::var("RELAY_SEARCH").context("RELAY_SEARCH not set")?;
        let relays_publish = csv_strings(env::var("RELAYS_PUBLISH").unwrap_or_default());
        let secret_key = env::var("SECRET_KEY").ok().filter(|s| !s.is_empty());
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        let bind_http = env::var("BIND_HTTP").context("BIND_HTTP not set")?;
        let verify_sig = env::var("VERIFY_SIG").unwrap_or_else(|_| "0".into()) == "1";
        let defaults = Tuning::default();
        let tuning = Tuning {
            scan_limit: env_parse("SCAN_LIMIT", defaults.scan_limit),
            scan_timeout: Duration::from_secs(env_parse(
                "SCAN_TIMEOUT_SECS",
                defaults.scan_timeout.as_secs(),
            )),
            zap_batch_size: env_parse("ZAP_BATCH_SIZE", defaults.zap_batch_size),
            zap_scan_cap: env_parse("ZAP_SCAN_CAP", defaults.zap_scan_cap),
            hot_min_posts: env_parse("HOT_MIN_POSTS", defaults.hot_min_posts),
            hot_min_zap_sats: env_parse("HOT_MIN_ZAP_SATS", defaults.hot_min_zap_sats),
            topic_cap: env_parse("TOPIC_CAP", defaults.topic_cap),
            cache_ttl: Duration::from_secs(env_parse(
                "CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
        };
        Ok(Self {
            relay_search,
            relays_publish,
            secret_key,
            tor_socks,
            bind_http,
            verify_sig,
            tuning,
        })
    }
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}

/// Read a numeric variable, falling back to `default` when absent or invalid.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_VARS: &[&str] = &[
    "RELAY_SEARCH",
    "RELAYS_PUBLISH",
    "SECRET_KEY",
    "TOR_SOCKS",
    "BIND_HTTP",
    "VERIFY_SIG",
    "SCAN_LIMIT",
    "SCAN_TIMEOUT_SECS",
    "ZAP_BATCH_SIZE",
    "ZAP_SCAN_CAP",
    "HOT_MIN_POSTS",
    "HOT_MIN_ZAP_SATS",
    "TOPIC_CAP",
    "CACHE_TTL_SECS",
];
