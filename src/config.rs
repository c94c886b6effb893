//! Configuration module for the Flux cockpit.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 16127)
    pub http_port: u16,
    /// Hard timeout applied to every probe (default: 15s)
    pub probe_timeout: Duration,
    /// How long an aggregate report stays fresh in the cache (default: 30s)
    pub cache_ttl: Duration,
    /// Upper bound on concurrent outbound probe requests (default: 8)
    pub max_concurrent_probes: usize,
    /// Background refresh interval; zero disables the refresher (default: 0)
    pub refresh_interval: Duration,
    /// Base URL of the Flux network daemon API
    pub network_url: String,
    /// Base URL of the block explorer API
    pub explorer_url: String,
    /// Base URL of the statistics service API
    pub stats_url: String,
    /// Base URL of the Flux AI inference API
    pub ai_url: String,
    /// API key sent as `X-API-Key` to targets that require auth
    pub ai_api_key: Option<String>,
    /// User-Agent header for outbound probes
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 16127,
            probe_timeout: Duration::from_millis(15_000),
            cache_ttl: Duration::from_secs(30),
            max_concurrent_probes: 8,
            refresh_interval: Duration::ZERO,
            network_url: "https://api.runonflux.io".to_string(),
            explorer_url: "https://explorer.runonflux.io/api".to_string(),
            stats_url: "https://stats.runonflux.io/api".to_string(),
            ai_url: "https://ai.runonflux.com".to_string(),
            ai_api_key: None,
            user_agent: "FluxCockpit/1.0".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FLUX_COCKPIT_HTTP_PORT`: HTTP port (default: 16127)
    /// - `FLUX_COCKPIT_PROBE_TIMEOUT_MS`: per-probe timeout (default: 15000)
    /// - `FLUX_COCKPIT_CACHE_TTL_SECS`: report cache TTL (default: 30)
    /// - `FLUX_COCKPIT_MAX_CONCURRENT_PROBES`: outbound concurrency (default: 8)
    /// - `FLUX_COCKPIT_REFRESH_INTERVAL_SECS`: background refresh, 0 = off (default: 0)
    /// - `FLUX_COCKPIT_NETWORK_URL`, `FLUX_COCKPIT_EXPLORER_URL`,
    ///   `FLUX_COCKPIT_STATS_URL`, `FLUX_COCKPIT_AI_URL`: upstream base URLs
    /// - `FLUX_COCKPIT_AI_API_KEY`: AI provider key (no default)
    /// - `FLUX_COCKPIT_USER_AGENT`: outbound User-Agent
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parsed(&lookup, "FLUX_COCKPIT_HTTP_PORT") {
            cfg.http_port = port;
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "FLUX_COCKPIT_PROBE_TIMEOUT_MS") {
            if ms > 0 {
                cfg.probe_timeout = Duration::from_millis(ms);
            }
        }
        if let Some(secs) = parsed(&lookup, "FLUX_COCKPIT_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = parsed::<usize, _>(&lookup, "FLUX_COCKPIT_MAX_CONCURRENT_PROBES") {
            cfg.max_concurrent_probes = n.max(1);
        }
        if let Some(secs) = parsed(&lookup, "FLUX_COCKPIT_REFRESH_INTERVAL_SECS") {
            cfg.refresh_interval = Duration::from_secs(secs);
        }

        if let Some(url) = non_empty(&lookup, "FLUX_COCKPIT_NETWORK_URL") {
            cfg.network_url = url;
        }
        if let Some(url) = non_empty(&lookup, "FLUX_COCKPIT_EXPLORER_URL") {
            cfg.explorer_url = url;
        }
        if let Some(url) = non_empty(&lookup, "FLUX_COCKPIT_STATS_URL") {
            cfg.stats_url = url;
        }
        if let Some(url) = non_empty(&lookup, "FLUX_COCKPIT_AI_URL") {
            cfg.ai_url = url;
        }
        cfg.ai_api_key = non_empty(&lookup, "FLUX_COCKPIT_AI_API_KEY");
        if let Some(ua) = non_empty(&lookup, "FLUX_COCKPIT_USER_AGENT") {
            cfg.user_agent = ua;
        }

        cfg
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
