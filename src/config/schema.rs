//! Configuration Schema
//!
//! Everything tunable lives here: the static provider table, per-model
//! priority lists, router timing policy, proxy pool sources and the remote
//! model catalog endpoint. Timing values are policy, not law; the defaults
//! reproduce the reference deployment.

use crate::proxy::Scheme;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Static provider table; declared order is the attempt order
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,

    /// Per-model priority provider names, attempted first in declared order
    #[serde(default)]
    pub priority: HashMap<String, Vec<String>>,

    /// Router timing policy
    #[serde(default)]
    pub policy: RouterPolicy,

    /// Proxy pool configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Remote model catalog endpoint (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<RemoteCatalogConfig>,
}

/// Configuration for a single chat completion backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Stable provider name used in priority lists and session bookkeeping
    pub name: String,

    /// Base URL for the OpenAI-compatible API
    pub base_url: String,

    /// Environment variable holding the API key, if the backend needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model identifiers this backend can serve
    #[serde(default)]
    pub models: Vec<String>,

    /// Additional headers to send with requests
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Router timing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterPolicy {
    /// Bound on a single provider call
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Cooldown between proxied attempts after a rate-limit classification
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// System prompt prepended by `request_text`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            system_prompt: None,
        }
    }
}

impl RouterPolicy {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

/// Proxy pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Hand-curated endpoints probed first, ordered by descending uptime
    #[serde(default)]
    pub trusted: Vec<TrustedProxy>,

    /// Bulk proxy-list sources, fetched best-effort on refresh
    #[serde(default)]
    pub sources: Vec<ProxySource>,

    /// IP-echo endpoints used for liveness probes; any one succeeding counts
    #[serde(default = "default_echo_urls")]
    pub echo_urls: Vec<String>,

    /// Bound on a single liveness probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Window within which a working endpoint is trusted without re-probing
    #[serde(default = "default_recheck_secs")]
    pub recheck_secs: u64,

    /// Staleness window for the fetched endpoint list
    #[serde(default = "default_cache_secs")]
    pub cache_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            trusted: Vec::new(),
            sources: Vec::new(),
            echo_urls: default_echo_urls(),
            probe_timeout_secs: default_probe_timeout_secs(),
            recheck_secs: default_recheck_secs(),
            cache_secs: default_cache_secs(),
        }
    }
}

impl ProxyConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn recheck_window(&self) -> Duration {
        Duration::from_secs(self.recheck_secs)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_secs)
    }
}

/// A curated proxy endpoint with reported quality metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedProxy {
    pub ip: String,
    pub port: u16,
    pub protocol: Scheme,

    /// Reported uptime percentage; higher means probed earlier
    #[serde(default)]
    pub uptime: f64,

    /// Reported throughput, kept for operator reference
    #[serde(default)]
    pub speed: u32,
}

/// A bulk proxy-list source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySource {
    pub url: String,

    /// Payload shape served by this source
    #[serde(default)]
    pub format: SourceFormat,

    /// Scheme assumed for plain `ip:port` lines
    #[serde(default = "default_source_scheme")]
    pub scheme: Scheme,
}

/// Payload shape of a proxy-list source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// One `ip:port` per line
    #[default]
    PlainText,

    /// JSON array of records carrying `ip`, `port` and `protocols` fields
    Json,
}

/// Remote model catalog endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCatalogConfig {
    /// Endpoint returning `{id, name, context_length}` records
    pub url: String,

    /// Case-insensitive substring filter on model ids; `None` adopts all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Provider the adopted remote models are attached to
    pub attach_to: String,
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_rate_limit_cooldown_secs() -> u64 {
    5
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_recheck_secs() -> u64 {
    300
}

fn default_cache_secs() -> u64 {
    1800
}

fn default_source_scheme() -> Scheme {
    Scheme::Http
}

fn default_echo_urls() -> Vec<String> {
    vec![
        "http://ip-api.com/json".to_string(),
        "http://httpbin.org/ip".to_string(),
        "http://api.ipify.org/?format=json".to_string(),
        "http://ifconfig.me/ip".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults() {
        let policy = RouterPolicy::default();
        assert_eq!(policy.provider_timeout(), Duration::from_secs(60));
        assert_eq!(policy.rate_limit_cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn proxy_config_defaults() {
        let config: ProxyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.recheck_window(), Duration::from_secs(300));
        assert_eq!(config.cache_window(), Duration::from_secs(1800));
        assert_eq!(config.echo_urls.len(), 4);
    }

    #[test]
    fn deserialize_provider_entry() {
        let json = r#"{
            "name": "ddg",
            "base_url": "https://duckduckgo.com/aichat/v1",
            "models": ["gpt-4", "o3-mini"],
            "headers": {"x-vqd-accept": "1"}
        }"#;

        let entry: ProviderEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "ddg");
        assert_eq!(entry.models.len(), 2);
        assert!(entry.api_key_env.is_none());
    }

    #[test]
    fn deserialize_source_defaults_to_plain_http() {
        let source: ProxySource =
            serde_json::from_str(r#"{"url": "https://example.com/http.txt"}"#).unwrap();
        assert_eq!(source.format, SourceFormat::PlainText);
        assert_eq!(source.scheme, Scheme::Http);
    }
}
