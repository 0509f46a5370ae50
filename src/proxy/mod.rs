//! Proxy Pool
//!
//! Maintains a rotating set of proxy endpoints and serves one known-good
//! endpoint on demand. The pool degrades to "no proxy available" instead of
//! raising: every probe error is caught and recorded.

pub mod sources;

use crate::config::ProxyConfig;
use crate::error::{Result, SwitchboardError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROBE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Transport scheme of a proxy endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
    Socks5,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proxy endpoint address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    /// Full URL, e.g. `socks5://1.2.3.4:1080`
    pub url: String,

    pub scheme: Scheme,
}

impl ProxyEndpoint {
    pub fn new(scheme: Scheme, host: &str, port: u16) -> Self {
        Self {
            url: format!("{}://{}:{}", scheme, host, port),
            scheme,
        }
    }

    /// Parse a `scheme://host:port` string; unknown schemes are rejected
    pub fn parse(url: &str) -> Option<Self> {
        let scheme = if url.starts_with("socks5://") {
            Scheme::Socks5
        } else if url.starts_with("https://") {
            Scheme::Https
        } else if url.starts_with("http://") {
            Scheme::Http
        } else {
            return None;
        };
        Some(Self {
            url: url.to_string(),
            scheme,
        })
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Bookkeeping for an endpoint that passed a probe
#[derive(Debug, Clone)]
struct WorkingEntry {
    last_check: Instant,
    latency: Duration,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Merged trusted + bulk-fetched endpoint list from the last refresh
    fetched: Vec<ProxyEndpoint>,

    /// Endpoints that passed a probe, keyed by URL
    working: HashMap<String, WorkingEntry>,

    /// Endpoints that failed probing; cleared on pool refresh, not
    /// individually
    failed: HashSet<String>,

    last_refresh: Option<Instant>,
}

/// Point-in-time pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub candidates: usize,
    pub working: usize,
    pub failed: usize,
    pub refreshed: bool,
}

/// Rotating pool of proxy endpoints with liveness probing
pub struct ProxyPool {
    config: ProxyConfig,
    client: reqwest::Client,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SwitchboardError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            state: Mutex::new(PoolState::default()),
        })
    }

    /// Produce one currently-reachable endpoint, or `None`.
    ///
    /// Refreshes the cached list when stale or empty, probes candidates in
    /// priority order (trusted by descending uptime, then known-working,
    /// then newly fetched), and falls back to one forced refresh before
    /// giving up.
    pub async fn acquire(&self) -> Option<ProxyEndpoint> {
        {
            // Single mutual-exclusion region around check-staleness-then-
            // refresh: callers arriving during a refresh wait on this lock
            // instead of starting a duplicate.
            let mut state = self.state.lock().await;
            if self.needs_refresh(&state) {
                self.refresh_locked(&mut state).await;
            }
        }

        if let Some(endpoint) = self.sweep().await {
            return Some(endpoint);
        }

        // Everything failed: force one unconditional refresh and retry the
        // probe sequence once.
        {
            let mut state = self.state.lock().await;
            self.refresh_locked(&mut state).await;
        }
        self.sweep().await
    }

    /// Probe candidates in priority order, returning the first that passes
    async fn sweep(&self) -> Option<ProxyEndpoint> {
        let (known_working, fetched) = {
            let state = self.state.lock().await;
            let mut working: Vec<(&String, &WorkingEntry)> = state.working.iter().collect();
            working.sort_by_key(|(_, entry)| entry.latency);
            let known: Vec<ProxyEndpoint> = working
                .into_iter()
                .take(5)
                .filter_map(|(url, _)| ProxyEndpoint::parse(url))
                .collect();
            (known, state.fetched.clone())
        };

        for endpoint in sources::trusted_endpoints(&self.config.trusted) {
            if self.verify(&endpoint).await {
                return Some(endpoint);
            }
        }

        for endpoint in known_working {
            if self.verify(&endpoint).await {
                return Some(endpoint);
            }
        }

        for endpoint in fetched {
            if self.verify(&endpoint).await {
                return Some(endpoint);
            }
        }

        None
    }

    /// Verify an endpoint is alive.
    ///
    /// Failed endpoints are refused without probing until the next pool
    /// refresh; working endpoints fresher than the recheck window are
    /// trusted without a new probe.
    pub async fn verify(&self, endpoint: &ProxyEndpoint) -> bool {
        {
            let state = self.state.lock().await;
            if state.failed.contains(&endpoint.url) {
                return false;
            }
            if let Some(entry) = state.working.get(&endpoint.url) {
                if entry.last_check.elapsed() < self.config.recheck_window() {
                    return true;
                }
            }
        }

        match self.probe(endpoint).await {
            Some(latency) => {
                let mut state = self.state.lock().await;
                state.working.insert(
                    endpoint.url.clone(),
                    WorkingEntry {
                        last_check: Instant::now(),
                        latency,
                    },
                );
                info!(proxy = %endpoint.url, latency_ms = latency.as_millis() as u64, "proxy passed liveness probe");
                true
            }
            None => {
                let mut state = self.state.lock().await;
                state.failed.insert(endpoint.url.clone());
                state.working.remove(&endpoint.url);
                debug!(proxy = %endpoint.url, "proxy failed liveness probe");
                false
            }
        }
    }

    /// Issue a short-timeout GET against the configured IP-echo services
    /// through the endpoint. Any one succeeding validates the proxy.
    async fn probe(&self, endpoint: &ProxyEndpoint) -> Option<Duration> {
        let proxy = reqwest::Proxy::all(&endpoint.url).ok()?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.config.probe_timeout())
            .build()
            .ok()?;

        for echo_url in &self.config.echo_urls {
            let started = Instant::now();
            let response = match client
                .get(echo_url)
                .header(reqwest::header::USER_AGENT, PROBE_USER_AGENT)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(proxy = %endpoint.url, echo = %echo_url, error = %e, "probe request failed");
                    continue;
                }
            };

            if response.status() != reqwest::StatusCode::OK {
                continue;
            }

            match response.text().await {
                Ok(body) if body_reports_ip(&body) => return Some(started.elapsed()),
                Ok(_) => continue,
                Err(_) => continue,
            }
        }

        None
    }

    fn needs_refresh(&self, state: &PoolState) -> bool {
        if state.fetched.is_empty() {
            return true;
        }
        match state.last_refresh {
            None => true,
            Some(at) => at.elapsed() > self.config.cache_window(),
        }
    }

    /// Refresh the endpoint list: merge the trusted table with best-effort
    /// bulk fetches, clear the failed set, and prune stale working entries.
    async fn refresh_locked(&self, state: &mut PoolState) {
        let fetched = sources::fetch_all(&self.client, &self.config.sources).await;
        state.fetched = sources::merge(
            sources::trusted_endpoints(&self.config.trusted),
            fetched,
        );
        state.failed.clear();

        let cache_window = self.config.cache_window();
        state
            .working
            .retain(|_, entry| entry.last_check.elapsed() < cache_window);

        state.last_refresh = Some(Instant::now());
        info!(count = state.fetched.len(), "proxy pool refreshed");

        if state.fetched.is_empty() {
            warn!("proxy pool refresh produced no candidates");
        }
    }

    /// Snapshot of pool bookkeeping, for diagnostics and tests
    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            candidates: state.fetched.len(),
            working: state.working.len(),
            failed: state.failed.len(),
            refreshed: state.last_refresh.is_some(),
        }
    }
}

/// Whether an echo-service body plausibly reports the caller's IP: a JSON
/// object with an `ip` or `query` field, or free text containing a
/// dot-delimited token.
pub fn body_reports_ip(body: &str) -> bool {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if value.get("ip").is_some() || value.get("query").is_some() {
            return true;
        }
    }
    let trimmed = body.trim();
    !trimmed.is_empty() && trimmed.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parse_roundtrip() {
        let endpoint = ProxyEndpoint::new(Scheme::Socks5, "1.2.3.4", 1080);
        assert_eq!(endpoint.url, "socks5://1.2.3.4:1080");

        let parsed = ProxyEndpoint::parse(&endpoint.url).unwrap();
        assert_eq!(parsed, endpoint);

        assert!(ProxyEndpoint::parse("ftp://1.2.3.4:21").is_none());
    }

    #[test]
    fn echo_body_recognition() {
        assert!(body_reports_ip(r#"{"ip": "1.2.3.4"}"#));
        assert!(body_reports_ip(r#"{"query": "1.2.3.4", "country": "DE"}"#));
        assert!(body_reports_ip("93.184.216.34\n"));
        assert!(!body_reports_ip(""));
        assert!(!body_reports_ip("error"));
        assert!(!body_reports_ip(r#"{"status": "fail"}"#));
    }
}
