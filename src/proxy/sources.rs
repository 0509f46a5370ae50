//! Proxy List Sources
//!
//! Two explicit endpoint sources: the hand-curated trusted table and
//! best-effort bulk fetches from public proxy-list APIs. Parsing and the
//! merge/priority policy are pure functions, separated from the fetching.

use crate::config::{ProxySource, SourceFormat, TrustedProxy};
use crate::proxy::{ProxyEndpoint, Scheme};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One record from a JSON proxy-list payload. Sources disagree on field
/// shapes; ports in particular arrive both as numbers and strings.
#[derive(Debug, Deserialize)]
struct JsonProxyRecord {
    #[serde(default)]
    ip: Option<String>,

    #[serde(default)]
    port: Option<serde_json::Value>,

    #[serde(default)]
    protocols: Vec<String>,

    #[serde(default)]
    protocol: Option<String>,
}

/// JSON payload: either a bare array or wrapped in `data`/`results`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonProxyPayload {
    Bare(Vec<JsonProxyRecord>),
    Data { data: Vec<JsonProxyRecord> },
    Results { results: Vec<JsonProxyRecord> },
}

impl JsonProxyPayload {
    fn into_records(self) -> Vec<JsonProxyRecord> {
        match self {
            JsonProxyPayload::Bare(records) => records,
            JsonProxyPayload::Data { data } => data,
            JsonProxyPayload::Results { results } => results,
        }
    }
}

/// Parse a plain `ip:port`-per-line payload
pub fn parse_plain_list(body: &str, scheme: Scheme) -> Vec<ProxyEndpoint> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || !line.contains(':') {
                return None;
            }
            let (host, port) = line.rsplit_once(':')?;
            let port: u16 = port.parse().ok()?;
            Some(ProxyEndpoint::new(scheme, host, port))
        })
        .collect()
}

/// Parse a JSON proxy-list payload, one endpoint per advertised protocol
pub fn parse_json_list(body: &str) -> Vec<ProxyEndpoint> {
    let payload: JsonProxyPayload = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "proxy list payload did not parse as JSON");
            return Vec::new();
        }
    };

    let mut endpoints = Vec::new();
    for record in payload.into_records() {
        let Some(ip) = record.ip else { continue };
        let Some(port) = record.port.as_ref().and_then(coerce_port) else {
            continue;
        };

        let mut protocols: Vec<String> = record.protocols;
        if protocols.is_empty() {
            if let Some(protocol) = record.protocol {
                protocols.push(protocol);
            }
        }

        for protocol in protocols {
            if let Some(scheme) = parse_scheme(&protocol) {
                endpoints.push(ProxyEndpoint::new(scheme, &ip, port));
            }
        }
    }
    endpoints
}

fn coerce_port(value: &serde_json::Value) -> Option<u16> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_scheme(protocol: &str) -> Option<Scheme> {
    match protocol.to_lowercase().as_str() {
        "http" => Some(Scheme::Http),
        "https" => Some(Scheme::Https),
        "socks5" => Some(Scheme::Socks5),
        _ => None,
    }
}

/// Trusted table as endpoints, ordered by descending reported uptime
pub fn trusted_endpoints(trusted: &[TrustedProxy]) -> Vec<ProxyEndpoint> {
    let mut ranked: Vec<&TrustedProxy> = trusted.iter().collect();
    ranked.sort_by(|a, b| {
        b.uptime
            .partial_cmp(&a.uptime)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .map(|t| ProxyEndpoint::new(t.protocol, &t.ip, t.port))
        .collect()
}

/// Merge trusted and fetched endpoints, trusted first, deduplicated by URL
pub fn merge(trusted: Vec<ProxyEndpoint>, fetched: Vec<ProxyEndpoint>) -> Vec<ProxyEndpoint> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for endpoint in trusted.into_iter().chain(fetched) {
        if seen.insert(endpoint.url.clone()) {
            merged.push(endpoint);
        }
    }
    merged
}

/// Fetch every configured source concurrently. Failures of individual
/// sources are logged and swallowed; the result is whatever parsed.
pub async fn fetch_all(client: &reqwest::Client, sources: &[ProxySource]) -> Vec<ProxyEndpoint> {
    let fetches = sources.iter().map(|source| fetch_one(client, source));
    let results = futures::future::join_all(fetches).await;
    results.into_iter().flatten().collect()
}

async fn fetch_one(client: &reqwest::Client, source: &ProxySource) -> Vec<ProxyEndpoint> {
    let response = match client.get(&source.url).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(url = %source.url, error = %e, "proxy source fetch failed");
            return Vec::new();
        }
    };

    if !response.status().is_success() {
        warn!(url = %source.url, status = %response.status(), "proxy source rejected request");
        return Vec::new();
    }

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            warn!(url = %source.url, error = %e, "proxy source body unreadable");
            return Vec::new();
        }
    };

    let endpoints = match source.format {
        SourceFormat::PlainText => parse_plain_list(&body, source.scheme),
        SourceFormat::Json => parse_json_list(&body),
    };
    debug!(url = %source.url, count = endpoints.len(), "fetched proxy source");
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_list_parsing_skips_garbage() {
        let body = "1.2.3.4:8080\n\nnot-a-proxy\n5.6.7.8:99999\n9.9.9.9:3128  \n";
        let endpoints = parse_plain_list(body, Scheme::Http);
        let urls: Vec<&str> = endpoints.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["http://1.2.3.4:8080", "http://9.9.9.9:3128"]);
    }

    #[test]
    fn json_list_parsing_handles_protocol_variants() {
        let body = r#"[
            {"ip": "1.1.1.1", "port": 80, "protocols": ["http", "socks5"]},
            {"ip": "2.2.2.2", "port": "8080", "protocol": "https"},
            {"ip": "3.3.3.3", "port": 1080, "protocols": ["socks4"]},
            {"port": 80, "protocols": ["http"]}
        ]"#;

        let endpoints = parse_json_list(body);
        let urls: Vec<&str> = endpoints.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://1.1.1.1:80",
                "socks5://1.1.1.1:80",
                "https://2.2.2.2:8080"
            ]
        );
    }

    #[test]
    fn json_list_parsing_handles_wrapped_payloads() {
        let body = r#"{"data": [{"ip": "1.1.1.1", "port": 80, "protocols": ["http"]}]}"#;
        assert_eq!(parse_json_list(body).len(), 1);

        let body = r#"{"results": [{"ip": "1.1.1.1", "port": 80, "protocol": "http"}]}"#;
        assert_eq!(parse_json_list(body).len(), 1);

        assert!(parse_json_list("<html>").is_empty());
    }

    #[test]
    fn trusted_ordering_is_descending_uptime() {
        let trusted = vec![
            TrustedProxy {
                ip: "1.1.1.1".to_string(),
                port: 80,
                protocol: Scheme::Http,
                uptime: 80.0,
                speed: 1000,
            },
            TrustedProxy {
                ip: "2.2.2.2".to_string(),
                port: 80,
                protocol: Scheme::Socks5,
                uptime: 96.0,
                speed: 9000,
            },
            TrustedProxy {
                ip: "3.3.3.3".to_string(),
                port: 80,
                protocol: Scheme::Http,
                uptime: 90.0,
                speed: 5000,
            },
        ];

        let ordered = trusted_endpoints(&trusted);
        let urls: Vec<&str> = ordered.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["socks5://2.2.2.2:80", "http://3.3.3.3:80", "http://1.1.1.1:80"]
        );
    }

    #[test]
    fn merge_keeps_trusted_priority_and_dedupes() {
        let trusted = vec![ProxyEndpoint::new(Scheme::Http, "1.1.1.1", 80)];
        let fetched = vec![
            ProxyEndpoint::new(Scheme::Http, "1.1.1.1", 80),
            ProxyEndpoint::new(Scheme::Http, "2.2.2.2", 80),
        ];

        let merged = merge(trusted, fetched);
        let urls: Vec<&str> = merged.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["http://1.1.1.1:80", "http://2.2.2.2:80"]);
    }

    #[tokio::test]
    async fn fetch_all_swallows_individual_failures() {
        let mut server = mockito::Server::new_async().await;
        let _good = server
            .mock("GET", "/good.txt")
            .with_status(200)
            .with_body("1.2.3.4:8080\n")
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/bad.txt")
            .with_status(500)
            .create_async()
            .await;

        let sources = vec![
            ProxySource {
                url: format!("{}/bad.txt", server.url()),
                format: SourceFormat::PlainText,
                scheme: Scheme::Http,
            },
            ProxySource {
                url: format!("{}/good.txt", server.url()),
                format: SourceFormat::PlainText,
                scheme: Scheme::Http,
            },
        ];

        let client = reqwest::Client::new();
        let endpoints = fetch_all(&client, &sources).await;
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, "http://1.2.3.4:8080");
    }
}
