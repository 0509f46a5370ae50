//! HTTP Provider Backend
//!
//! OpenAI-compatible chat completion backend over reqwest. Direct calls
//! share one pooled client; proxied calls build a throwaway client because
//! reqwest binds the proxy at client construction.

use crate::api::{CompletionRequest, CompletionResponse, Message};
use crate::config::ProviderEntry;
use crate::error::{Result, SwitchboardError};
use crate::provider::ChatProvider;
use crate::proxy::ProxyEndpoint;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible HTTP provider
pub struct HttpProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    headers: HeaderMap,
    direct: Client,
}

impl HttpProvider {
    /// Build a provider from a config table entry. The API key is resolved
    /// from the entry's environment variable at construction time.
    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let api_key = entry
            .api_key_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &entry.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            }
        }

        let direct = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                SwitchboardError::Config(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            name: entry.name.clone(),
            base_url: entry.base_url.clone(),
            api_key,
            headers,
            direct,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client> {
        match proxy {
            None => Ok(self.direct.clone()),
            Some(endpoint) => {
                let proxy = reqwest::Proxy::all(&endpoint.url).map_err(|e| {
                    SwitchboardError::ProviderTransport {
                        provider: self.name.clone(),
                        message: format!("invalid proxy '{}': {}", endpoint.url, e),
                    }
                })?;
                Client::builder()
                    .proxy(proxy)
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|e| SwitchboardError::ProviderTransport {
                        provider: self.name.clone(),
                        message: format!("failed to build proxied client: {}", e),
                    })
            }
        }
    }
}

#[async_trait]
impl ChatProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        model: &str,
        messages: &[Message],
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<String> {
        let client = self.client_for(proxy)?;
        let body = CompletionRequest::new(model.to_string(), messages.to_vec());

        let mut request = client
            .post(self.completions_url())
            .headers(self.headers.clone())
            .timeout(timeout)
            .json(&body);

        if let Some(key) = &self.api_key {
            request = request.header(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                    SwitchboardError::Config(format!("invalid API key format: {}", e))
                })?,
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| SwitchboardError::ProviderTransport {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SwitchboardError::ProviderTransport {
                provider: self.name.clone(),
                message: format!("failed to read body: {}", e),
            })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SwitchboardError::ProviderRateLimited {
                provider: self.name.clone(),
                message: format!("429: {}", truncate(&text, 200)),
            });
        }

        if !status.is_success() {
            return Err(SwitchboardError::ProviderTransport {
                provider: self.name.clone(),
                message: format!("status {}: {}", status, truncate(&text, 500)),
            });
        }

        // Free backends sometimes answer 200 with an HTML error page. Return
        // the raw body when the completion shape does not parse so the
        // router's classifier can see what actually came back.
        match serde_json::from_str::<CompletionResponse>(&text) {
            Ok(parsed) => match parsed.first_text() {
                Some(content) => Ok(content.to_string()),
                None => {
                    debug!(provider = %self.name, "completion body had no choices");
                    Ok(String::new())
                }
            },
            Err(_) => Ok(text),
        }
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
