//! Provider Module
//!
//! The invocation seam between the router and concrete backends, plus the
//! outcome classification heuristics.

pub mod classify;
pub mod http;

pub use classify::{classify_error, classify_response, is_rate_limit_message, looks_like_html, Outcome};
pub use http::HttpProvider;

use crate::api::Message;
use crate::config::Config;
use crate::error::Result;
use crate::proxy::ProxyEndpoint;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A backend capable of producing a chat completion.
///
/// Implementations raise on transport or provider errors and return the raw
/// textual payload otherwise; the router classifies what came back.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider name, matching the catalog descriptor
    fn name(&self) -> &str;

    /// Produce a completion for `model`, optionally routed through `proxy`
    async fn invoke(
        &self,
        model: &str,
        messages: &[Message],
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<String>;
}

/// Registry of invocable providers keyed by name
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP backends for every configured provider entry
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for entry in &config.providers {
            registry.register(Arc::new(HttpProvider::from_entry(entry)?));
        }
        Ok(registry)
    }

    /// Register a provider, replacing any existing one with the same name
    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ChatProvider>> {
        self.providers.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
