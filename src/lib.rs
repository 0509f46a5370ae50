//! Switchboard - Provider-Fallback Chat Completion Router
//!
//! Takes a chat completion request and reliably obtains a non-empty,
//! non-error textual response from one of several interchangeable backend
//! providers, escalating through a rotating pool of HTTP/SOCKS proxies when
//! direct calls are blocked.

use std::sync::Arc;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod provider;
pub mod proxy;
pub mod router;

pub use api::Message;
pub use catalog::{CatalogHandle, ModelCatalog, ProviderDescriptor, RemoteCatalog};
pub use config::{Config, ConfigLoader, RouterPolicy};
pub use error::{ExhaustionReport, Result, SwitchboardError};
pub use provider::{ChatProvider, ProviderRegistry};
pub use proxy::{ProxyEndpoint, ProxyPool, Scheme};
pub use router::{Router, UserContext};

/// The main entry point: configured router, catalog and proxy pool
pub struct Switchboard {
    router: Router,
    catalog: Arc<CatalogHandle>,
    remote: Option<RemoteCatalog>,
    system_prompt: Option<String>,
}

impl Switchboard {
    /// Create a new instance with configuration from default locations
    pub fn new() -> Result<Self> {
        let loader = ConfigLoader::new()?;
        Self::from_config(loader.into_config())
    }

    /// Create an instance with a specific config file
    pub fn with_config_path(path: &str) -> Result<Self> {
        let loader = ConfigLoader::from_path(path)?;
        Self::from_config(loader.into_config())
    }

    /// Create an instance from a config object
    pub fn from_config(config: Config) -> Result<Self> {
        let catalog = Arc::new(CatalogHandle::new(ModelCatalog::from_config(&config)?));
        let registry = ProviderRegistry::from_config(&config)?;
        let pool = Arc::new(ProxyPool::new(config.proxy.clone())?);
        let remote = config
            .catalog
            .clone()
            .map(RemoteCatalog::new)
            .transpose()?;

        let system_prompt = config.policy.system_prompt.clone();
        let router = Router::new(
            registry,
            catalog.clone(),
            pool,
            config.policy.clone(),
            config.priority.clone(),
        );

        Ok(Self {
            router,
            catalog,
            remote,
            system_prompt,
        })
    }

    /// Obtain a completion for an explicit message list
    pub async fn request(&self, messages: &[Message], model: &str) -> Result<String> {
        self.router.request(messages, model).await
    }

    /// Obtain a completion for a caller context, resolving the model from
    /// the caller's preference or the catalog default
    pub async fn request_for(
        &self,
        messages: &[Message],
        context: &UserContext,
    ) -> Result<String> {
        let model = self.router.resolve_model(context)?;
        self.router.request(messages, &model).await
    }

    /// Convenience wrapper: single user prompt, with the configured system
    /// prompt prepended when present
    pub async fn request_text(&self, prompt: &str, model: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        self.request(&messages, model).await
    }

    /// Refresh the model catalog from the configured remote endpoint.
    /// Returns whether a new catalog was installed; without a configured
    /// endpoint this is a no-op.
    pub async fn refresh_catalog(&self) -> bool {
        match &self.remote {
            Some(remote) => self.catalog.refresh(remote).await,
            None => false,
        }
    }

    /// Model identifiers currently in the catalog
    pub fn models(&self) -> Vec<String> {
        self.catalog
            .snapshot()
            .models()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Provider names currently in the catalog
    pub fn providers(&self) -> Vec<String> {
        self.catalog
            .snapshot()
            .providers()
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    /// Default model used when a caller has no preference
    pub fn default_model(&self) -> Option<String> {
        self.catalog
            .snapshot()
            .default_model()
            .map(str::to_string)
    }
}

/// Install a tracing subscriber reading `RUST_LOG`, for embedders that have
/// none of their own. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
