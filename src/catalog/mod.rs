//! Model Catalog
//!
//! Maps model identifiers to the providers able to serve them. A catalog is
//! an immutable value built once from configuration; refreshes construct a
//! new value and swap it in, so in-flight requests keep the snapshot they
//! started with.

pub mod remote;

pub use remote::{RemoteCatalog, RemoteModel};

use crate::config::Config;
use crate::error::{Result, SwitchboardError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// A backend capable of producing chat completions for a set of models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Stable provider name
    pub name: String,

    /// Model identifiers this provider supports, in declared order
    pub models: Vec<String>,
}

impl ProviderDescriptor {
    pub fn serves(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Immutable mapping from model identifiers to capable providers
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    providers: Vec<ProviderDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog from an explicit provider table.
    ///
    /// Every model in the catalog maps to at least one provider by
    /// construction; an entirely empty table is a configuration error.
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
        if providers.iter().all(|p| p.models.is_empty()) {
            return Err(SwitchboardError::Config(
                "catalog has no provider with any model".to_string(),
            ));
        }
        Ok(Self { providers })
    }

    /// Build a catalog from the static configuration table
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = config
            .providers
            .iter()
            .map(|entry| ProviderDescriptor {
                name: entry.name.clone(),
                models: entry.models.clone(),
            })
            .collect();
        Self::new(providers)
    }

    /// All providers in declared order
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Providers capable of serving `model`, in declared order
    pub fn capable(&self, model: &str) -> Vec<&ProviderDescriptor> {
        self.providers.iter().filter(|p| p.serves(model)).collect()
    }

    /// Unique model identifiers in first-seen order
    pub fn models(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for provider in &self.providers {
            for model in &provider.models {
                if !seen.contains(&model.as_str()) {
                    seen.push(model.as_str());
                }
            }
        }
        seen
    }

    /// First model of the first provider, used when a caller has no
    /// preference
    pub fn default_model(&self) -> Option<&str> {
        self.providers
            .iter()
            .find_map(|p| p.models.first().map(String::as_str))
    }

    /// New catalog with `model_ids` attached to the provider named
    /// `attach_to`. Already-declared models keep their position; the static
    /// table is never removed from.
    pub fn with_remote_models(&self, attach_to: &str, model_ids: &[String]) -> Self {
        let mut providers = self.providers.clone();
        match providers.iter_mut().find(|p| p.name == attach_to) {
            Some(provider) => {
                for id in model_ids {
                    if !provider.models.contains(id) {
                        provider.models.push(id.clone());
                    }
                }
            }
            None => {
                warn!(provider = attach_to, "remote catalog target provider not in table");
            }
        }
        Self { providers }
    }
}

/// Shared handle to the current catalog value.
///
/// Readers take a cheap `Arc` snapshot; refreshes install a replacement
/// value. A refresh that yields nothing keeps the previous catalog: stale
/// data is preferred over empty.
pub struct CatalogHandle {
    current: RwLock<Arc<ModelCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: ModelCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Current catalog snapshot
    pub fn snapshot(&self) -> Arc<ModelCatalog> {
        self.current.read().clone()
    }

    /// Install a replacement catalog
    pub fn install(&self, catalog: ModelCatalog) {
        *self.current.write() = Arc::new(catalog);
    }

    /// Refresh from the remote catalog endpoint. Returns whether a new
    /// catalog value was installed.
    pub async fn refresh(&self, remote: &RemoteCatalog) -> bool {
        let models = remote.fetch().await;
        let adopted = remote.adopt(models);

        if adopted.is_empty() {
            warn!("remote catalog refresh yielded no viable models, keeping previous catalog");
            return false;
        }

        let next = self
            .snapshot()
            .with_remote_models(remote.attach_to(), &adopted);
        info!(count = adopted.len(), provider = remote.attach_to(), "catalog refreshed");
        self.install(next);
        true
    }
}
