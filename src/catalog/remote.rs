//! Remote Catalog Fetching
//!
//! Pulls `{id, name, context_length}` records from a catalog endpoint.
//! Transport or parse failures produce an empty update so the caller keeps
//! its previous catalog.

use crate::config::RemoteCatalogConfig;
use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// One model record from the remote catalog
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteModel {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub context_length: Option<u64>,
}

/// Catalog payload: either `{"data": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    Wrapped { data: Vec<RemoteModel> },
    Bare(Vec<RemoteModel>),
}

impl CatalogPayload {
    fn into_models(self) -> Vec<RemoteModel> {
        match self {
            CatalogPayload::Wrapped { data } => data,
            CatalogPayload::Bare(models) => models,
        }
    }
}

/// Client for the remote model catalog endpoint
pub struct RemoteCatalog {
    client: reqwest::Client,
    config: RemoteCatalogConfig,
}

impl RemoteCatalog {
    pub fn new(config: RemoteCatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| crate::error::SwitchboardError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Provider the adopted models are attached to
    pub fn attach_to(&self) -> &str {
        &self.config.attach_to
    }

    /// Fetch the remote model list. Any failure is logged and yields an
    /// empty list.
    pub async fn fetch(&self) -> Vec<RemoteModel> {
        let response = match self.client.get(&self.config.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %self.config.url, error = %e, "catalog fetch failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(url = %self.config.url, status = %response.status(), "catalog fetch rejected");
            return Vec::new();
        }

        match response.json::<CatalogPayload>().await {
            Ok(payload) => {
                let models = payload.into_models();
                debug!(count = models.len(), "fetched remote catalog");
                models
            }
            Err(e) => {
                warn!(url = %self.config.url, error = %e, "catalog payload did not parse");
                Vec::new()
            }
        }
    }

    /// Apply the configured filter and return the adopted model ids
    pub fn adopt(&self, models: Vec<RemoteModel>) -> Vec<String> {
        filter_models(models, self.config.filter.as_deref())
            .into_iter()
            .map(|m| m.id)
            .collect()
    }
}

/// Keep models whose id contains `pattern` (case-insensitive); `None` keeps
/// everything
pub fn filter_models(models: Vec<RemoteModel>, pattern: Option<&str>) -> Vec<RemoteModel> {
    match pattern {
        None => models,
        Some(pattern) => {
            let needle = pattern.to_lowercase();
            models
                .into_iter()
                .filter(|m| m.id.to_lowercase().contains(&needle))
                .collect()
        }
    }
}
