//! Configuration Loader
//!
//! Handles loading and merging configuration from built-in defaults plus
//! file-system overrides.

use crate::config::schema::{
    Config, ProviderEntry, ProxyConfig, RemoteCatalogConfig, RouterPolicy,
};
use crate::error::{Result, SwitchboardError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Partial configuration as it appears in an override file. Absent sections
/// keep the values loaded so far.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    providers: Option<Vec<ProviderEntry>>,
    priority: Option<HashMap<String, Vec<String>>>,
    policy: Option<RouterPolicy>,
    proxy: Option<ProxyConfig>,
    catalog: Option<RemoteCatalogConfig>,
}

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    config: Config,
}

impl ConfigLoader {
    /// Create a new config loader and load from default locations
    pub fn new() -> Result<Self> {
        let mut loader = Self {
            config: Config::default(),
        };

        loader.load_builtin_defaults()?;
        loader.load_from_default_paths()?;

        Ok(loader)
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self {
            config: Config::default(),
        };

        loader.load_builtin_defaults()?;
        loader.load_from_file(path)?;

        Ok(loader)
    }

    /// Load built-in defaults
    fn load_builtin_defaults(&mut self) -> Result<()> {
        let defaults = include_str!("../../defaults.json");
        let overlay: ConfigOverlay = serde_json::from_str(defaults).map_err(|e| {
            SwitchboardError::Config(format!("failed to parse built-in defaults.json: {}", e))
        })?;

        self.merge_overlay(overlay);
        Ok(())
    }

    /// Load configuration from default paths
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_config_paths() {
            if path.exists() {
                self.load_from_file(&path)?;
            }
        }

        Ok(())
    }

    /// Get list of config paths to check
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Environment variable
        if let Ok(custom_path) = std::env::var("SWITCHBOARD_CONFIG") {
            paths.push(PathBuf::from(custom_path));
        }

        // 2. Current directory
        paths.push(PathBuf::from("switchboard.json"));

        // 3. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("switchboard").join("config.json"));
        }

        // 4. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".switchboard").join("config.json"));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SwitchboardError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let overlay: ConfigOverlay = serde_json::from_str(&content).map_err(|e| {
            SwitchboardError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        self.merge_overlay(overlay);
        Ok(())
    }

    /// Merge an overlay into the loaded config. Providers merge by name,
    /// priority entries merge by model; other sections replace wholesale.
    fn merge_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(providers) = overlay.providers {
            for provider in providers {
                match self
                    .config
                    .providers
                    .iter_mut()
                    .find(|p| p.name == provider.name)
                {
                    Some(existing) => *existing = provider,
                    None => self.config.providers.push(provider),
                }
            }
        }

        if let Some(priority) = overlay.priority {
            for (model, names) in priority {
                self.config.priority.insert(model, names);
            }
        }

        if let Some(policy) = overlay.policy {
            self.config.policy = policy;
        }

        if let Some(proxy) = overlay.proxy {
            self.config.proxy = proxy;
        }

        if let Some(catalog) = overlay.catalog {
            self.config.catalog = Some(catalog);
        }
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> Config {
        self.config
    }
}
