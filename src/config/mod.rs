//! Configuration Module
//!
//! Configuration schema and multi-source loading.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    Config, ProviderEntry, ProxyConfig, ProxySource, RemoteCatalogConfig, RouterPolicy,
    SourceFormat, TrustedProxy,
};
