//! Switchboard Error Types
//!
//! Per-provider and per-proxy failures are recovered inside the router loop;
//! only `Exhausted` reaches callers as a user-visible failure.

use std::fmt;
use thiserror::Error;

/// Main error type for switchboard operations
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid JSON, missing fields, etc.)
    #[error("configuration error: {0}")]
    Config(String),

    /// No provider in the catalog serves the requested model
    #[error("no capable provider for model '{0}'")]
    NoCapableProvider(String),

    /// Provider answered with an HTML document instead of a completion
    #[error("provider '{provider}' returned an HTML page instead of a completion")]
    ProviderIncompatible { provider: String },

    /// Provider rejected the request as rate limited
    #[error("provider '{provider}' is rate limited: {message}")]
    ProviderRateLimited { provider: String, message: String },

    /// Transport-level failure talking to a provider
    #[error("provider '{provider}' request failed: {message}")]
    ProviderTransport { provider: String, message: String },

    /// No proxy in the pool passed a liveness probe
    #[error("no working proxy available")]
    ProxyUnavailable,

    /// Every capable provider failed, directly and through a proxy
    #[error("{0}")]
    Exhausted(ExhaustionReport),

    /// HTTP request failed outside a provider call (catalog, proxy sources)
    #[error("request failed: {0}")]
    Request(String),

    /// Response parsing failed
    #[error("response error: {0}")]
    Response(String),
}

/// Terminal diagnostic for an exhausted request.
///
/// Its `Display` output is the user-facing failure message; the surrounding
/// `SwitchboardError::Exhausted` is the hard signal to the orchestration
/// layer.
#[derive(Debug, Clone, Default)]
pub struct ExhaustionReport {
    pub model: String,
    pub providers_tried: usize,
    pub returned_html: usize,
    pub rate_limited: usize,
    pub last_error: Option<String>,
}

impl fmt::Display for ExhaustionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no provider produced a response for model '{}': {} providers tried, {} returned HTML, {} rate limited",
            self.model, self.providers_tried, self.returned_html, self.rate_limited
        )?;
        if let Some(err) = &self.last_error {
            write!(f, "; last error: {}", err)?;
        }
        Ok(())
    }
}

impl From<reqwest::Error> for SwitchboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SwitchboardError::Request(format!("timed out: {}", err))
        } else if err.is_connect() {
            SwitchboardError::Request(format!("connection failed: {}", err))
        } else if err.is_decode() {
            SwitchboardError::Response(format!("failed to decode response: {}", err))
        } else {
            SwitchboardError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SwitchboardError {
    fn from(err: serde_json::Error) -> Self {
        SwitchboardError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for SwitchboardError {
    fn from(err: std::io::Error) -> Self {
        SwitchboardError::Config(format!("IO error: {}", err))
    }
}

/// Result type alias for switchboard operations
pub type Result<T> = std::result::Result<T, SwitchboardError>;
