//! Request Session
//!
//! Ephemeral per-request bookkeeping: which providers were tried, which came
//! back as HTML, which hit a rate limiter, and the last raw error. Created
//! at request start, discarded at request end, never shared.

use crate::error::ExhaustionReport;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub(crate) struct RequestSession {
    /// Providers tried in the current phase
    tried: HashSet<String>,

    /// Providers that returned HTML in the current phase
    html: HashSet<String>,

    /// Rate-limited providers; survives escalation to the proxied phase
    rate_limited: HashSet<String>,

    /// Cumulative union across phases, for the terminal diagnostic
    all_tried: HashSet<String>,
    all_html: HashSet<String>,

    last_error: Option<String>,
}

impl RequestSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a provider may still be attempted in the current phase
    pub fn eligible(&self, provider: &str) -> bool {
        !self.tried.contains(provider)
            && !self.html.contains(provider)
            && !self.rate_limited.contains(provider)
    }

    pub fn mark_tried(&mut self, provider: &str) {
        self.tried.insert(provider.to_string());
        self.all_tried.insert(provider.to_string());
    }

    pub fn mark_html(&mut self, provider: &str) {
        self.html.insert(provider.to_string());
        self.all_html.insert(provider.to_string());
    }

    pub fn mark_rate_limited(&mut self, provider: &str) {
        self.rate_limited.insert(provider.to_string());
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Transition to the proxied phase: tried and HTML sets reset so every
    /// non-rate-limited provider gets a second chance through the proxy.
    pub fn escalate(&mut self) {
        self.tried.clear();
        self.html.clear();
    }

    /// Terminal diagnostic for the exhausted state
    pub fn report(&self, model: &str) -> ExhaustionReport {
        ExhaustionReport {
            model: model.to_string(),
            providers_tried: self.all_tried.len(),
            returned_html: self.all_html.len(),
            rate_limited: self.rate_limited.len(),
            last_error: self.last_error.clone(),
        }
    }
}
