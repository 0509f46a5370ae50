//! Provider Router
//!
//! Produces one successful textual reply for a prompt + model by trying
//! capable providers in a stable priority order with escalating fallback:
//! direct attempts first, then one pass through a pooled proxy, then a
//! terminal diagnostic.

pub mod session;

use crate::api::Message;
use crate::catalog::{CatalogHandle, ModelCatalog};
use crate::config::RouterPolicy;
use crate::error::{Result, SwitchboardError};
use crate::provider::{classify_response, is_rate_limit_message, Outcome, ProviderRegistry};
use crate::proxy::{ProxyEndpoint, ProxyPool};
use session::RequestSession;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Opaque caller context. The router only needs the caller's model
/// preference; everything else about the presentation layer stays outside.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub preferred_model: Option<String>,
}

/// Provider-fallback request router
pub struct Router {
    registry: ProviderRegistry,
    catalog: Arc<CatalogHandle>,
    pool: Arc<ProxyPool>,
    policy: RouterPolicy,
    priority: HashMap<String, Vec<String>>,
}

impl Router {
    pub fn new(
        registry: ProviderRegistry,
        catalog: Arc<CatalogHandle>,
        pool: Arc<ProxyPool>,
        policy: RouterPolicy,
        priority: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            registry,
            catalog,
            pool,
            policy,
            priority,
        }
    }

    /// Resolve the model for a caller context, falling back to the catalog
    /// default
    pub fn resolve_model(&self, context: &UserContext) -> Result<String> {
        if let Some(model) = &context.preferred_model {
            return Ok(model.clone());
        }
        self.catalog
            .snapshot()
            .default_model()
            .map(str::to_string)
            .ok_or_else(|| SwitchboardError::NoCapableProvider("<default>".to_string()))
    }

    /// Obtain one non-empty, non-error textual response for `model`.
    ///
    /// Tries every capable provider directly, then once more through a
    /// pooled proxy, and returns `Exhausted` with a diagnostic report if
    /// nothing succeeds.
    pub async fn request(&self, messages: &[Message], model: &str) -> Result<String> {
        let catalog = self.catalog.snapshot();
        let order = self.attempt_order(&catalog, model);
        if order.is_empty() {
            return Err(SwitchboardError::NoCapableProvider(model.to_string()));
        }

        let mut session = RequestSession::new();

        // DIRECT_ATTEMPT
        if let Some(text) = self
            .attempt_phase(&order, model, messages, None, &mut session)
            .await
        {
            return Ok(text);
        }

        // PROXIED_ATTEMPT: rate-limited providers stay excluded, everyone
        // else gets a second chance through the proxy.
        session.escalate();
        info!(model, "all direct attempts failed, acquiring proxy");

        let Some(proxy) = self.pool.acquire().await else {
            warn!(model, "no proxy available, request exhausted");
            session.record_error(SwitchboardError::ProxyUnavailable.to_string());
            return Err(SwitchboardError::Exhausted(session.report(model)));
        };

        info!(model, proxy = %proxy, "retrying providers through proxy");
        if let Some(text) = self
            .attempt_phase(&order, model, messages, Some(&proxy), &mut session)
            .await
        {
            return Ok(text);
        }

        // EXHAUSTED
        let report = session.report(model);
        error!(model, %report, "request exhausted");
        Err(SwitchboardError::Exhausted(report))
    }

    /// One pass over the attempt order; returns the first successful text
    async fn attempt_phase(
        &self,
        order: &[String],
        model: &str,
        messages: &[Message],
        proxy: Option<&ProxyEndpoint>,
        session: &mut RequestSession,
    ) -> Option<String> {
        let proxied = proxy.is_some();

        for name in order {
            if !session.eligible(name) {
                continue;
            }

            let Some(provider) = self.registry.get(name) else {
                warn!(provider = %name, "catalog names a provider missing from the registry");
                continue;
            };

            session.mark_tried(name);
            debug!(provider = %name, model, proxied, "attempting provider");

            match provider
                .invoke(model, messages, proxy, self.policy.provider_timeout())
                .await
            {
                Ok(body) => match classify_response(&body) {
                    Outcome::Text(text) => {
                        info!(provider = %name, model, proxied, "provider produced a response");
                        return Some(text);
                    }
                    Outcome::Html => {
                        warn!(provider = %name, "provider returned HTML, marking incompatible");
                        session.mark_html(name);
                        session.record_error(
                            SwitchboardError::ProviderIncompatible {
                                provider: name.clone(),
                            }
                            .to_string(),
                        );
                    }
                    Outcome::Empty => {
                        debug!(provider = %name, "provider returned an empty response");
                        session.record_error(format!("{}: empty response", name));
                    }
                    // classify_response never yields error outcomes
                    Outcome::RateLimited(_) | Outcome::Failed(_) => unreachable!(),
                },
                Err(err) => {
                    let message = err.to_string();
                    let rate_limited = matches!(
                        err,
                        SwitchboardError::ProviderRateLimited { .. }
                    ) || is_rate_limit_message(&message);

                    session.record_error(message.clone());

                    if rate_limited {
                        warn!(provider = %name, "provider rate limited for this session");
                        session.mark_rate_limited(name);
                        // Brief cooldown before the next proxied attempt so
                        // the same limiter is not re-triggered immediately.
                        if proxied {
                            tokio::time::sleep(self.policy.rate_limit_cooldown()).await;
                        }
                    } else {
                        error!(provider = %name, error = %message, "provider attempt failed");
                    }
                }
            }
        }

        None
    }

    /// Capable providers for `model`: the declared priority subset first,
    /// then the remaining capable providers in catalog order. Used
    /// identically in the direct and proxied phases.
    fn attempt_order(&self, catalog: &ModelCatalog, model: &str) -> Vec<String> {
        let capable: Vec<&str> = catalog
            .capable(model)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(capable.len());
        if let Some(priority) = self.priority.get(model) {
            for name in priority {
                if capable.contains(&name.as_str()) && !order.contains(name) {
                    order.push(name.clone());
                }
            }
        }
        for name in capable {
            if !order.iter().any(|n| n == name) {
                order.push(name.to_string());
            }
        }
        order
    }
}
