//! End-to-end router scenarios over scripted providers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use switchboard::api::Message;
use switchboard::catalog::{CatalogHandle, ModelCatalog, ProviderDescriptor};
use switchboard::config::{ProxyConfig, RouterPolicy, TrustedProxy};
use switchboard::error::SwitchboardError;
use switchboard::provider::{ChatProvider, ProviderRegistry};
use switchboard::proxy::{ProxyEndpoint, ProxyPool, Scheme};
use switchboard::router::Router;

/// One scripted attempt outcome
#[derive(Clone)]
enum Step {
    Text(&'static str),
    Html,
    Err(&'static str),
}

/// Provider that replays a script and records how it was called
struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<bool>>, // proxied flag per call
}

impl ScriptedProvider {
    fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn proxied_calls(&self) -> usize {
        self.calls.lock().iter().filter(|p| **p).count()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _model: &str,
        _messages: &[Message],
        proxy: Option<&ProxyEndpoint>,
        _timeout: Duration,
    ) -> switchboard::Result<String> {
        self.calls.lock().push(proxy.is_some());
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(Step::Err("script exhausted"));
        match step {
            Step::Text(text) => Ok(text.to_string()),
            Step::Html => Ok("<html><body>Access denied</body></html>".to_string()),
            Step::Err(message) => Err(SwitchboardError::ProviderTransport {
                provider: self.name.clone(),
                message: message.to_string(),
            }),
        }
    }
}

fn policy() -> RouterPolicy {
    RouterPolicy {
        provider_timeout_secs: 5,
        rate_limit_cooldown_secs: 0,
        system_prompt: None,
    }
}

fn catalog_for(providers: &[&Arc<ScriptedProvider>], model: &str) -> Arc<CatalogHandle> {
    let descriptors = providers
        .iter()
        .map(|p| ProviderDescriptor {
            name: p.name.clone(),
            models: vec![model.to_string()],
        })
        .collect();
    Arc::new(CatalogHandle::new(ModelCatalog::new(descriptors).unwrap()))
}

fn registry_for(providers: &[&Arc<ScriptedProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(Arc::clone(provider) as Arc<dyn ChatProvider>);
    }
    registry
}

/// Pool with nothing configured: acquire always comes up empty, fast
fn empty_pool() -> Arc<ProxyPool> {
    Arc::new(ProxyPool::new(ProxyConfig::default()).unwrap())
}

/// Pool whose only trusted endpoint is a mockito server answering every
/// probe with an IP-echo body, so acquire always succeeds
async fn live_pool(server: &mockito::ServerGuard) -> Arc<ProxyPool> {
    let host_port = server.host_with_port();
    let (host, port) = host_port.rsplit_once(':').unwrap();

    let config = ProxyConfig {
        trusted: vec![TrustedProxy {
            ip: host.to_string(),
            port: port.parse().unwrap(),
            protocol: Scheme::Http,
            uptime: 99.0,
            speed: 9999,
        }],
        sources: Vec::new(),
        echo_urls: vec![format!("{}/echo", server.url())],
        probe_timeout_secs: 5,
        recheck_secs: 300,
        cache_secs: 1800,
    };
    Arc::new(ProxyPool::new(config).unwrap())
}

async fn echo_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("GET", mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ip": "93.184.216.34"}"#)
        .expect_at_least(1)
        .create_async()
        .await
}

#[tokio::test]
async fn first_success_stops_the_sweep() {
    let a = ScriptedProvider::new("a", vec![Step::Text("answer")]);
    let b = ScriptedProvider::new("b", vec![Step::Text("never")]);

    let router = Router::new(
        registry_for(&[&a, &b]),
        catalog_for(&[&a, &b], "m"),
        empty_pool(),
        policy(),
        HashMap::new(),
    );

    let text = router.request(&[Message::user("hi")], "m").await.unwrap();
    assert_eq!(text, "answer");
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 0, "no further providers after a success");
}

#[tokio::test]
async fn html_provider_is_skipped_not_fatal() {
    let a = ScriptedProvider::new("a", vec![Step::Html]);
    let b = ScriptedProvider::new("b", vec![Step::Text("OK")]);

    let router = Router::new(
        registry_for(&[&a, &b]),
        catalog_for(&[&a, &b], "m"),
        empty_pool(),
        policy(),
        HashMap::new(),
    );

    let text = router.request(&[Message::user("hi")], "m").await.unwrap();
    assert_eq!(text, "OK");
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1, "B answered and is not retried");
}

#[tokio::test]
async fn priority_subset_is_attempted_first() {
    let slow = ScriptedProvider::new("slow", vec![Step::Text("slow answer")]);
    let fast = ScriptedProvider::new("fast", vec![Step::Text("fast answer")]);

    let router = Router::new(
        registry_for(&[&slow, &fast]),
        catalog_for(&[&slow, &fast], "m"),
        empty_pool(),
        policy(),
        HashMap::from([("m".to_string(), vec!["fast".to_string()])]),
    );

    let text = router.request(&[Message::user("hi")], "m").await.unwrap();
    assert_eq!(text, "fast answer");
    assert_eq!(slow.call_count(), 0);
}

#[tokio::test]
async fn all_html_escalates_to_proxy_exactly_once() {
    let mut server = mockito::Server::new_async().await;
    let _echo = echo_mock(&mut server).await;

    // Both providers return HTML directly; A recovers through the proxy.
    let a = ScriptedProvider::new("a", vec![Step::Html, Step::Text("recovered")]);
    let b = ScriptedProvider::new("b", vec![Step::Html, Step::Text("late")]);

    let router = Router::new(
        registry_for(&[&a, &b]),
        catalog_for(&[&a, &b], "m"),
        live_pool(&server).await,
        policy(),
        HashMap::new(),
    );

    let text = router.request(&[Message::user("hi")], "m").await.unwrap();
    assert_eq!(text, "recovered");

    // Escalation happened only after every direct-capable provider was tried
    assert_eq!(a.call_count(), 2);
    assert_eq!(a.proxied_calls(), 1);
    assert_eq!(b.call_count(), 1, "B was only tried directly");
    assert_eq!(b.proxied_calls(), 0);
}

#[tokio::test]
async fn rate_limited_providers_are_never_retried_in_session() {
    let mut server = mockito::Server::new_async().await;
    let _echo = echo_mock(&mut server).await;

    let a = ScriptedProvider::new("a", vec![Step::Err("HTTP 429 Too Many Requests")]);
    let b = ScriptedProvider::new("b", vec![Step::Err("rate limit exceeded")]);

    let router = Router::new(
        registry_for(&[&a, &b]),
        catalog_for(&[&a, &b], "m"),
        live_pool(&server).await,
        policy(),
        HashMap::new(),
    );

    let err = router
        .request(&[Message::user("hi")], "m")
        .await
        .unwrap_err();

    // Both were tried exactly once, even though a proxy was available
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);

    let SwitchboardError::Exhausted(report) = err else {
        panic!("expected Exhausted, got {err}");
    };
    assert_eq!(report.providers_tried, 2);
    assert_eq!(report.rate_limited, 2);
    let rendered = report.to_string();
    assert!(rendered.contains("no provider produced a response"));
    assert!(rendered.contains("2 providers tried"));
}

#[tokio::test]
async fn no_proxy_goes_straight_to_exhausted() {
    let a = ScriptedProvider::new("a", vec![Step::Err("connection refused")]);
    let b = ScriptedProvider::new("b", vec![Step::Err("connection refused")]);

    let router = Router::new(
        registry_for(&[&a, &b]),
        catalog_for(&[&a, &b], "m"),
        empty_pool(),
        policy(),
        HashMap::new(),
    );

    let err = router
        .request(&[Message::user("hi")], "m")
        .await
        .unwrap_err();

    assert!(matches!(err, SwitchboardError::Exhausted(_)));
    assert_eq!(a.call_count(), 1, "no proxied attempt without a proxy");
    assert_eq!(b.call_count(), 1);
    assert_eq!(a.proxied_calls() + b.proxied_calls(), 0);
}

#[tokio::test]
async fn unknown_model_is_rejected_up_front() {
    let a = ScriptedProvider::new("a", vec![Step::Text("x")]);

    let router = Router::new(
        registry_for(&[&a]),
        catalog_for(&[&a], "m"),
        empty_pool(),
        policy(),
        HashMap::new(),
    );

    let err = router
        .request(&[Message::user("hi")], "unknown-model")
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::NoCapableProvider(_)));
    assert_eq!(a.call_count(), 0);
}
