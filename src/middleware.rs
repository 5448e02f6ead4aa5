//! Request middleware applied to every outbound fetch before dispatch.
//!
//! The chain is an ordered list of transformers; each receives the request
//! and either passes on a copy or drops it. Deduplication runs first so
//! later middleware never works on a request that will not be sent.

use crate::config::ScraperConfig;
use crate::extract::validate_url;
use crate::request::FetchRequest;
use async_trait::async_trait;
use dashmap::DashSet;
use serde::Deserialize;

/// Outcome of one middleware step.
pub enum MiddlewareAction {
    Continue(FetchRequest),
    Drop(&'static str),
}

#[async_trait]
pub trait RequestMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: FetchRequest) -> MiddlewareAction;
}

/// Runs `request` through the chain in declaration order, stopping at the
/// first middleware that drops it.
pub async fn apply(
    chain: &[Box<dyn RequestMiddleware>],
    request: FetchRequest,
) -> MiddlewareAction {
    let mut current = request;

    for middleware in chain {
        match middleware.handle(current).await {
            MiddlewareAction::Continue(next) => current = next,
            MiddlewareAction::Drop(reason) => {
                log::debug!("Middleware '{}' dropped request: {}", middleware.name(), reason);
                return MiddlewareAction::Drop(reason);
            }
        }
    }

    MiddlewareAction::Continue(current)
}

/// Drops requests whose fingerprint was already seen during this run.
///
/// The set lives for one spider run and is discarded with it. Inserts are
/// atomic, so of two concurrent requests with the same fingerprint exactly
/// one passes.
pub struct DedupMiddleware {
    seen: DashSet<String>,
}

impl DedupMiddleware {
    pub fn new() -> Self {
        Self { seen: DashSet::new() }
    }
}

impl Default for DedupMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestMiddleware for DedupMiddleware {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn handle(&self, request: FetchRequest) -> MiddlewareAction {
        if self.seen.insert(request.fingerprint()) {
            MiddlewareAction::Continue(request)
        } else {
            log::debug!("Dropping duplicate request: {}", request.url);
            MiddlewareAction::Drop("duplicate request")
        }
    }
}

/// Stamps the configured `User-Agent` header onto every request.
pub struct UserAgentMiddleware {
    user_agent: String,
}

impl UserAgentMiddleware {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into() }
    }
}

#[async_trait]
impl RequestMiddleware for UserAgentMiddleware {
    fn name(&self) -> &'static str {
        "user_agent"
    }

    async fn handle(&self, request: FetchRequest) -> MiddlewareAction {
        MiddlewareAction::Continue(request.with_header("User-Agent", &self.user_agent))
    }
}

#[derive(Debug, Deserialize)]
struct ProxyEnvelope {
    #[serde(default)]
    data: Option<String>,
}

/// Asks the proxy manager for a proxy and attaches it to the request as an
/// `X-Proxy` header. Proxy unavailability is never fatal: every failure
/// mode logs a warning and forwards the request unmodified.
pub struct ProxyMiddleware {
    use_proxy: bool,
    service_url: Option<String>,
    client: reqwest::Client,
}

impl ProxyMiddleware {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            use_proxy: config.use_proxy,
            service_url: config.proxy_service_url.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn acquire_proxy(&self) -> Option<String> {
        let base = match &self.service_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => {
                log::warn!("No proxy service URL configured");
                return None;
            }
        };

        let response = match self.client.get(format!("{}/proxy", base)).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Exception while getting proxy: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            log::warn!("Failed to get proxy: HTTP {}", response.status());
            return None;
        }

        match response.json::<ProxyEnvelope>().await {
            Ok(ProxyEnvelope { data: Some(url) }) if !url.is_empty() => {
                let url = validate_url(&url);
                if url.is_empty() {
                    log::warn!("Proxy service returned an invalid proxy URL");
                    None
                } else {
                    Some(url)
                }
            }
            Ok(_) => {
                log::warn!("Proxy service returned no proxy");
                None
            }
            Err(e) => {
                log::warn!("Failed to decode proxy response: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl RequestMiddleware for ProxyMiddleware {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn handle(&self, request: FetchRequest) -> MiddlewareAction {
        if !self.use_proxy {
            log::info!("Proxy usage disabled for request: {}", request.url);
            return MiddlewareAction::Continue(request);
        }

        match self.acquire_proxy().await {
            Some(proxy_url) => {
                log::info!("Using proxy for request: {}", proxy_url);
                MiddlewareAction::Continue(request.with_header("X-Proxy", &proxy_url))
            }
            None => {
                log::warn!("No valid proxy found, proceeding without proxy");
                MiddlewareAction::Continue(request)
            }
        }
    }
}
