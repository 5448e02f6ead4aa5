//! The `Spider` trait: start points, parse logic, and declared middleware.

use crate::config::ScraperConfig;
use crate::middleware::{DedupMiddleware, RequestMiddleware, UserAgentMiddleware};
use crate::request::{Callback, FetchRequest};

/// A fetched page handed to a spider's parse step. Carries the raw body
/// rather than a parsed document so it can cross task boundaries; parse
/// builds the document itself.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub url: String,
    pub callback: Callback,
    pub body: String,
}

/// One extracted record, prior to pipeline processing. Values are raw
/// strings as found in the page; empty means absent. `product_id` is
/// attached by the pipeline once the record is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub price: String,
    pub image_url: String,
    pub product_id: Option<i64>,
}

/// Everything one parse invocation produced: follow-up fetches and
/// extracted items. The engine routes requests back into its queue and
/// items into the pipeline.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub requests: Vec<FetchRequest>,
    pub items: Vec<RawItem>,
}

impl ParseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&mut self, request: FetchRequest) {
        self.requests.push(request);
    }

    pub fn add_item(&mut self, item: RawItem) {
        self.items.push(item);
    }
}

/// A traversal + extraction definition. One instance is built per run and
/// discarded when the run completes.
pub trait Spider: Send + Sync {
    fn name(&self) -> &'static str;

    fn start_urls(&self) -> Vec<String>;

    /// Middleware chain for this spider's requests, in application order.
    /// Defaults to deduplication plus user agent stamping.
    fn middleware(&self, config: &ScraperConfig) -> Vec<Box<dyn RequestMiddleware>> {
        vec![
            Box::new(DedupMiddleware::new()),
            Box::new(UserAgentMiddleware::new(config.user_agent.clone())),
        ]
    }

    /// Seed requests for a run.
    fn start_requests(&self) -> Vec<FetchRequest> {
        self.start_urls()
            .into_iter()
            .map(|url| FetchRequest::new(url, Callback::Listing))
            .collect()
    }

    /// Turns a fetched page into follow-up requests and extracted items.
    ///
    /// Parsing is synchronous and atomic per response: it either returns
    /// its complete output or nothing. A structurally broken page yields
    /// an empty output, not an error.
    fn parse(&self, response: &PageResponse) -> ParseOutput;
}
