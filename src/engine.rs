//! Traversal driver for one spider run.
//!
//! Seeds a request queue from the spider's start URLs, applies the
//! middleware chain to every outbound request, keeps a bounded number of
//! fetches in flight, and routes each parse output back into the queue
//! (follow-up requests) or into the item pipeline (extracted items).
//! The run completes implicitly when the queue drains and nothing is in
//! flight. All per-run state is freshly allocated here and discarded with
//! the run.

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::middleware::{self, MiddlewareAction};
use crate::pipeline::ProductProcessor;
use crate::request::FetchRequest;
use crate::spider::{PageResponse, ParseOutput, Spider};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Counters for one spider run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub requests_dispatched: usize,
    pub requests_dropped: usize,
    pub requests_failed: usize,
    pub pages_parsed: usize,
    pub items_scraped: usize,
}

pub struct Engine {
    config: Arc<ScraperConfig>,
    client: reqwest::Client,
    processor: ProductProcessor,
}

impl Engine {
    pub fn new(config: Arc<ScraperConfig>, processor: ProductProcessor) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { config, client, processor })
    }

    pub async fn run(&self, spider: Arc<dyn Spider>) -> Result<RunStats, ScrapeError> {
        let run_id = Uuid::new_v4();
        let chain = spider.middleware(&self.config);
        let concurrency = self.config.concurrency.max(1);
        let started = Instant::now();

        let mut stats = RunStats::default();
        let mut queue: VecDeque<FetchRequest> = spider.start_requests().into();
        let mut in_flight: JoinSet<Result<ParseOutput, ScrapeError>> = JoinSet::new();

        log::info!(
            "Run {} of spider '{}' started with {} seed request(s), concurrency {}",
            run_id,
            spider.name(),
            queue.len(),
            concurrency
        );

        loop {
            // Fill the in-flight window from the queue. The chain may drop
            // a request (duplicate) before it ever reaches the network.
            while in_flight.len() < concurrency {
                let Some(request) = queue.pop_front() else { break };

                let request = match middleware::apply(&chain, request).await {
                    MiddlewareAction::Continue(request) => request,
                    MiddlewareAction::Drop(_) => {
                        stats.requests_dropped += 1;
                        metrics::counter!("scraper_requests_dropped").increment(1);
                        continue;
                    }
                };

                stats.requests_dispatched += 1;
                metrics::counter!("scraper_requests_dispatched").increment(1);

                let client = self.client.clone();
                let spider = Arc::clone(&spider);
                in_flight.spawn(async move {
                    let response = fetch(&client, &request).await?;
                    // Parse is synchronous and atomic per response: either
                    // a complete output or nothing reaches the queue.
                    Ok(spider.parse(&response))
                });
            }

            match in_flight.join_next().await {
                Some(Ok(Ok(output))) => {
                    stats.pages_parsed += 1;
                    stats.items_scraped += output.items.len();
                    queue.extend(output.requests);

                    for item in output.items {
                        metrics::counter!("scraper_items_scraped").increment(1);
                        self.processor.process_item(item).await;
                    }
                }
                Some(Ok(Err(e))) => {
                    // A failed fetch abandons that branch only; the run
                    // carries on with whatever else is queued.
                    log::error!("Fetch failed, abandoning branch: {}", e);
                    stats.requests_failed += 1;
                    metrics::counter!("scraper_requests_failed").increment(1);
                }
                Some(Err(e)) => {
                    log::error!("Fetch task failed to complete: {}", e);
                    stats.requests_failed += 1;
                }
                None => break, // queue drained and nothing in flight
            }
        }

        log::info!(
            "Run {} of spider '{}' finished in {:?}: {} dispatched, {} dropped, {} failed, {} page(s), {} item(s)",
            run_id,
            spider.name(),
            started.elapsed(),
            stats.requests_dispatched,
            stats.requests_dropped,
            stats.requests_failed,
            stats.pages_parsed,
            stats.items_scraped
        );

        Ok(stats)
    }
}

async fn fetch(
    client: &reqwest::Client,
    request: &FetchRequest,
) -> Result<PageResponse, ScrapeError> {
    let mut builder = client.request(request.method.clone(), &request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder.send().await.map_err(|source| ScrapeError::Fetch {
        url: request.url.clone(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::HttpStatus {
            url: request.url.clone(),
            status,
        });
    }

    let body = response.text().await.map_err(|source| ScrapeError::Fetch {
        url: request.url.clone(),
        source,
    })?;

    Ok(PageResponse {
        url: request.url.clone(),
        callback: request.callback,
        body,
    })
}
