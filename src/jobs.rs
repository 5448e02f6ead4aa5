//! Spider job execution: dispatch, retries, and the run-level timeout.

use crate::catalog::Catalog;
use crate::config::ScraperConfig;
use crate::engine::{Engine, RunStats};
use crate::error::ScrapeError;
use crate::pipeline::ProductProcessor;
use crate::spiders::{SpiderKind, SpiderOverrides};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Runs one spider to completion. The spider performs no internal retry of
/// failed fetches; run-level failures propagate to the job wrapper.
pub async fn run_spider(
    config: Arc<ScraperConfig>,
    catalog: Catalog,
    kind: SpiderKind,
    overrides: SpiderOverrides,
) -> Result<RunStats, ScrapeError> {
    let spider = kind.build(&config, &overrides);
    let processor = ProductProcessor::new(catalog);
    let engine = Engine::new(config, processor)?;

    engine.run(spider).await
}

/// Job wrapper applying the retry/timeout policy around a spider run: up
/// to `job_max_attempts` attempts, each bounded by `job_timeout_secs`.
/// When an attempt times out its in-flight fetches are abandoned; a parse
/// that never completed persists nothing.
pub async fn run_job(
    config: Arc<ScraperConfig>,
    catalog: Catalog,
    kind: SpiderKind,
    overrides: SpiderOverrides,
) {
    let timeout = Duration::from_secs(config.job_timeout_secs);
    let max_attempts = config.job_max_attempts.max(1);

    for attempt in 1..=max_attempts {
        log::info!(
            "Starting spider job: spider_type={} spider_name='{}' overrides={:?} attempt={}/{}",
            kind,
            kind.display_name(),
            overrides,
            attempt,
            max_attempts
        );

        let run = run_spider(
            Arc::clone(&config),
            catalog.clone(),
            kind,
            overrides.clone(),
        );
        let outcome = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout(config.job_timeout_secs)),
        };

        match outcome {
            Ok(_) => {
                log::info!("Spider job completed successfully: spider_type={}", kind);
                return;
            }
            Err(e) => {
                log::error!("Spider job failed: spider_type={} error={}", kind, e);
            }
        }
    }

    log::error!(
        "Spider job exhausted all {} attempts: spider_type={}",
        max_attempts,
        kind
    );
}

/// Fire-and-forget dispatch: the caller gets its acknowledgment while the
/// job runs on the runtime. Concurrent dispatch of the same spider type is
/// not deduplicated here; that belongs to an external queue.
pub fn dispatch(
    config: Arc<ScraperConfig>,
    catalog: Catalog,
    kind: SpiderKind,
    overrides: SpiderOverrides,
) -> (Uuid, JoinHandle<()>) {
    let job_id = Uuid::new_v4();
    log::info!("Dispatching spider job {}: spider_type={}", job_id, kind);

    let handle = tokio::spawn(run_job(config, catalog, kind, overrides));

    (job_id, handle)
}
