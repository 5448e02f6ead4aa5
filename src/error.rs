use thiserror::Error;

/// Errors surfaced by the scraping subsystem.
///
/// `UnknownSpider` is the only client-visible configuration error (mapped
/// to HTTP 400 by the API layer); everything else is operational and ends
/// up in logs or at the job wrapper.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unknown spider type '{0}'")]
    UnknownSpider(String),

    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spider run timed out after {0} seconds")]
    Timeout(u64),
}
