use reqwest::Method;
use std::collections::HashMap;
use url::Url;

/// Identifies which parse function handles the response to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Listing,
    ProductDetail,
}

/// An outbound fetch, created by a spider's parse step (including the
/// seed requests) and shaped by the middleware chain before dispatch.
/// Middleware never mutates a request in place; each step receives it and
/// passes on a (possibly modified) copy.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub callback: Callback,
    pub headers: HashMap<String, String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, callback: Callback) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            callback,
            headers: HashMap::new(),
        }
    }

    /// Returns a copy of the request with the header set.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Identity used by the deduplication middleware. The fragment is
    /// dropped; the query is kept, since listing pages differ only by it.
    pub fn fingerprint(&self) -> String {
        let normalized = match Url::parse(&self.url) {
            Ok(mut url) => {
                url.set_fragment(None);
                url.to_string()
            }
            Err(_) => self.url.clone(),
        };

        format!("{} {}", self.method, normalized)
    }
}
